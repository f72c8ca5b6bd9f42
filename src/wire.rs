//! Translating between DNS messages and the engine’s types.
//!
//! Requests are turned into a [`Query`] for their first question and
//! [`Response`]s are composed into messages answering the request. All the
//! actual encoding and decoding is left to the `domain` crate.

use std::fmt;
use std::str::FromStr;

use domain::base::iana::{Class, Rcode};
use domain::base::message_builder::PushError;
use domain::base::name::Name;
use domain::base::wire::ParseError;
use domain::base::{Message, MessageBuilder, Record, Serial, Ttl};
use domain::rdata::{AllRecordData, Cname, Mx, Ns, Soa, Srv, Txt, A};
use octseq::Octets;

use crate::lookup::trim_root;
use crate::response::{Outcome, Query, ResourceData, ResourceRecord, Response};
use crate::store::{Authority, RecordData};

/// The largest response sent over UDP.
pub const MAX_UDP_RESPONSE: usize = 512;

type WireName = Name<Vec<u8>>;
type WireRecord = Record<WireName, AllRecordData<Vec<u8>, WireName>>;

//------------ parse_query ---------------------------------------------------

/// Extracts the query from a request.
///
/// Only the first question is considered. The name is returned without
/// its trailing dot.
pub fn parse_query<Octs: Octets>(
    msg: &Message<Octs>,
) -> Result<Query, WireError> {
    let question = msg.question().next().ok_or(WireError::NoQuestion)??;
    let name = question.qname().to_string();
    Ok(Query::new(
        trim_root(&name),
        question.qtype().to_int(),
        question.qclass().to_int(),
    ))
}

//------------ compose_response ----------------------------------------------

/// Composes the message answering `request` with `response`.
///
/// The AA flag is set for answers from the record store and for negative
/// answers, RA if `recursion_available` is true.
pub fn compose_response<Octs: Octets>(
    request: &Message<Octs>,
    response: &Response,
    recursion_available: bool,
) -> Result<Vec<u8>, WireError> {
    let mut builder =
        MessageBuilder::new_vec().start_answer(request, Rcode::NOERROR)?;
    builder.header_mut().set_aa(matches!(
        response.outcome,
        Outcome::Authoritative | Outcome::Negative
    ));
    builder.header_mut().set_ra(recursion_available);

    for record in &response.answers {
        builder.push(wire_record(record)?)?;
    }
    let mut builder = builder.authority();
    for record in &response.authorities {
        builder.push(wire_record(record)?)?;
    }
    let mut builder = builder.additional();
    for record in &response.additionals {
        builder.push(wire_record(record)?)?;
    }
    Ok(builder.finish())
}

/// Composes a response without records carrying `rcode`.
pub fn compose_error<Octs: Octets>(
    request: &Message<Octs>,
    rcode: Rcode,
) -> Result<Vec<u8>, WireError> {
    Ok(MessageBuilder::new_vec()
        .start_answer(request, rcode)?
        .finish())
}

/// Composes an empty response with the TC flag set.
///
/// This tells a UDP client to retry over TCP.
pub fn compose_truncated<Octs: Octets>(
    request: &Message<Octs>,
) -> Result<Vec<u8>, WireError> {
    let mut builder =
        MessageBuilder::new_vec().start_answer(request, Rcode::NOERROR)?;
    builder.header_mut().set_tc(true);
    Ok(builder.finish())
}

fn wire_record(record: &ResourceRecord) -> Result<WireRecord, WireError> {
    let data: AllRecordData<Vec<u8>, WireName> = match &record.data {
        ResourceData::Record(data) => record_data(data)?,
        ResourceData::Soa(authority) => soa(authority)?.into(),
    };
    Ok(Record::new(
        wire_name(&record.name)?,
        Class::from_int(record.class),
        Ttl::from_secs(record.ttl),
        data,
    ))
}

fn record_data(
    data: &RecordData,
) -> Result<AllRecordData<Vec<u8>, WireName>, WireError> {
    Ok(match data {
        RecordData::A { address } => A::new(*address).into(),
        RecordData::Ns { ns } => Ns::new(wire_name(ns)?).into(),
        RecordData::Cname { domain } => Cname::new(wire_name(domain)?).into(),
        RecordData::Mx { priority, exchange } => {
            Mx::new(*priority, wire_name(exchange)?).into()
        }
        RecordData::Txt { data } => {
            Txt::<Vec<u8>>::build_from_slice(data.as_bytes())
                .map_err(|_| WireError::InvalidData("TXT data too long"))?
                .into()
        }
        RecordData::Srv {
            priority,
            weight,
            port,
            target,
        } => Srv::new(*priority, *weight, *port, wire_name(target)?).into(),
    })
}

fn soa(authority: &Authority) -> Result<Soa<WireName>, WireError> {
    Ok(Soa::new(
        wire_name(&authority.primary)?,
        wire_name(&authority.admin)?,
        Serial(authority.serial),
        Ttl::from_secs(authority.refresh),
        Ttl::from_secs(authority.retry),
        Ttl::from_secs(authority.expiration),
        Ttl::from_secs(authority.minimum),
    ))
}

/// Converts a name into an absolute domain name.
fn wire_name(name: &str) -> Result<WireName, WireError> {
    let name = trim_root(name);
    if name.is_empty() {
        return Ok(Name::root_vec());
    }
    Name::from_str(name).map_err(|_| WireError::InvalidName(name.into()))
}

//============ Error Types ===================================================

//------------ WireError -----------------------------------------------------

/// A message could not be parsed or composed.
#[derive(Debug)]
pub enum WireError {
    /// The request could not be parsed.
    Parse(ParseError),

    /// The request has no question.
    NoQuestion,

    /// A name to be included is not a valid domain name.
    InvalidName(String),

    /// Record data cannot be encoded.
    InvalidData(&'static str),

    /// The message grew too large.
    Push(PushError),
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::Parse(err) => write!(f, "malformed message: {err}"),
            WireError::NoQuestion => f.write_str("message without question"),
            WireError::InvalidName(name) => {
                write!(f, "invalid domain name '{name}'")
            }
            WireError::InvalidData(reason) => f.write_str(reason),
            WireError::Push(err) => write!(f, "cannot compose message: {err}"),
        }
    }
}

impl std::error::Error for WireError {}

impl From<ParseError> for WireError {
    fn from(err: ParseError) -> Self {
        WireError::Parse(err)
    }
}

impl From<PushError> for WireError {
    fn from(err: PushError) -> Self {
        WireError::Push(err)
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use domain::base::iana::Rtype;
    use domain::base::name::ParsedName;
    use std::net::Ipv4Addr;

    fn request(name: &str, rtype: u16) -> Message<Vec<u8>> {
        let mut builder = MessageBuilder::new_vec();
        builder.header_mut().set_id(4711);
        builder.header_mut().set_rd(true);
        let mut builder = builder.question();
        builder
            .push((wire_name(name).unwrap(), Rtype::from_int(rtype)))
            .unwrap();
        builder.into_message()
    }

    #[test]
    fn parses_first_question() {
        let query = parse_query(&request("www.Example.com", 15)).unwrap();
        assert_eq!(query, Query::new("www.Example.com", 15, 1));
    }

    #[test]
    fn missing_question() {
        let msg = MessageBuilder::new_vec().into_message();
        assert!(matches!(parse_query(&msg), Err(WireError::NoQuestion)));
    }

    #[test]
    fn composes_answers() {
        let request = request("www.example.com", 1);
        let response = Response {
            outcome: Outcome::Authoritative,
            answers: vec![ResourceRecord {
                name: "www.example.com".into(),
                class: 1,
                ttl: 300,
                data: ResourceData::Record(RecordData::A {
                    address: Ipv4Addr::new(192, 0, 2, 1),
                }),
            }],
            authorities: Vec::new(),
            additionals: Vec::new(),
        };
        let bytes = compose_response(&request, &response, false).unwrap();
        let msg = Message::from_octets(bytes).unwrap();
        assert_eq!(msg.header().id(), 4711);
        assert!(msg.header().qr());
        assert!(msg.header().aa());
        assert!(!msg.header().ra());
        assert_eq!(msg.header().rcode(), Rcode::NOERROR);
        assert_eq!(msg.header_counts().qdcount(), 1);

        let answer: Vec<_> = msg
            .answer()
            .unwrap()
            .limit_to::<A>()
            .map(|record| record.unwrap())
            .collect();
        assert_eq!(answer.len(), 1);
        assert_eq!(answer[0].ttl(), Ttl::from_secs(300));
        assert_eq!(answer[0].data().addr(), Ipv4Addr::new(192, 0, 2, 1));
    }

    #[test]
    fn composes_negative_answer() {
        let request = request("nothing.test", 1);
        let response = Response::negative(
            "nothing.test",
            Authority::synthesize("nothing.test", 1),
        );
        let bytes = compose_response(&request, &response, true).unwrap();
        let msg = Message::from_octets(bytes).unwrap();
        assert!(msg.header().ra());
        assert_eq!(msg.header_counts().ancount(), 0);
        let soa = msg
            .authority()
            .unwrap()
            .limit_to::<Soa<ParsedName<_>>>()
            .next()
            .unwrap()
            .unwrap();
        assert_eq!(soa.owner().to_string(), "nothing.test");
        assert_eq!(soa.ttl(), Ttl::from_secs(600));
        assert_eq!(soa.data().mname().to_string(), "ns.nothing.test");
        assert_eq!(soa.data().rname().to_string(), "noop.nothing.test");
    }

    #[test]
    fn bad_names_do_not_compose() {
        let request = request("example.com", 15);
        let response = Response::answered(
            Outcome::Recursive,
            "example.com",
            vec![crate::store::Record::new(
                crate::store::Id::external(),
                "example.com",
                60,
                RecordData::Mx {
                    priority: 10,
                    exchange: "bad..name".into(),
                },
            )],
        );
        assert!(matches!(
            compose_response(&request, &response, true),
            Err(WireError::InvalidName(_))
        ));
        let bytes = compose_error(&request, Rcode::SERVFAIL).unwrap();
        let msg = Message::from_octets(bytes).unwrap();
        assert_eq!(msg.header().rcode(), Rcode::SERVFAIL);
        assert_eq!(msg.header().id(), 4711);
    }

    #[test]
    fn truncated_response() {
        let bytes = compose_truncated(&request("example.com", 16)).unwrap();
        let msg = Message::from_octets(bytes).unwrap();
        assert!(msg.header().tc());
        assert_eq!(msg.header_counts().ancount(), 0);
    }
}
