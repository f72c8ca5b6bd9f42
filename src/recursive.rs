//! Forwarding queries to upstream resolvers.
//!
//! Names the record store has no answer for may be forwarded to a list of
//! upstream recursive resolvers. Their answers are translated into
//! ephemeral [`Record`]s tagged with the reserved zone id
//! [`Id::EXTERNAL`] and a fixed TTL.
//!
//! Forwarding never fails a query. If the upstreams cannot be reached or
//! give a negative answer, the result is simply empty.

use std::future::Future;
use std::net::SocketAddr;
use std::str::FromStr;

use domain::base::iana::{Rcode, Rtype};
use domain::base::name::{Name, ParsedName};
use domain::base::Message;
use domain::rdata::{Cname, Mx, Ns, Srv, Txt, A};
use domain::resolv::stub::conf::{ResolvConf, ServerConf, Transport};
use domain::resolv::StubResolver;
use octseq::Octets;
use tracing::{trace, warn};

use crate::config::{ConfigError, RecursionConfig};
use crate::error::ResolveError;
use crate::lookup::{top_label, trim_root};
use crate::response::Query;
use crate::store::{Id, Record, RecordData, RecordType};

/// The TTL of records received from upstream.
pub const RECURSIVE_TTL: u32 = 60;

//------------ Upstream ------------------------------------------------------

/// Asking upstream resolvers.
pub trait Upstream: Send + Sync {
    /// Resolves a name, returning the data of all answers of type `rtype`.
    fn query(
        &self,
        name: &str,
        rtype: RecordType,
    ) -> impl Future<Output = Result<Vec<RecordData>, ResolveError>> + Send;
}

//------------ StubUpstream --------------------------------------------------

/// Upstream resolution through a stub resolver.
///
/// The servers are tried in order using UDP, falling back to TCP for
/// truncated answers.
pub struct StubUpstream {
    resolver: StubResolver,
}

impl StubUpstream {
    pub fn new(servers: &[SocketAddr]) -> Self {
        StubUpstream {
            resolver: StubResolver::from_conf(resolv_conf(servers)),
        }
    }
}

/// Builds the resolver configuration for the given servers.
fn resolv_conf(servers: &[SocketAddr]) -> ResolvConf {
    let mut conf = ResolvConf::new();
    for addr in servers {
        conf.servers.push(ServerConf::new(*addr, Transport::UdpTcp));
    }
    conf.finalize();
    conf
}

impl Upstream for StubUpstream {
    async fn query(
        &self,
        name: &str,
        rtype: RecordType,
    ) -> Result<Vec<RecordData>, ResolveError> {
        let qname = Name::<Vec<u8>>::from_str(name).map_err(|err| {
            ResolveError::UpstreamFailure(format!("invalid name {name}: {err}"))
        })?;
        let answer = self
            .resolver
            .query((qname, Rtype::from_int(rtype.code())))
            .await
            .map_err(|err| ResolveError::UpstreamFailure(err.to_string()))?;
        records_from_message(&*answer, rtype)
    }
}

//------------ records_from_message ------------------------------------------

/// Extracts the data of the answers of type `rtype` from a response.
///
/// Answers of other types, such as the CNAMEs leading to an A record, are
/// skipped. A response code other than NOERROR is an error.
pub fn records_from_message<Octs: Octets>(
    msg: &Message<Octs>,
    rtype: RecordType,
) -> Result<Vec<RecordData>, ResolveError> {
    let rcode = msg.header().rcode();
    if rcode != Rcode::NOERROR {
        return Err(ResolveError::UpstreamFailure(format!(
            "upstream answered {rcode}"
        )));
    }
    let answer = msg.answer().map_err(parse_failure)?;
    let mut res = Vec::new();
    match rtype {
        RecordType::A => {
            for record in answer.limit_to::<A>() {
                let record = record.map_err(parse_failure)?;
                res.push(RecordData::A {
                    address: record.data().addr(),
                });
            }
        }
        RecordType::Ns => {
            for record in answer.limit_to::<Ns<ParsedName<_>>>() {
                let record = record.map_err(parse_failure)?;
                res.push(RecordData::Ns {
                    ns: record.data().nsdname().to_string(),
                });
            }
        }
        RecordType::Cname => {
            for record in answer.limit_to::<Cname<ParsedName<_>>>() {
                let record = record.map_err(parse_failure)?;
                res.push(RecordData::Cname {
                    domain: record.data().cname().to_string(),
                });
            }
        }
        RecordType::Mx => {
            for record in answer.limit_to::<Mx<ParsedName<_>>>() {
                let record = record.map_err(parse_failure)?;
                res.push(RecordData::Mx {
                    priority: record.data().preference(),
                    exchange: record.data().exchange().to_string(),
                });
            }
        }
        RecordType::Txt => {
            for record in answer.limit_to::<Txt<_>>() {
                let record = record.map_err(parse_failure)?;
                res.extend(txt_segments(record.data().iter()));
            }
        }
        RecordType::Srv => {
            for record in answer.limit_to::<Srv<ParsedName<_>>>() {
                let record = record.map_err(parse_failure)?;
                let srv = record.data();
                res.push(RecordData::Srv {
                    priority: srv.priority(),
                    weight: srv.weight(),
                    port: srv.port(),
                    target: srv.target().to_string(),
                });
            }
        }
    }
    Ok(res)
}

/// Turns each character string of a TXT record into its own record data.
fn txt_segments<'a>(
    segments: impl Iterator<Item = &'a [u8]> + 'a,
) -> impl Iterator<Item = RecordData> + 'a {
    segments.map(|segment| RecordData::Txt {
        data: String::from_utf8_lossy(segment).into_owned(),
    })
}

fn parse_failure(err: impl std::fmt::Display) -> ResolveError {
    ResolveError::UpstreamFailure(format!("malformed response: {err}"))
}

//------------ Forwarder -----------------------------------------------------

/// Decides about and performs recursive resolution.
pub struct Forwarder<U = StubUpstream> {
    upstream: U,
    enabled: bool,
    deny: Vec<String>,
}

impl Forwarder<StubUpstream> {
    /// Creates a forwarder asking the configured upstream servers.
    pub fn new(config: &RecursionConfig) -> Result<Self, ConfigError> {
        let upstream = StubUpstream::new(&config.upstream_addrs()?);
        Ok(Self::with_upstream(config, upstream))
    }
}

impl<U: Upstream> Forwarder<U> {
    pub fn with_upstream(config: &RecursionConfig, upstream: U) -> Self {
        Forwarder {
            upstream,
            enabled: config.enabled,
            deny: config
                .deny_recursion
                .iter()
                .map(|label| trim_root(label).to_owned())
                .collect(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns whether a query may be forwarded.
    ///
    /// Forwarding needs to be enabled, the type has to be one records can
    /// be built for and the top-level label of the name must not be on the
    /// deny list.
    pub fn permits(&self, query: &Query) -> bool {
        if !self.enabled || query.record_type().is_none() {
            return false;
        }
        let top = top_label(&query.name);
        !self.deny.iter().any(|deny| deny.eq_ignore_ascii_case(top))
    }

    /// Forwards a query, turning failure into an empty result.
    pub async fn resolve(&self, name: &str, rtype: RecordType) -> Vec<Record> {
        match self.upstream.query(name, rtype).await {
            Ok(data) => {
                trace!(%name, %rtype, answers = data.len(), "upstream answered");
                data.into_iter()
                    .map(|data| {
                        Record::new(Id::external(), name, RECURSIVE_TTL, data)
                    })
                    .collect()
            }
            Err(err) => {
                warn!(%name, %rtype, "{err}");
                Vec::new()
            }
        }
    }
}

//============ Testing =======================================================
