//! Queries and the responses the engine produces for them.
//!
//! These types sit between the engine and the wire format. A [`Query`] is
//! the first question of a request; a [`Response`] lists the records for
//! the answer, authority and additional sections with the fields the wire
//! format needs. Turning them into messages is the job of the
//! [`wire`][crate::wire] module.

use std::fmt;

use crate::store::{Authority, Record, RecordData, RecordType};

/// The class value for the Internet.
pub const CLASS_IN: u16 = 1;

/// The record type value of SOA records.
pub const RTYPE_SOA: u16 = 6;

//------------ Query ---------------------------------------------------------

/// A question to answer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Query {
    /// The queried name without a trailing dot.
    pub name: String,

    /// The numeric record type.
    pub qtype: u16,

    /// The numeric class.
    pub qclass: u16,
}

impl Query {
    pub fn new(name: impl Into<String>, qtype: u16, qclass: u16) -> Self {
        Query {
            name: name.into(),
            qtype,
            qclass,
        }
    }

    /// Creates a query of class IN for one of the supported types.
    pub fn of_type(name: impl Into<String>, rtype: RecordType) -> Self {
        Self::new(name, rtype.code(), CLASS_IN)
    }

    /// Returns the record type if it is one the store can hold.
    pub fn record_type(&self) -> Option<RecordType> {
        RecordType::from_code(self.qtype)
    }
}

//------------ Outcome -------------------------------------------------------

/// Which resolution path produced a response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The host resolver answered a name in a local domain.
    Local,

    /// The record store had matching records.
    Authoritative,

    /// An upstream resolver answered.
    Recursive,

    /// Nothing matched, the response carries an SOA only.
    Negative,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Local => "local",
            Outcome::Authoritative => "authoritative",
            Outcome::Recursive => "recursive",
            Outcome::Negative => "negative",
        })
    }
}

//------------ ResourceData --------------------------------------------------

/// The data of a record in a response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ResourceData {
    Record(RecordData),
    Soa(Authority),
}

impl ResourceData {
    /// Returns the numeric record type.
    pub fn rtype(&self) -> u16 {
        match self {
            ResourceData::Record(data) => data.record_type().code(),
            ResourceData::Soa(_) => RTYPE_SOA,
        }
    }
}

//------------ ResourceRecord ------------------------------------------------

/// A record in one of the sections of a response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceRecord {
    pub name: String,
    pub class: u16,
    pub ttl: u32,
    pub data: ResourceData,
}

impl ResourceRecord {
    /// Creates the answer for a record, owned by `name`.
    pub fn answer(name: &str, record: Record) -> Self {
        ResourceRecord {
            name: name.into(),
            class: CLASS_IN,
            ttl: record.ttl,
            data: ResourceData::Record(record.data),
        }
    }

    /// Creates an SOA record for `owner`.
    ///
    /// Its TTL is the authority’s minimum.
    pub fn soa(owner: &str, authority: Authority) -> Self {
        ResourceRecord {
            name: owner.into(),
            class: CLASS_IN,
            ttl: authority.minimum,
            data: ResourceData::Soa(authority),
        }
    }

    pub fn rtype(&self) -> u16 {
        self.data.rtype()
    }
}

//------------ Response ------------------------------------------------------

/// The response to a query.
///
/// A response either has answers or an SOA record in its authority
/// section.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Response {
    pub outcome: Outcome,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl Response {
    /// Creates a response answering `name` with `records`.
    pub fn answered(
        outcome: Outcome,
        name: &str,
        records: Vec<Record>,
    ) -> Self {
        Response {
            outcome,
            answers: records
                .into_iter()
                .map(|record| ResourceRecord::answer(name, record))
                .collect(),
            authorities: Vec::new(),
            additionals: Vec::new(),
        }
    }

    /// Creates a response without answers.
    pub fn negative(owner: &str, authority: Authority) -> Self {
        Response {
            outcome: Outcome::Negative,
            answers: Vec::new(),
            authorities: vec![ResourceRecord::soa(owner, authority)],
            additionals: Vec::new(),
        }
    }

    /// Returns the SOA data of the authority section, if any.
    pub fn soa(&self) -> Option<&Authority> {
        self.authorities.iter().find_map(|record| match &record.data {
            ResourceData::Soa(authority) => Some(authority),
            ResourceData::Record(_) => None,
        })
    }
}
