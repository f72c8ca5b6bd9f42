//! Zones, records and their partial updates.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

//------------ Id ------------------------------------------------------------

/// The opaque identifier of a zone or record.
///
/// Fresh identifiers are random version 4 UUIDs. Two
/// identifiers are reserved for records that never touch the store:
/// [`Id::hosts`] for answers from the host resolver and [`Id::external`]
/// for answers relayed from upstream servers.
#[derive(
    Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// The zone id carried by records produced by the host resolver.
    pub const HOSTS: &'static str = "hosts";

    /// The zone id carried by records relayed from upstream servers.
    pub const EXTERNAL: &'static str = "external";

    /// Creates a new random identifier.
    pub fn random() -> Self {
        Id(Uuid::new_v4().to_string())
    }

    pub fn hosts() -> Self {
        Id(Self::HOSTS.into())
    }

    pub fn external() -> Self {
        Id(Self::EXTERNAL.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Id {
    fn from(src: &str) -> Self {
        Id(src.into())
    }
}

impl From<String> for Id {
    fn from(src: String) -> Self {
        Id(src)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//------------ Zone ----------------------------------------------------------

/// An administrative domain owning a set of records.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// The domain name of the zone apex, e.g. `example.com`.
    pub name: String,

    /// The SOA data to hand out for negative answers in this zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<Authority>,
}

impl Zone {
    pub fn new(name: impl Into<String>) -> Self {
        Zone {
            name: name.into(),
            authority: None,
        }
    }

    pub fn with_authority(mut self, authority: Authority) -> Self {
        self.authority = Some(authority);
        self
    }
}

//------------ Authority -----------------------------------------------------

/// Start of authority data for a zone.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Authority {
    pub primary: String,
    pub admin: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expiration: u32,
    pub minimum: u32,
}

impl Authority {
    /// The timer value used for all intervals of synthesized authorities.
    pub const SYNTHETIC_TIMER: u32 = 600;

    /// Synthesizes authority data for a name that has none configured.
    pub fn synthesize(name: &str, serial: u32) -> Self {
        Authority {
            primary: format!("ns.{name}"),
            admin: format!("noop.{name}"),
            serial,
            refresh: Self::SYNTHETIC_TIMER,
            retry: Self::SYNTHETIC_TIMER,
            expiration: Self::SYNTHETIC_TIMER,
            minimum: Self::SYNTHETIC_TIMER,
        }
    }
}

//------------ ZonePatch -----------------------------------------------------

/// A partial update of a zone.
///
/// Fields that are present overwrite the stored value, all others are
/// retained.
#[derive(Clone, Debug, Default)]
pub struct ZonePatch {
    pub name: Option<String>,
    pub authority: Option<Authority>,
}

impl ZonePatch {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn authority(mut self, authority: Authority) -> Self {
        self.authority = Some(authority);
        self
    }

    pub(crate) fn apply(self, zone: &mut Zone) {
        if let Some(name) = self.name {
            zone.name = name;
        }
        if let Some(authority) = self.authority {
            zone.authority = Some(authority);
        }
    }
}

//------------ RecordType ----------------------------------------------------

/// The record types the store can hold.
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Ns,
    Cname,
    Mx,
    Txt,
    Srv,
}

impl RecordType {
    /// Returns the type for a numeric RR type value if it is supported.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(RecordType::A),
            2 => Some(RecordType::Ns),
            5 => Some(RecordType::Cname),
            15 => Some(RecordType::Mx),
            16 => Some(RecordType::Txt),
            33 => Some(RecordType::Srv),
            _ => None,
        }
    }

    /// Returns the numeric RR type value.
    pub fn code(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Ns => 2,
            RecordType::Cname => 5,
            RecordType::Mx => 15,
            RecordType::Txt => 16,
            RecordType::Srv => 33,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Ns => "NS",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Txt => "TXT",
            RecordType::Srv => "SRV",
        }
    }
}

impl FromStr for RecordType {
    type Err = UnknownRecordType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            RecordType::A,
            RecordType::Ns,
            RecordType::Cname,
            RecordType::Mx,
            RecordType::Txt,
            RecordType::Srv,
        ]
        .into_iter()
        .find(|rtype| rtype.as_str().eq_ignore_ascii_case(s))
        .ok_or(UnknownRecordType)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//------------ UnknownRecordType ---------------------------------------------

/// A record type mnemonic is not one the store supports.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UnknownRecordType;

impl fmt::Display for UnknownRecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown record type")
    }
}

impl std::error::Error for UnknownRecordType {}

//------------ RecordData ----------------------------------------------------

/// The type specific payload of a record.
///
/// The variant determines the record type. Serialized, it appears as the
/// two fields `type` and `data` of the record it belongs to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RecordData {
    A {
        address: Ipv4Addr,
    },
    #[serde(rename = "NS")]
    Ns {
        ns: String,
    },
    #[serde(rename = "CNAME")]
    Cname {
        domain: String,
    },
    #[serde(rename = "MX")]
    Mx {
        priority: u16,
        exchange: String,
    },
    #[serde(rename = "TXT")]
    Txt {
        data: String,
    },
    #[serde(rename = "SRV")]
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
}

impl RecordData {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordData::A { .. } => RecordType::A,
            RecordData::Ns { .. } => RecordType::Ns,
            RecordData::Cname { .. } => RecordType::Cname,
            RecordData::Mx { .. } => RecordType::Mx,
            RecordData::Txt { .. } => RecordType::Txt,
            RecordData::Srv { .. } => RecordType::Srv,
        }
    }
}

//------------ Record --------------------------------------------------------

/// A single resource record owned by a zone.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// The zone this record belongs to.
    pub zone_id: Id,

    /// The owner label relative to the zone.
    ///
    /// `@` stands for the apex, a leading `*.` (or a lone `*`) marks a
    /// wildcard.
    pub name: String,

    pub ttl: u32,

    #[serde(flatten)]
    pub data: RecordData,
}

impl Record {
    pub fn new(
        zone_id: Id,
        name: impl Into<String>,
        ttl: u32,
        data: RecordData,
    ) -> Self {
        Record {
            zone_id,
            name: name.into(),
            ttl,
            data,
        }
    }

    pub fn record_type(&self) -> RecordType {
        self.data.record_type()
    }
}

//------------ RecordPatch ---------------------------------------------------

/// A partial update of a record.
///
/// Replacing the data replaces the record type along with it.
#[derive(Clone, Debug, Default)]
pub struct RecordPatch {
    pub zone_id: Option<Id>,
    pub name: Option<String>,
    pub ttl: Option<u32>,
    pub data: Option<RecordData>,
}

impl RecordPatch {
    pub fn zone_id(mut self, zone_id: Id) -> Self {
        self.zone_id = Some(zone_id);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn data(mut self, data: RecordData) -> Self {
        self.data = Some(data);
        self
    }

    pub(crate) fn apply(self, record: &mut Record) {
        if let Some(zone_id) = self.zone_id {
            record.zone_id = zone_id;
        }
        if let Some(name) = self.name {
            record.name = name;
        }
        if let Some(ttl) = self.ttl {
            record.ttl = ttl;
        }
        if let Some(data) = self.data {
            record.data = data;
        }
    }
}

//============ Testing =======================================================
