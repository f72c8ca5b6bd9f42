//! Error types shared across the engine.
//!
//! Record store errors are returned to whoever drives the management
//! surface. Resolution errors never leave the engine: they are logged and
//! the query falls through to the next tier.

use std::error;
use std::fmt;
use std::io;

use crate::store::Id;

//------------ StoreError ----------------------------------------------------

/// An operation on the record store failed.
#[derive(Debug)]
pub enum StoreError {
    /// No zone or record with the given id exists.
    NotFound { kind: EntryKind, id: Id },

    /// A zone with the given name already exists.
    AlreadyExists { name: String },

    /// A record refers to a zone that does not exist.
    ZoneNotFound { id: Id },

    /// The adapter does not accept changes through the store.
    ///
    /// This is the case for adapters whose content is managed by an
    /// external coordination service.
    ReadOnly,

    /// Reading or writing the persisted document failed.
    Io(io::Error),

    /// The persisted document could not be (de)serialized.
    Format(serde_json::Error),

    /// The remote coordination service misbehaved.
    Remote(String),
}

impl StoreError {
    pub(crate) fn zone_not_found(id: &Id) -> Self {
        StoreError::NotFound {
            kind: EntryKind::Zone,
            id: id.clone(),
        }
    }

    pub(crate) fn record_not_found(id: &Id) -> Self {
        StoreError::NotFound {
            kind: EntryKind::Record,
            id: id.clone(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound { kind, id } => {
                write!(f, "{kind} with id {id} not found")
            }
            StoreError::AlreadyExists { name } => {
                write!(f, "zone {name} already exists")
            }
            StoreError::ZoneNotFound { id } => {
                write!(f, "zone with id {id} not found")
            }
            StoreError::ReadOnly => {
                write!(f, "backend is managed through its coordination service")
            }
            StoreError::Io(err) => write!(f, "I/O error: {err}"),
            StoreError::Format(err) => write!(f, "malformed document: {err}"),
            StoreError::Remote(reason) => write!(f, "remote store: {reason}"),
        }
    }
}

impl error::Error for StoreError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err),
            StoreError::Format(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Format(err)
    }
}

//------------ EntryKind -----------------------------------------------------

/// What kind of entry a [`StoreError::NotFound`] is about.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EntryKind {
    Zone,
    Record,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Zone => f.write_str("zone"),
            EntryKind::Record => f.write_str("record"),
        }
    }
}

//------------ ResolveError --------------------------------------------------

/// A resolution tier outside the record store failed.
#[derive(Debug)]
pub enum ResolveError {
    /// The upstream resolvers did not produce a usable answer.
    ///
    /// This covers timeouts, network errors, negative rcodes and
    /// unparseable responses alike.
    UpstreamFailure(String),

    /// The operating system resolver failed.
    LocalResolutionFailure(io::Error),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::UpstreamFailure(reason) => {
                write!(f, "upstream resolution failed: {reason}")
            }
            ResolveError::LocalResolutionFailure(err) => {
                write!(f, "local resolution failed: {err}")
            }
        }
    }
}

impl error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ResolveError::UpstreamFailure(_) => None,
            ResolveError::LocalResolutionFailure(err) => Some(err),
        }
    }
}
