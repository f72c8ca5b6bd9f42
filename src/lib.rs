//! A DNS resolution engine.
//!
//! This crate answers DNS queries from a store of zones and records,
//! falling back to the host’s resolver for names in local domains and to
//! upstream recursive resolvers for everything the store does not know.
//! If nothing produces an answer, the response carries an SOA record
//! instead.
//!
//! # Modules
//!
//! * [store] holds zones and records behind one of several adapters and
//!   keeps a snapshot of them current,
//! * [lookup] finds the zone and records for a queried name within a
//!   snapshot,
//! * [local] resolves names in local domains through the host,
//! * [recursive] forwards queries to upstream resolvers,
//! * [engine] decides which of these answers a query,
//! * [response] contains the types for queries and their responses,
//! * [wire] translates between those types and DNS messages,
//! * [server] serves queries over UDP and TCP, and
//! * [config] contains the configuration.
//!
//! The `nsengined` binary ties all of this together into a name server.
//!
//! # Example
//!
//! ```
//! use std::net::Ipv4Addr;
//! use nsengine::lookup;
//! use nsengine::store::{Record, RecordData, RecordType, Store, Zone};
//!
//! let store = Store::memory();
//! let (zone_id, _) = store.add_zone(Zone::new("example.com")).unwrap();
//! store.add_record(Record::new(
//!     zone_id, "www", 300,
//!     RecordData::A { address: Ipv4Addr::new(192, 0, 2, 1) },
//! )).unwrap();
//!
//! let records = lookup::resolve(
//!     &store.snapshot(), "www.example.com", RecordType::A
//! );
//! assert_eq!(records[0].name, "www.example.com");
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod local;
pub mod lookup;
pub mod recursive;
pub mod response;
pub mod server;
pub mod store;
pub mod wire;
