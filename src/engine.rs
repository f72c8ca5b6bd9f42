//! Answering queries.
//!
//! The [`Engine`] decides for each query which resolution path produces
//! the answer. It tries them in order:
//!
//! 1. A queries for names in a local domain are answered by the host’s
//!    resolver and nothing else.
//! 2. Otherwise the record store is asked.
//! 3. If the store has no answer, the query is forwarded upstream unless
//!    recursion is disabled or denied for the name’s top-level label.
//!
//! If none of these produce records, the response carries an SOA record
//! in its authority section instead. It is the SOA of the zone the name
//! belongs to, or one made up from the queried name if there is no such
//! zone.
//!
//! Queries are independent of each other. Each one works on the store
//! snapshot current when it started.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use domain::base::iana::{Class, Rtype};
use tracing::info;

use crate::config::{ConfigError, DnsConfig};
use crate::local::{HostLookup, LocalResolver, SystemHosts};
use crate::lookup::{self, trim_root};
use crate::recursive::{Forwarder, StubUpstream, Upstream};
use crate::response::{Outcome, Query, Response};
use crate::store::{Authority, Snapshot, Store};

//------------ Engine --------------------------------------------------------

/// The query orchestrator.
pub struct Engine<U = StubUpstream, H = SystemHosts> {
    store: Arc<Store>,
    local: LocalResolver<H>,
    forwarder: Forwarder<U>,
    request_log: bool,
}

impl Engine {
    /// Creates an engine using the host’s and the configured upstream
    /// resolvers.
    pub fn new(store: Arc<Store>, config: &DnsConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_parts(
            store,
            config,
            LocalResolver::new(&config.local),
            Forwarder::new(&config.recursion)?,
        ))
    }
}

impl<U: Upstream, H: HostLookup> Engine<U, H> {
    pub fn with_parts(
        store: Arc<Store>,
        config: &DnsConfig,
        local: LocalResolver<H>,
        forwarder: Forwarder<U>,
    ) -> Self {
        Engine {
            store,
            local,
            forwarder,
            request_log: config.request_log,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Returns whether queries may be answered recursively.
    pub fn recursion_available(&self) -> bool {
        self.forwarder.is_enabled()
    }

    /// Answers a query.
    ///
    /// This never fails. Whatever goes wrong along the way ends in a
    /// negative response.
    pub async fn handle(
        &self,
        query: &Query,
        client: Option<SocketAddr>,
    ) -> Response {
        let response = self.resolve(query).await;
        if self.request_log {
            let client = client
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| "-".into());
            info!(
                "{client} {} {} {} => {}",
                Class::from_int(query.qclass),
                Rtype::from_int(query.qtype),
                query.name,
                response.outcome
            );
        }
        response
    }

    async fn resolve(&self, query: &Query) -> Response {
        let name = trim_root(&query.name);

        if self.local.applies(query) {
            let records = self.local.resolve(name).await;
            return if records.is_empty() {
                self.negative(&self.store.snapshot(), name)
            } else {
                Response::answered(Outcome::Local, name, records)
            };
        }

        let Some(rtype) = query.record_type() else {
            return self.negative(&self.store.snapshot(), name);
        };

        let snapshot = self.store.snapshot();
        let records = lookup::resolve(&snapshot, name, rtype);
        if !records.is_empty() {
            return Response::answered(Outcome::Authoritative, name, records);
        }

        if self.forwarder.permits(query) {
            let records = self.forwarder.resolve(name, rtype).await;
            if !records.is_empty() {
                return Response::answered(Outcome::Recursive, name, records);
            }
        }

        self.negative(&snapshot, name)
    }

    /// Creates the SOA-only response for a name without answers.
    fn negative(&self, snapshot: &Snapshot, name: &str) -> Response {
        let serial = Utc::now().timestamp() as u32;
        match lookup::split_name(snapshot, name) {
            Some(info) => {
                let authority =
                    info.zone.authority.clone().unwrap_or_else(|| {
                        Authority::synthesize(&info.zone.name, serial)
                    });
                Response::negative(&info.zone.name, authority)
            }
            None => Response::negative(name, Authority::synthesize(name, serial)),
        }
    }
}

//============ Testing =======================================================
