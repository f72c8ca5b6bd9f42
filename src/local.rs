//! Resolving names in local domains through the host.
//!
//! Names in the configured local domains bypass the record store. Their
//! IPv4 addresses are looked up with the host’s own resolver, i.e.,
//! whatever `/etc/hosts`, mDNS or the system’s name service switch know
//! about them.

use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr};

use tracing::debug;

use crate::config::LocalConfig;
use crate::error::ResolveError;
use crate::lookup::is_within;
use crate::response::Query;
use crate::store::{Id, Record, RecordData, RecordType};

/// The TTL of records produced by the host resolver.
pub const LOCAL_TTL: u32 = 600;

//------------ HostLookup ----------------------------------------------------

/// Looking up the IPv4 addresses of a host name.
pub trait HostLookup: Send + Sync {
    fn lookup_ipv4(
        &self,
        name: &str,
    ) -> impl Future<Output = io::Result<Vec<Ipv4Addr>>> + Send;
}

//------------ SystemHosts ---------------------------------------------------

/// The operating system’s resolver.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemHosts;

impl HostLookup for SystemHosts {
    async fn lookup_ipv4(&self, name: &str) -> io::Result<Vec<Ipv4Addr>> {
        let mut res = Vec::new();
        for addr in tokio::net::lookup_host((name, 0)).await? {
            if let IpAddr::V4(addr) = addr.ip() {
                if !res.contains(&addr) {
                    res.push(addr);
                }
            }
        }
        Ok(res)
    }
}

//------------ LocalResolver -------------------------------------------------

/// Resolves A queries for names in local domains.
#[derive(Clone, Debug)]
pub struct LocalResolver<H = SystemHosts> {
    hosts: H,
    enabled: bool,
    domains: Vec<String>,
}

impl LocalResolver<SystemHosts> {
    pub fn new(config: &LocalConfig) -> Self {
        Self::with_hosts(config, SystemHosts)
    }
}

impl<H: HostLookup> LocalResolver<H> {
    /// Creates a resolver using the given host lookup.
    pub fn with_hosts(config: &LocalConfig, hosts: H) -> Self {
        LocalResolver {
            hosts,
            enabled: config.enabled,
            domains: config.domains.clone(),
        }
    }

    /// Returns whether a query is to be answered by the host.
    ///
    /// This is the case for A queries for names in one of the local
    /// domains if local resolution is enabled.
    pub fn applies(&self, query: &Query) -> bool {
        self.enabled
            && query.record_type() == Some(RecordType::A)
            && self
                .domains
                .iter()
                .any(|domain| is_within(&query.name, domain))
    }

    /// Resolves a name, turning failure into an empty result.
    pub async fn resolve(&self, name: &str) -> Vec<Record> {
        match self.try_resolve(name).await {
            Ok(records) => records,
            Err(err) => {
                debug!(%name, "{err}");
                Vec::new()
            }
        }
    }

    /// Resolves a name into A records.
    pub async fn try_resolve(
        &self,
        name: &str,
    ) -> Result<Vec<Record>, ResolveError> {
        let addrs = self
            .hosts
            .lookup_ipv4(name)
            .await
            .map_err(ResolveError::LocalResolutionFailure)?;
        Ok(addrs
            .into_iter()
            .map(|address| {
                Record::new(
                    Id::hosts(),
                    name,
                    LOCAL_TTL,
                    RecordData::A { address },
                )
            })
            .collect())
    }
}

//============ Testing =======================================================
