//! The Consul key-value adapter.
//!
//! Zones and records live under a configurable key prefix, one key per
//! entry, with the JSON form of the entry as value:
//!
//! ```text
//! <root>/zones/<id>    -> {"name": "example.com", ...}
//! <root>/records/<id>  -> {"zoneId": "...", "name": "www", ...}
//! ```
//!
//! The adapter follows changes with Consul blocking queries and publishes
//! a complete snapshot whenever the key tree changes. It does not accept
//! changes through the store; those are made in Consul.

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    Adapter, Capabilities, Id, Record, Refresh, Refresher, Snapshot, Store,
    Zone,
};
use crate::error::StoreError;

//------------ ConsulAdapter -------------------------------------------------

/// An adapter mirroring a Consul key-value tree.
#[derive(Clone, Debug)]
pub struct ConsulAdapter {
    client: reqwest::Client,
    endpoint: String,
    root: String,
}

impl ConsulAdapter {
    /// How long Consul may hold a blocking query.
    pub const WAIT: &'static str = "5m";

    /// How long to wait before retrying after a failed query.
    pub const RETRY_DELAY: Duration = Duration::from_secs(1);

    /// The request timeout, a bit longer than [`Self::WAIT`].
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(330);

    /// Creates an adapter for the tree at `root` of the agent at
    /// `endpoint`, e.g. `http://127.0.0.1:8500`.
    pub fn new(endpoint: &str, root: &str) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .map_err(|err| StoreError::Remote(err.to_string()))?;
        Ok(ConsulAdapter {
            client,
            endpoint: endpoint.trim_end_matches('/').into(),
            root: root.trim_matches('/').into(),
        })
    }

    /// Starts following the key tree, publishing into `store`.
    pub fn watch(self, store: Arc<Store>) -> Refresher {
        Refresher::from_task(tokio::spawn(self.run(store)))
    }

    async fn run(self, store: Arc<Store>) {
        let mut index = 0;
        loop {
            match self.fetch(index).await {
                Ok((next, snapshot)) => {
                    // A smaller index means the agent's state was reset.
                    index = if next < index { 0 } else { next };
                    if store.publish(snapshot) {
                        debug!(index, "Consul tree changed");
                    }
                }
                Err(err) => {
                    warn!("Failed to query Consul: {err}");
                    tokio::time::sleep(Self::RETRY_DELAY).await;
                }
            }
        }
    }

    /// Fetches the key tree, blocking until it changes past `index`.
    async fn fetch(&self, index: u64) -> Result<(u64, Snapshot), StoreError> {
        let url = format!(
            "{}/v1/kv/{}/?recurse=true&index={}&wait={}",
            self.endpoint,
            self.root,
            index,
            Self::WAIT
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| StoreError::Remote(err.to_string()))?;

        let next = response
            .headers()
            .get("X-Consul-Index")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(index);

        // Consul answers 404 for an empty tree.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok((next, Snapshot::new()));
        }
        if !response.status().is_success() {
            return Err(StoreError::Remote(format!(
                "unexpected status {}",
                response.status()
            )));
        }
        let entries: Vec<KvEntry> = response
            .json()
            .await
            .map_err(|err| StoreError::Remote(err.to_string()))?;
        Ok((next, assemble(&self.root, entries)))
    }
}

impl Adapter for ConsulAdapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            writable: false,
            refresh: Refresh::Watch,
        }
    }

    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        // The watch delivers the content.
        Ok(None)
    }

    fn persist(&self, _snapshot: &Snapshot) -> Result<(), StoreError> {
        Err(StoreError::ReadOnly)
    }
}

//------------ KvEntry -------------------------------------------------------

/// One entry of a Consul KV listing.
#[derive(Clone, Debug, Deserialize)]
struct KvEntry {
    #[serde(rename = "Key")]
    key: String,

    /// The base64 encoded value. Absent for folder keys.
    #[serde(rename = "Value")]
    value: Option<String>,
}

//------------ assemble ------------------------------------------------------

/// Builds a snapshot from a KV listing.
///
/// Entries that are not below `<root>/zones/` or `<root>/records/` are
/// ignored, entries that cannot be decoded are skipped with a warning.
fn assemble(root: &str, entries: Vec<KvEntry>) -> Snapshot {
    let mut snapshot = Snapshot::new();
    for entry in entries {
        let Some(rest) = entry
            .key
            .strip_prefix(root)
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            continue;
        };
        let Some((table, id)) = rest.split_once('/') else {
            continue;
        };
        if id.is_empty() || id.contains('/') {
            continue;
        }
        let Some(value) = entry.value.as_deref() else {
            continue;
        };
        let value = match STANDARD.decode(value) {
            Ok(value) => value,
            Err(err) => {
                warn!(key = %entry.key, "Skipping undecodable value: {err}");
                continue;
            }
        };
        let res = match table {
            "zones" => serde_json::from_slice::<Zone>(&value)
                .map(|zone| snapshot.insert_zone(Id::from(id), zone)),
            "records" => serde_json::from_slice::<Record>(&value)
                .map(|record| snapshot.insert_record(Id::from(id), record)),
            _ => continue,
        };
        if let Err(err) = res {
            warn!(key = %entry.key, "Skipping malformed entry: {err}");
        }
    }
    snapshot
}

//============ Testing =======================================================
