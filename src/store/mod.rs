//! The record store.
//!
//! A [`Store`] owns the zones and records the engine answers from. It
//! exposes the management operations (add, update and delete zones and
//! records) and hands out immutable [`Snapshot`]s for reading.
//!
//! Where the data lives is decided by an [`Adapter`]:
//!
//! * [`MemoryAdapter`] keeps everything in process and is meant for
//!   testing,
//! * [`FileAdapter`] persists a JSON document to a single file and is
//!   re-read periodically so that edits made by other processes are
//!   picked up, and
//! * [`ConsulAdapter`] mirrors a Consul key-value tree through a watch.
//!   Its content is managed through Consul, the store refuses changes.
//!
//! # Consistency
//!
//! Every change is applied to a private copy of the current snapshot,
//! written through to the adapter and only then published with an atomic
//! pointer swap. Refreshes publish complete replacement snapshots the same
//! way. Readers therefore always see a whole snapshot, never one that is
//! being changed. Changes and refreshes of one store are serialized.

mod consul;
mod file;
mod memory;
mod model;
mod refresh;
mod snapshot;

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::BackendConfig;
use crate::error::StoreError;

pub use self::consul::ConsulAdapter;
pub use self::file::FileAdapter;
pub use self::memory::MemoryAdapter;
pub use self::model::{
    Authority, Id, Record, RecordData, RecordPatch, RecordType,
    UnknownRecordType, Zone, ZonePatch,
};
pub use self::refresh::Refresher;
pub use self::snapshot::Snapshot;

//------------ Adapter -------------------------------------------------------

/// Where a store keeps its data.
pub trait Adapter: Send + Sync {
    /// Returns what the adapter can do.
    fn capabilities(&self) -> Capabilities;

    /// Reads the persisted snapshot.
    ///
    /// Returns `Ok(None)` if the adapter has nothing to read, i.e., the
    /// in-process snapshot is authoritative or is fed from elsewhere.
    fn load(&self) -> Result<Option<Snapshot>, StoreError>;

    /// Writes a snapshot through to the persistent storage.
    fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

//------------ Capabilities --------------------------------------------------

/// The capabilities of an adapter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Capabilities {
    /// Whether the store may be changed through its management operations.
    pub writable: bool,

    /// How the in-process snapshot is kept current.
    pub refresh: Refresh,
}

/// How the in-process snapshot of a store is refreshed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Refresh {
    /// The snapshot only changes through the store itself.
    Never,

    /// The adapter is re-read at a fixed interval.
    Poll(Duration),

    /// The adapter pushes complete snapshots when its source changes.
    Watch,
}

//------------ Store ---------------------------------------------------------

/// Zones and records behind an adapter.
pub struct Store {
    adapter: Box<dyn Adapter>,
    current: ArcSwap<Snapshot>,
    write: Mutex<()>,
}

impl Store {
    /// Opens a store, reading the adapter's current content.
    pub fn open(adapter: impl Adapter + 'static) -> Result<Self, StoreError> {
        let initial = adapter.load()?.unwrap_or_default();
        Ok(Store {
            adapter: Box::new(adapter),
            current: ArcSwap::from_pointee(initial),
            write: Mutex::new(()),
        })
    }

    /// Creates an empty, in-memory store.
    pub fn memory() -> Self {
        Store {
            adapter: Box::new(MemoryAdapter),
            current: ArcSwap::from_pointee(Snapshot::new()),
            write: Mutex::new(()),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.adapter.capabilities()
    }
}

/// # Reading
///
impl Store {
    /// Returns the most recently published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn all_zones(&self) -> Vec<(Id, Zone)> {
        self.current
            .load()
            .zones()
            .map(|(id, zone)| (id.clone(), zone.clone()))
            .collect()
    }

    pub fn records_of_zone(&self, zone_id: &Id) -> Vec<(Id, Record)> {
        self.current
            .load()
            .records_of_zone(zone_id)
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    pub fn zone(&self, id: &Id) -> Option<Zone> {
        self.current.load().zone(id).cloned()
    }

    pub fn record(&self, id: &Id) -> Option<Record> {
        self.current.load().record(id).cloned()
    }
}

/// # Management
///
impl Store {
    /// Adds a zone and returns it with its new id.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if a zone with the same
    /// name exists.
    pub fn add_zone(&self, zone: Zone) -> Result<(Id, Zone), StoreError> {
        self.modify(|snapshot| {
            let id = snapshot.add_zone(zone.clone())?;
            Ok((id, zone))
        })
    }

    /// Deletes a zone together with all its records.
    pub fn delete_zone(&self, id: &Id) -> Result<(), StoreError> {
        self.modify(|snapshot| snapshot.delete_zone(id))
    }

    /// Merges a partial update into a zone and returns the result.
    pub fn update_zone(
        &self,
        id: &Id,
        patch: ZonePatch,
    ) -> Result<Zone, StoreError> {
        self.modify(|snapshot| snapshot.update_zone(id, patch))
    }

    /// Adds a record and returns it with its new id.
    ///
    /// Fails with [`StoreError::ZoneNotFound`] if the record’s zone does
    /// not exist.
    pub fn add_record(
        &self,
        record: Record,
    ) -> Result<(Id, Record), StoreError> {
        self.modify(|snapshot| {
            let id = snapshot.add_record(record.clone())?;
            Ok((id, record))
        })
    }

    /// Merges a partial update into a record and returns the result.
    pub fn update_record(
        &self,
        id: &Id,
        patch: RecordPatch,
    ) -> Result<Record, StoreError> {
        self.modify(|snapshot| snapshot.update_record(id, patch))
    }

    pub fn delete_record(&self, id: &Id) -> Result<(), StoreError> {
        self.modify(|snapshot| snapshot.delete_record(id))
    }

    fn modify<T>(
        &self,
        op: impl FnOnce(&mut Snapshot) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        if !self.capabilities().writable {
            return Err(StoreError::ReadOnly);
        }
        let _guard = self.write.lock();
        let mut next = Snapshot::clone(&self.current.load());
        let res = op(&mut next)?;
        self.adapter.persist(&next)?;
        self.current.store(Arc::new(next));
        Ok(res)
    }
}

/// # Refreshing
///
impl Store {
    /// Re-reads the adapter and publishes what it returned.
    ///
    /// Returns whether the published snapshot changed.
    pub fn refresh(&self) -> Result<bool, StoreError> {
        let _guard = self.write.lock();
        match self.adapter.load()? {
            Some(snapshot) => Ok(self.replace(snapshot)),
            None => Ok(false),
        }
    }

    /// Publishes a snapshot assembled elsewhere.
    ///
    /// This is how watching adapters deliver changes.
    pub fn publish(&self, snapshot: Snapshot) -> bool {
        let _guard = self.write.lock();
        self.replace(snapshot)
    }

    fn replace(&self, snapshot: Snapshot) -> bool {
        if **self.current.load() == snapshot {
            return false;
        }
        debug!(
            zones = snapshot.zone_count(),
            records = snapshot.record_count(),
            "Publishing new snapshot"
        );
        self.current.store(Arc::new(snapshot));
        true
    }
}

//------------ open ----------------------------------------------------------

/// Opens the store described by the configuration.
///
/// Also starts whatever keeps the store’s snapshot current. The returned
/// [`Refresher`] stops it when dropped. Must be called from within a Tokio
/// runtime.
pub fn open(
    config: &BackendConfig,
) -> Result<(Arc<Store>, Refresher), StoreError> {
    match config {
        BackendConfig::Memory => {
            Ok((Arc::new(Store::memory()), Refresher::idle()))
        }
        BackendConfig::File {
            path,
            poll_interval,
        } => {
            let adapter = FileAdapter::new(
                path.clone(),
                Duration::from_millis(*poll_interval),
            )?;
            let store = Arc::new(Store::open(adapter)?);
            let refresher = Refresher::start(store.clone());
            Ok((store, refresher))
        }
        BackendConfig::Consul { endpoint, root } => {
            let adapter = ConsulAdapter::new(endpoint, root)?;
            let watcher = adapter.clone();
            let store = Arc::new(Store::open(adapter)?);
            let refresher = watcher.watch(store.clone());
            Ok((store, refresher))
        }
    }
}

//============ Testing =======================================================
