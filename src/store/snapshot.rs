//! An immutable view of all zones and records.
//!
//! A snapshot is what readers see and what adapters persist. It is never
//! edited while published: the store clones the current snapshot, applies
//! a change to the clone and publishes the result as a whole.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::model::{Id, Record, RecordPatch, Zone, ZonePatch};
use crate::error::StoreError;
use crate::lookup::trim_root;

//------------ Snapshot ------------------------------------------------------

/// The zone and record tables at one point in time.
///
/// Records refer to their zone through [`Record::zone_id`]; the two tables
/// are kept separate in the persisted form, too.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    zones: BTreeMap<Id, Zone>,

    #[serde(default)]
    records: BTreeMap<Id, Record>,
}

/// # Reading
///
impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all zones with their ids.
    pub fn zones(&self) -> impl Iterator<Item = (&Id, &Zone)> {
        self.zones.iter()
    }

    /// Returns all records of the given zone with their ids.
    pub fn records_of_zone<'a>(
        &'a self,
        zone_id: &'a Id,
    ) -> impl Iterator<Item = (&'a Id, &'a Record)> + 'a {
        self.records
            .iter()
            .filter(move |(_, record)| &record.zone_id == zone_id)
    }

    pub fn zone(&self, id: &Id) -> Option<&Zone> {
        self.zones.get(id)
    }

    pub fn record(&self, id: &Id) -> Option<&Record> {
        self.records.get(id)
    }

    /// Returns the zone with the given name.
    ///
    /// Names are compared ignoring ASCII case and a trailing dot.
    pub fn zone_by_name(&self, name: &str) -> Option<(&Id, &Zone)> {
        let name = trim_root(name);
        self.zones.iter().find(|(_, zone)| {
            trim_root(&zone.name).eq_ignore_ascii_case(name)
        })
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// # Changing
///
/// These are only ever applied to a private copy by the store.
impl Snapshot {
    pub(crate) fn add_zone(&mut self, zone: Zone) -> Result<Id, StoreError> {
        if self.zone_by_name(&zone.name).is_some() {
            return Err(StoreError::AlreadyExists { name: zone.name });
        }
        let id = Id::random();
        self.zones.insert(id.clone(), zone);
        Ok(id)
    }

    /// Removes a zone and every record it owns.
    pub(crate) fn delete_zone(&mut self, id: &Id) -> Result<(), StoreError> {
        if self.zones.remove(id).is_none() {
            return Err(StoreError::zone_not_found(id));
        }
        self.records.retain(|_, record| &record.zone_id != id);
        Ok(())
    }

    pub(crate) fn update_zone(
        &mut self,
        id: &Id,
        patch: ZonePatch,
    ) -> Result<Zone, StoreError> {
        if let Some(name) = patch.name.as_ref() {
            if let Some((other, _)) = self.zone_by_name(name) {
                if other != id {
                    return Err(StoreError::AlreadyExists { name: name.clone() });
                }
            }
        }
        let zone = self
            .zones
            .get_mut(id)
            .ok_or_else(|| StoreError::zone_not_found(id))?;
        patch.apply(zone);
        Ok(zone.clone())
    }

    pub(crate) fn add_record(
        &mut self,
        record: Record,
    ) -> Result<Id, StoreError> {
        if !self.zones.contains_key(&record.zone_id) {
            return Err(StoreError::ZoneNotFound { id: record.zone_id });
        }
        let id = Id::random();
        self.records.insert(id.clone(), record);
        Ok(id)
    }

    pub(crate) fn update_record(
        &mut self,
        id: &Id,
        patch: RecordPatch,
    ) -> Result<Record, StoreError> {
        if let Some(zone_id) = patch.zone_id.as_ref() {
            if !self.zones.contains_key(zone_id) {
                return Err(StoreError::ZoneNotFound {
                    id: zone_id.clone(),
                });
            }
        }
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::record_not_found(id))?;
        patch.apply(record);
        Ok(record.clone())
    }

    pub(crate) fn delete_record(&mut self, id: &Id) -> Result<(), StoreError> {
        match self.records.remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::record_not_found(id)),
        }
    }

    /// Inserts a zone under a known id, replacing what was there.
    ///
    /// Used when assembling snapshots from external sources.
    pub(crate) fn insert_zone(&mut self, id: Id, zone: Zone) {
        self.zones.insert(id, zone);
    }

    /// Inserts a record under a known id, replacing what was there.
    pub(crate) fn insert_record(&mut self, id: Id, record: Record) {
        self.records.insert(id, record);
    }
}

//============ Testing =======================================================
