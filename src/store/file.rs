//! The single-file JSON adapter.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, trace};

use super::{Adapter, Capabilities, Refresh, Snapshot};
use crate::error::StoreError;

//------------ FileAdapter ---------------------------------------------------

/// An adapter persisting the store as one JSON document.
///
/// The document has the two members `zones` and `records`, each mapping
/// ids to entries. Other processes may edit the file; the store re-reads
/// it at the configured interval.
///
/// Writes go to a temporary file next to the document which is then
/// renamed over it, so a concurrent reader sees either the old or the new
/// document.
#[derive(Clone, Debug)]
pub struct FileAdapter {
    path: PathBuf,
    poll_interval: Duration,
}

impl FileAdapter {
    /// The default interval for re-reading the document.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

    /// Creates an adapter for the document at `path`.
    ///
    /// An empty document is created if the file does not exist yet.
    pub fn new(
        path: impl Into<PathBuf>,
        poll_interval: Duration,
    ) -> Result<Self, StoreError> {
        let res = FileAdapter {
            path: path.into(),
            poll_interval,
        };
        if !res.path.exists() {
            debug!(path = %res.path.display(), "Creating empty store document");
            res.persist(&Snapshot::new())?;
        }
        Ok(res)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl Adapter for FileAdapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            writable: true,
            refresh: Refresh::Poll(self.poll_interval),
        }
    }

    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        trace!(path = %self.path.display(), "Reading store document");
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(Some(Snapshot::new()))
            }
            Err(err) => return Err(err.into()),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Some(Snapshot::new()));
        }
        Ok(Some(serde_json::from_slice(&data)?))
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(snapshot)?;
        let temp = self.temp_path();
        fs::write(&temp, data)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::{Id, Record, RecordData, Store, Zone};

    fn adapter(dir: &tempfile::TempDir) -> FileAdapter {
        FileAdapter::new(
            dir.path().join("db.json"),
            FileAdapter::DEFAULT_POLL_INTERVAL,
        )
        .unwrap()
    }

    #[test]
    fn creates_missing_document() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = adapter(&dir);
        assert!(adapter.path().exists());
        assert_eq!(adapter.load().unwrap(), Some(Snapshot::new()));
        assert_eq!(
            adapter.capabilities().refresh,
            Refresh::Poll(Duration::from_millis(500))
        );
    }

    #[test]
    fn changes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let (zone_id, record_id) = {
            let store = Store::open(adapter(&dir)).unwrap();
            let (zone_id, _) =
                store.add_zone(Zone::new("example.com")).unwrap();
            let (record_id, _) = store
                .add_record(Record::new(
                    zone_id.clone(),
                    "@",
                    60,
                    RecordData::Ns {
                        ns: "ns1.example.com".into(),
                    },
                ))
                .unwrap();
            (zone_id, record_id)
        };

        let store = Store::open(adapter(&dir)).unwrap();
        assert_eq!(store.zone(&zone_id).unwrap().name, "example.com");
        assert_eq!(store.record(&record_id).unwrap().zone_id, zone_id);
        assert!(!dir.path().join("db.json.tmp").exists());
    }

    #[test]
    fn refresh_picks_up_external_edits() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(adapter(&dir)).unwrap();
        assert!(!store.refresh().unwrap());

        fs::write(
            dir.path().join("db.json"),
            r#"{"zones": {"z1": {"name": "example.org"}}, "records": {}}"#,
        )
        .unwrap();
        assert!(store.refresh().unwrap());
        assert_eq!(store.zone(&Id::from("z1")).unwrap().name, "example.org");
    }

    #[test]
    fn broken_document_keeps_last_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(adapter(&dir)).unwrap();
        store.add_zone(Zone::new("example.com")).unwrap();
        fs::write(dir.path().join("db.json"), "{ not json").unwrap();
        assert!(matches!(store.refresh(), Err(StoreError::Format(_))));
        assert_eq!(store.snapshot().zone_count(), 1);
    }
}
