//! The in-memory adapter.

use super::{Adapter, Capabilities, Refresh, Snapshot};
use crate::error::StoreError;

//------------ MemoryAdapter -------------------------------------------------

/// An adapter that keeps nothing outside the store itself.
///
/// All data is lost when the store is dropped. Use this for tests only.
#[derive(Clone, Copy, Debug, Default)]
pub struct MemoryAdapter;

impl Adapter for MemoryAdapter {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            writable: true,
            refresh: Refresh::Never,
        }
    }

    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        Ok(None)
    }

    fn persist(&self, _snapshot: &Snapshot) -> Result<(), StoreError> {
        Ok(())
    }
}
