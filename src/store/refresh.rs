//! Keeping a store’s snapshot current.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{Refresh, Store};

//------------ Refresher -----------------------------------------------------

/// The background task refreshing a store.
///
/// Dropping the value stops the task.
#[derive(Debug)]
pub struct Refresher {
    task: Option<JoinHandle<()>>,
}

impl Refresher {
    /// Starts refreshing according to the store’s capabilities.
    ///
    /// Only polling is started here. Watching adapters start their own
    /// task since they need to own the connection to their source.
    pub fn start(store: Arc<Store>) -> Self {
        match store.capabilities().refresh {
            Refresh::Poll(every) => {
                Self::from_task(tokio::spawn(poll(store, every)))
            }
            Refresh::Never | Refresh::Watch => Self::idle(),
        }
    }

    /// A refresher that does nothing.
    pub fn idle() -> Self {
        Refresher { task: None }
    }

    pub(super) fn from_task(task: JoinHandle<()>) -> Self {
        Refresher { task: Some(task) }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the background task.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        self.stop()
    }
}

//------------ poll ----------------------------------------------------------

async fn poll(store: Arc<Store>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately and the store has just been
    // loaded.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let store = store.clone();
        match tokio::task::spawn_blocking(move || store.refresh()).await {
            Ok(Ok(true)) => debug!("Store refreshed from adapter"),
            Ok(Ok(false)) => {}
            Ok(Err(err)) => warn!("Failed to refresh store: {err}"),
            Err(err) => warn!("Store refresh task failed: {err}"),
        }
    }
}
