pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::document::{AccountStore, StoreChange};
use anyhow::Result;
use disk::DiskAccountStore;
use memory::MemoryAccountStore;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Change notifications buffered per subscriber before the oldest are dropped.
pub(crate) const CHANGE_BUFFER: usize = 64;

pub(crate) fn notify(changes: &broadcast::Sender<StoreChange>, change: StoreChange) {
    // No subscribers is not an error
    if changes.send(change).is_err() {
        debug!("No store subscribers to notify");
    }
}

/// Opens the account store described by the configuration.
pub fn open_store(config: &AppConfig, ephemeral: bool) -> Result<Arc<dyn AccountStore>> {
    if ephemeral {
        debug!("Using in-memory account store");
        return Ok(Arc::new(MemoryAccountStore::new()));
    }
    let path = config.data_path()?.join("store");
    Ok(Arc::new(DiskAccountStore::open(&path)?))
}
