//! # Dosewatch Store
//! Alarm record persistence backends.

pub mod mem;
pub mod sqlite;

use std::sync::Arc;

use dosewatch_core::config::DosewatchConfig;
use dosewatch_core::error::{DosewatchError, Result};
use dosewatch_core::traits::AlarmStore;

pub use mem::MemoryStore;
pub use sqlite::SqliteStore;

/// Create an alarm store from configuration.
pub fn create_store(config: &DosewatchConfig) -> Result<Arc<dyn AlarmStore>> {
    match config.store.backend.as_str() {
        "sqlite" => Ok(Arc::new(SqliteStore::open(&config.store_path())?)),
        "memory" => Ok(Arc::new(MemoryStore::new())),
        other => Err(DosewatchError::config(format!(
            "Unknown store backend: {other}"
        ))),
    }
}
