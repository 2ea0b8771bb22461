//! Alarm record store trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::AlarmRecord;

/// Durable persistence keyed by alarm id.
///
/// The store exclusively owns persistence: every other component operates on
/// copies and writes back only through [`AlarmStore::save`]. Upserts are
/// atomic — readers never observe a half-written record. Within one process
/// the store serializes writers; it offers no cross-process or cross-device
/// guarantee (that is the reconciler's job).
///
/// Durability across abrupt process termination is weak by design: callers
/// must not assume a save completed without its `Ok`.
#[async_trait]
pub trait AlarmStore: Send + Sync {
    fn name(&self) -> &str;

    /// Snapshot of all live (non-quarantined) records.
    async fn get_all(&self) -> Result<Vec<AlarmRecord>>;

    async fn get_by_id(&self, id: &str) -> Result<Option<AlarmRecord>>;

    /// Upsert by id. The single mutation entrypoint.
    async fn save(&self, record: AlarmRecord) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Enabled records with `scheduled_at` in `(from, to]`, via the
    /// scheduled_at index — the dispatcher's due scan stays sublinear.
    async fn due_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AlarmRecord>>;
}
