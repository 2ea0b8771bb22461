//! Cloud collaborator surface.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::AlarmRecord;

/// Shared remote store for the authenticated principal. The remote schema
/// mirrors [`AlarmRecord`]'s wire form plus server-only bookkeeping fields
/// the reconciler never replicates.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    fn name(&self) -> &str;

    /// Full listing for the principal. An empty listing is meaningful to the
    /// reconciler ("not yet pushed"), so transport failures must be errors,
    /// never an empty `Ok`.
    async fn list(&self) -> Result<Vec<AlarmRecord>>;

    async fn upsert(&self, record: &AlarmRecord) -> Result<()>;

    async fn delete(&self, id: &str) -> Result<()>;
}
