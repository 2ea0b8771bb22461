//! Presentation surface toward the OS notification layer.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Presentation;

/// Shows notifications. Implementations must honor the tag: presenting a
/// second notification with the same tag replaces the first — this is the
/// only dedup point for concurrent dispatchers.
///
/// `PermissionDenied` must be propagated, not swallowed; the caller surfaces
/// it to the user-facing collaborator.
#[async_trait]
pub trait Presenter: Send + Sync {
    fn name(&self) -> &str;

    async fn show(&self, presentation: &Presentation) -> Result<()>;
}
