//! Native exact-alarm bridge capability interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What the platform currently grants for exact wake-ups.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BridgeCapability {
    /// Precise wake-ups survive process death and power management.
    Exact,
    /// The platform downgraded exact scheduling (restricted power mode, or
    /// no wake primitive at all); the dispatcher interval is the fallback.
    BestEffort,
    /// The user has not granted the exact-alarm permission.
    Denied,
}

/// Translates a desired absolute fire time into a platform wake primitive.
///
/// `schedule` is idempotent per `(id, fire_at)`: repeat calls before firing
/// must not create duplicate wake-ups; a different `fire_at` for the same id
/// replaces the pending reservation. Platforms generally refuse indefinite
/// future reservations, so callers re-schedule a bounded lookahead window on
/// every foreground resume and after every successful reconciliation.
///
/// Calls must return within a short bound; callers wrap them in a timeout
/// and degrade to best-effort scheduling when it trips.
#[async_trait]
pub trait ExactAlarmBridge: Send + Sync {
    fn name(&self) -> &str;

    async fn schedule(
        &self,
        id: &str,
        fire_at: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Result<()>;

    /// Remove a pending wake-up if present, else no-op.
    async fn cancel(&self, id: &str) -> Result<()>;

    /// Clear every pending wake-up (used before a full reschedule pass).
    async fn cancel_all(&self) -> Result<()>;

    async fn check_capability(&self) -> BridgeCapability;
}
