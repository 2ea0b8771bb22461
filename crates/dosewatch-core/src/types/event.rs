//! Events crossing Dosewatch's boundaries: domain events flowing up to the
//! UI/business collaborators, and wake events flowing in from the bridge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outbound domain events. Dosewatch never interprets these further; the
/// consuming collaborator (UI, dose tracking, launcher) does.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    /// The user confirmed the dose from the notification.
    DoseTaken {
        alarm_id: String,
        at: DateTime<Utc>,
    },
    /// The user tapped through; a foreground context should navigate to the
    /// alarm (or be launched).
    OpenRequested { alarm_id: String },
    /// Presentation or exact scheduling is blocked until the user resolves a
    /// platform permission. Must reach the user, never swallowed.
    PermissionProblem { detail: String },
    /// Local storage failed; ticks are being skipped.
    StorageProblem { detail: String },
}

/// A wake-up delivered by an exact-alarm bridge when a reserved fire time
/// arrives. The receiving dispatcher responds by running a tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WakeEvent {
    pub id: String,
    pub fire_at: DateTime<Utc>,
    pub payload: serde_json::Value,
}
