//! What the dispatcher hands to the host notification layer, and what
//! comes back when the user interacts with it.

use serde::{Deserialize, Serialize};

use super::alarm::{AlarmRecord, PresentationFlags};

/// Stable tag prefix. Tag = prefix + alarm id, so repeated firing for the
/// same id replaces the visible notification instead of stacking, across
/// every dispatcher context on the device.
pub const TAG_PREFIX: &str = "dosewatch-alarm-";

/// User interaction with a presented notification. One interaction causes
/// exactly one transition in the action state machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    Complete,
    Snooze,
    Dismiss,
    Open,
    /// Closed without choosing an action (swiped away by the OS, timeout).
    Close,
}

impl NotificationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationAction::Complete => "complete",
            NotificationAction::Snooze => "snooze",
            NotificationAction::Dismiss => "dismiss",
            NotificationAction::Open => "open",
            NotificationAction::Close => "close",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "complete" => Some(NotificationAction::Complete),
            "snooze" => Some(NotificationAction::Snooze),
            "dismiss" => Some(NotificationAction::Dismiss),
            "open" => Some(NotificationAction::Open),
            "close" => Some(NotificationAction::Close),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single outbound notification request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    pub title: String,
    pub body: String,
    pub tag: String,
    /// Actions offered on the notification itself.
    pub actions: Vec<NotificationAction>,
    /// Opaque payload echoed back on interaction; carries the alarm id.
    pub data: serde_json::Value,
    pub flags: PresentationFlags,
}

impl Presentation {
    /// Build the presentation for a firing alarm record.
    pub fn for_alarm(record: &AlarmRecord) -> Self {
        Self {
            title: record.title.clone(),
            body: record.message.clone(),
            tag: format!("{TAG_PREFIX}{}", record.id),
            actions: vec![
                NotificationAction::Complete,
                NotificationAction::Snooze,
                NotificationAction::Dismiss,
            ],
            data: serde_json::json!({ "alarm_id": record.id }),
            flags: record.flags,
        }
    }

    /// A plain test notification, not tied to any record.
    pub fn test(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            tag: format!("{TAG_PREFIX}test"),
            actions: vec![NotificationAction::Dismiss],
            data: serde_json::Value::Null,
            flags: PresentationFlags::default(),
        }
    }
}
