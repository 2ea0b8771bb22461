//! The alarm record — the persisted unit describing one scheduled reminder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recurrence rule for an alarm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Once,
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::Once => "once",
            Recurrence::Hourly => "hourly",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "once" => Some(Recurrence::Once),
            "hourly" => Some(Recurrence::Hourly),
            "daily" => Some(Recurrence::Daily),
            "weekly" => Some(Recurrence::Weekly),
            "monthly" => Some(Recurrence::Monthly),
            _ => None,
        }
    }
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a fired alarm should be presented by the host notification layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationFlags {
    #[serde(default = "default_true")]
    pub sound: bool,
    #[serde(default)]
    pub vibrate: bool,
    #[serde(default)]
    pub silent: bool,
    #[serde(default)]
    pub require_interaction: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PresentationFlags {
    fn default() -> Self {
        Self {
            sound: true,
            vibrate: false,
            silent: false,
            require_interaction: false,
        }
    }
}

/// One scheduled reminder.
///
/// Exactly one `scheduled_at` per record: recurring alarms are advanced in
/// place after firing, never duplicated. `enabled = false` makes the record
/// inert for dispatch but it is retained until explicit deletion.
///
/// The `advanced_at` / `synced_at` pair is local bookkeeping for the
/// reconciler and never crosses the wire (`serde(skip)`): `advanced_at`
/// marks a post-fire advance by the local dispatcher, `synced_at` marks the
/// last successful exchange with the remote store. `synced_at = None` means
/// "not yet pushed" and exempts the record from deletion-by-absence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlarmRecord {
    pub id: String,
    pub title: String,
    pub message: String,
    pub scheduled_at: DateTime<Utc>,
    pub enabled: bool,
    pub recurrence: Recurrence,
    #[serde(default)]
    pub flags: PresentationFlags,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub last_triggered: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(skip)]
    pub advanced_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub synced_at: Option<DateTime<Utc>>,
}

impl AlarmRecord {
    /// Create a new enabled record with a fresh v4 id.
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        recurrence: Recurrence,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            message: message.into(),
            scheduled_at,
            enabled: true,
            recurrence,
            flags: PresentationFlags::default(),
            category: None,
            last_triggered: None,
            created_at: Utc::now(),
            metadata: serde_json::Map::new(),
            advanced_at: None,
            synced_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_defaults() {
        let at = Utc::now();
        let rec = AlarmRecord::new("Metformin", "Take 500mg with food", at, Recurrence::Daily);
        assert!(rec.enabled);
        assert!(!rec.id.is_empty());
        assert_eq!(rec.scheduled_at, at);
        assert!(rec.last_triggered.is_none());
        assert!(rec.advanced_at.is_none());
        assert!(rec.synced_at.is_none());
    }

    #[test]
    fn test_recurrence_parse_roundtrip() {
        for r in [
            Recurrence::Once,
            Recurrence::Hourly,
            Recurrence::Daily,
            Recurrence::Weekly,
            Recurrence::Monthly,
        ] {
            assert_eq!(Recurrence::parse(r.as_str()), Some(r));
        }
        assert_eq!(Recurrence::parse("fortnightly"), None);
    }

    #[test]
    fn test_bookkeeping_never_serialized() {
        let mut rec = AlarmRecord::new("a", "b", Utc::now(), Recurrence::Once);
        rec.advanced_at = Some(Utc::now());
        rec.synced_at = Some(Utc::now());

        let json = serde_json::to_string(&rec).unwrap();
        assert!(!json.contains("advanced_at"));
        assert!(!json.contains("synced_at"));

        // Unknown server-side bookkeeping is ignored on decode.
        let wire = r#"{
            "id": "x", "title": "t", "message": "m",
            "scheduled_at": "2026-03-01T08:00:00Z",
            "enabled": true, "recurrence": "daily",
            "created_at": "2026-01-01T00:00:00Z",
            "server_rev": 42
        }"#;
        let parsed: AlarmRecord = serde_json::from_str(wire).unwrap();
        assert_eq!(parsed.recurrence, Recurrence::Daily);
        assert!(parsed.synced_at.is_none());
    }
}
