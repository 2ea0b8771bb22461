//! Notification action state machine.
//!
//! A presented notification moves through exactly one transition per user
//! interaction: Completed, Snoozed, Dismissed, Opened, or
//! closed-without-action. The interaction payload is parsed once at the
//! presentation boundary and passed here opaquely.

use chrono::Duration;
use std::sync::Arc;
use tokio::sync::mpsc;

use dosewatch_core::clock::Clock;
use dosewatch_core::error::{DosewatchError, Result};
use dosewatch_core::traits::AlarmStore;
use dosewatch_core::types::{AlarmRecord, DomainEvent, NotificationAction, Recurrence};

/// Fixed snooze delay.
pub const SNOOZE_DELAY_MINUTES: i64 = 15;

/// One user interaction with a presented notification.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub action: NotificationAction,
    /// The presentation's `data` payload, parsed once and passed opaquely.
    pub data: serde_json::Value,
}

/// The transition an interaction produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Completed { alarm_id: String },
    Snoozed { alarm_id: String, derived_id: String },
    Dismissed { alarm_id: String },
    Opened { alarm_id: String },
    Closed { alarm_id: String },
}

pub struct ActionHandler {
    store: Arc<dyn AlarmStore>,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<DomainEvent>,
}

impl ActionHandler {
    pub fn new(
        store: Arc<dyn AlarmStore>,
        clock: Arc<dyn Clock>,
        events: mpsc::UnboundedSender<DomainEvent>,
    ) -> Self {
        Self {
            store,
            clock,
            events,
        }
    }

    /// Apply exactly one transition for the interaction (consumed).
    pub async fn handle(&self, interaction: Interaction) -> Result<Transition> {
        let alarm_id = interaction
            .data
            .get("alarm_id")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| DosewatchError::malformed("interaction payload missing alarm_id"))?;

        match interaction.action {
            NotificationAction::Complete => {
                // Dose tracking is a collaborator concern; the record itself
                // is not touched.
                let _ = self.events.send(DomainEvent::DoseTaken {
                    alarm_id: alarm_id.clone(),
                    at: self.clock.now(),
                });
                Ok(Transition::Completed { alarm_id })
            }
            NotificationAction::Snooze => {
                let derived_id = self.snooze(&alarm_id).await?;
                Ok(Transition::Snoozed {
                    alarm_id,
                    derived_id,
                })
            }
            NotificationAction::Dismiss => {
                tracing::debug!("Alarm {alarm_id} dismissed");
                Ok(Transition::Dismissed { alarm_id })
            }
            NotificationAction::Open => {
                let _ = self.events.send(DomainEvent::OpenRequested {
                    alarm_id: alarm_id.clone(),
                });
                Ok(Transition::Opened { alarm_id })
            }
            NotificationAction::Close => {
                tracing::debug!("Alarm {alarm_id} notification closed without action");
                Ok(Transition::Closed { alarm_id })
            }
        }
    }

    /// Create the derived one-shot record. The original is untouched; the
    /// derived record is ephemeral (one-shot, never pushed as a recurrence).
    async fn snooze(&self, alarm_id: &str) -> Result<String> {
        let original = self
            .store
            .get_by_id(alarm_id)
            .await?
            .ok_or_else(|| DosewatchError::RecordNotFound(alarm_id.to_string()))?;

        let now = self.clock.now();
        let mut metadata = original.metadata.clone();
        metadata.insert(
            "snoozed_from".into(),
            serde_json::Value::String(original.id.clone()),
        );

        let derived = AlarmRecord {
            id: format!("{}-snooze-{}", original.id, now.timestamp_millis()),
            title: original.title.clone(),
            message: original.message.clone(),
            scheduled_at: now + Duration::minutes(SNOOZE_DELAY_MINUTES),
            enabled: true,
            recurrence: Recurrence::Once,
            flags: original.flags,
            category: original.category.clone(),
            last_triggered: None,
            created_at: now,
            metadata,
            advanced_at: None,
            synced_at: None,
        };
        let derived_id = derived.id.clone();
        self.store.save(derived).await?;
        tracing::info!("Alarm {alarm_id} snoozed for {SNOOZE_DELAY_MINUTES}m as {derived_id}");
        Ok(derived_id)
    }
}
