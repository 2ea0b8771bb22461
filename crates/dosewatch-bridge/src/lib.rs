//! # Dosewatch Bridge
//! Exact-alarm bridge implementations — the platform primitive that wakes a
//! suspended dispatcher at a precise future time — plus the bounded
//! lookahead reschedule pass.

pub mod noop;
pub mod timer;

use std::sync::Arc;

use chrono::Duration;
use tokio::sync::mpsc;

use dosewatch_core::clock::Clock;
use dosewatch_core::config::DosewatchConfig;
use dosewatch_core::error::{DosewatchError, Result};
use dosewatch_core::traits::{AlarmStore, ExactAlarmBridge};
use dosewatch_core::types::WakeEvent;

pub use noop::NoopBridge;
pub use timer::TimerBridge;

/// Create a bridge from configuration. Wake events are delivered on
/// `wake_tx` to whichever dispatcher owns the receiving end.
pub fn create_bridge(
    config: &DosewatchConfig,
    clock: Arc<dyn Clock>,
    wake_tx: mpsc::UnboundedSender<WakeEvent>,
) -> Result<Arc<dyn ExactAlarmBridge>> {
    match config.bridge.backend.as_str() {
        "timer" => Ok(Arc::new(TimerBridge::new(clock, wake_tx))),
        "none" => Ok(Arc::new(NoopBridge)),
        other => Err(DosewatchError::config(format!(
            "Unknown bridge backend: {other}"
        ))),
    }
}

/// Re-reserve wake-ups for every enabled alarm due inside the lookahead
/// window. Platforms refuse indefinite future reservations, so this runs on
/// every foreground resume and after every successful reconciliation.
///
/// Each bridge call is bounded by `call_timeout`; a tripped bound degrades
/// to the dispatcher interval instead of failing the pass.
/// `PermissionDenied` is surfaced to the caller, never swallowed.
pub async fn reschedule_window(
    store: &dyn AlarmStore,
    bridge: &dyn ExactAlarmBridge,
    clock: &dyn Clock,
    lookahead: Duration,
    call_timeout: std::time::Duration,
) -> Result<usize> {
    let now = clock.now();
    bounded(call_timeout, bridge.cancel_all()).await?;

    let upcoming = store.due_between(now, now + lookahead).await?;
    let mut scheduled = 0usize;
    let mut degraded = false;
    for record in upcoming {
        let payload = serde_json::json!({ "alarm_id": record.id });
        match bounded(
            call_timeout,
            bridge.schedule(&record.id, record.scheduled_at, payload),
        )
        .await
        {
            Ok(()) => scheduled += 1,
            Err(DosewatchError::PermissionDenied(detail)) => {
                return Err(DosewatchError::PermissionDenied(detail));
            }
            Err(DosewatchError::BestEffortOnly(detail)) => {
                if !degraded {
                    tracing::warn!("Exact scheduling degraded: {detail}");
                    degraded = true;
                }
            }
            Err(e) => {
                tracing::warn!("Wake reservation for {} failed: {e}", record.id);
                degraded = true;
            }
        }
    }
    tracing::debug!(
        "Reschedule pass: {scheduled} wake-ups reserved within {}h",
        lookahead.num_hours()
    );
    Ok(scheduled)
}

async fn bounded(
    timeout: std::time::Duration,
    call: impl std::future::Future<Output = Result<()>>,
) -> Result<()> {
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| DosewatchError::timeout("bridge call exceeded bound"))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use dosewatch_core::clock::ManualClock;
    use dosewatch_core::traits::BridgeCapability;
    use dosewatch_core::types::{AlarmRecord, Recurrence};
    use dosewatch_store::MemoryStore;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, offset_h) in [("soon", 1), ("later", 12), ("outside", 100)] {
            let mut rec = AlarmRecord::new(
                "Warfarin",
                "5mg",
                t0() + Duration::hours(offset_h),
                Recurrence::Daily,
            );
            rec.id = id.into();
            store.save(rec).await.unwrap();
        }
        let mut off = AlarmRecord::new("Old", "x", t0() + Duration::hours(2), Recurrence::Once);
        off.id = "disabled".into();
        off.enabled = false;
        store.save(off).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_reschedule_reserves_only_enabled_within_lookahead() {
        let store = seeded_store().await;
        let clock = Arc::new(ManualClock::utc(t0()));
        let (wake_tx, _wake_rx) = mpsc::unbounded_channel();
        let bridge = TimerBridge::new(clock.clone(), wake_tx);

        let scheduled = reschedule_window(
            &store,
            &bridge,
            clock.as_ref(),
            Duration::hours(48),
            std::time::Duration::from_secs(2),
        )
        .await
        .unwrap();

        assert_eq!(scheduled, 2); // "soon" and "later"
        assert_eq!(bridge.pending_count().await, 2);

        // The pass is idempotent: running it again does not stack wake-ups.
        reschedule_window(
            &store,
            &bridge,
            clock.as_ref(),
            Duration::hours(48),
            std::time::Duration::from_secs(2),
        )
        .await
        .unwrap();
        assert_eq!(bridge.pending_count().await, 2);
    }

    #[tokio::test]
    async fn test_reschedule_continues_degraded_on_best_effort() {
        let store = seeded_store().await;
        let clock = ManualClock::utc(t0());
        let scheduled = reschedule_window(
            &store,
            &NoopBridge,
            &clock,
            Duration::hours(48),
            std::time::Duration::from_secs(2),
        )
        .await
        .unwrap();
        assert_eq!(scheduled, 0);
    }

    struct DeniedBridge;

    #[async_trait]
    impl ExactAlarmBridge for DeniedBridge {
        fn name(&self) -> &str {
            "denied"
        }
        async fn schedule(
            &self,
            _id: &str,
            _fire_at: DateTime<Utc>,
            _payload: serde_json::Value,
        ) -> Result<()> {
            Err(DosewatchError::PermissionDenied(
                "exact alarms not granted".into(),
            ))
        }
        async fn cancel(&self, _id: &str) -> Result<()> {
            Ok(())
        }
        async fn cancel_all(&self) -> Result<()> {
            Ok(())
        }
        async fn check_capability(&self) -> BridgeCapability {
            BridgeCapability::Denied
        }
    }

    #[tokio::test]
    async fn test_reschedule_surfaces_permission_denied() {
        let store = seeded_store().await;
        let clock = ManualClock::utc(t0());
        let err = reschedule_window(
            &store,
            &DeniedBridge,
            &clock,
            Duration::hours(48),
            std::time::Duration::from_secs(2),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DosewatchError::PermissionDenied(_)));
    }
}
