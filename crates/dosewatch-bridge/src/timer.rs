//! In-process exact-alarm bridge backed by tokio timers.
//!
//! The closest a long-running host gets to a platform wake primitive: each
//! reservation is a `sleep`ing task that delivers a [`WakeEvent`] at the
//! fire time. Reservations do not survive process death — recovery there is
//! the reschedule pass on next startup plus the dispatcher interval.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use dosewatch_core::clock::Clock;
use dosewatch_core::error::Result;
use dosewatch_core::traits::{BridgeCapability, ExactAlarmBridge};
use dosewatch_core::types::WakeEvent;

struct PendingWake {
    fire_at: DateTime<Utc>,
    task: JoinHandle<()>,
}

pub struct TimerBridge {
    clock: Arc<dyn Clock>,
    wake_tx: mpsc::UnboundedSender<WakeEvent>,
    pending: Arc<Mutex<HashMap<String, PendingWake>>>,
}

impl TimerBridge {
    pub fn new(clock: Arc<dyn Clock>, wake_tx: mpsc::UnboundedSender<WakeEvent>) -> Self {
        Self {
            clock,
            wake_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of wake-ups currently reserved.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

#[async_trait]
impl ExactAlarmBridge for TimerBridge {
    fn name(&self) -> &str {
        "timer"
    }

    async fn schedule(
        &self,
        id: &str,
        fire_at: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Result<()> {
        let mut pending = self.pending.lock().await;

        // Idempotent per (id, fire_at): a repeat call before firing must not
        // create a duplicate wake-up.
        if let Some(existing) = pending.get(id) {
            if existing.fire_at == fire_at {
                return Ok(());
            }
        }
        // A new fire time replaces the pending reservation.
        if let Some(old) = pending.remove(id) {
            old.task.abort();
        }

        // A fire time already past wakes immediately.
        let delay = (fire_at - self.clock.now()).to_std().unwrap_or_default();
        let task = tokio::spawn({
            let wake_tx = self.wake_tx.clone();
            let pending = Arc::clone(&self.pending);
            let id = id.to_string();
            async move {
                tokio::time::sleep(delay).await;
                let _ = wake_tx.send(WakeEvent {
                    id: id.clone(),
                    fire_at,
                    payload,
                });
                pending.lock().await.remove(&id);
            }
        });
        pending.insert(id.to_string(), PendingWake { fire_at, task });
        Ok(())
    }

    async fn cancel(&self, id: &str) -> Result<()> {
        if let Some(pending) = self.pending.lock().await.remove(id) {
            pending.task.abort();
        }
        Ok(())
    }

    async fn cancel_all(&self) -> Result<()> {
        let mut pending = self.pending.lock().await;
        for (_, wake) in pending.drain() {
            wake.task.abort();
        }
        Ok(())
    }

    async fn check_capability(&self) -> BridgeCapability {
        BridgeCapability::Exact
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use dosewatch_core::clock::ManualClock;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn bridge() -> (TimerBridge, mpsc::UnboundedReceiver<WakeEvent>) {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        (
            TimerBridge::new(Arc::new(ManualClock::utc(t0())), wake_tx),
            wake_rx,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_is_idempotent_per_id_and_time() {
        let (bridge, mut wake_rx) = bridge();
        let fire_at = t0() + Duration::seconds(60);

        bridge.schedule("a", fire_at, serde_json::Value::Null).await.unwrap();
        bridge.schedule("a", fire_at, serde_json::Value::Null).await.unwrap();
        assert_eq!(bridge.pending_count().await, 1);

        // Exactly one wake-up arrives.
        let wake = wake_rx.recv().await.unwrap();
        assert_eq!(wake.id, "a");
        assert_eq!(wake.fire_at, fire_at);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(wake_rx.try_recv().is_err());
        assert_eq!(bridge.pending_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_fire_time_replaces_reservation() {
        let (bridge, mut wake_rx) = bridge();
        let first = t0() + Duration::seconds(60);
        let second = t0() + Duration::seconds(120);

        bridge.schedule("a", first, serde_json::Value::Null).await.unwrap();
        bridge.schedule("a", second, serde_json::Value::Null).await.unwrap();
        assert_eq!(bridge.pending_count().await, 1);

        let wake = wake_rx.recv().await.unwrap();
        assert_eq!(wake.fire_at, second);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_and_cancel_all() {
        let (bridge, mut wake_rx) = bridge();
        bridge
            .schedule("a", t0() + Duration::seconds(60), serde_json::Value::Null)
            .await
            .unwrap();
        bridge
            .schedule("b", t0() + Duration::seconds(60), serde_json::Value::Null)
            .await
            .unwrap();

        bridge.cancel("a").await.unwrap();
        assert_eq!(bridge.pending_count().await, 1);
        // Cancelling an unknown id is a no-op.
        bridge.cancel("nope").await.unwrap();

        bridge.cancel_all().await.unwrap();
        assert_eq!(bridge.pending_count().await, 0);

        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        assert!(wake_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_fire_time_wakes_immediately() {
        let (bridge, mut wake_rx) = bridge();
        bridge
            .schedule("late", t0() - Duration::seconds(30), serde_json::Value::Null)
            .await
            .unwrap();
        let wake = wake_rx.recv().await.unwrap();
        assert_eq!(wake.id, "late");
    }
}
