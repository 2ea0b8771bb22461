//! The local dispatcher: one evaluation pass ("tick") over enabled records
//! to find and fire due alarms.
//!
//! Several dispatcher instances may run concurrently against the shared
//! store (foreground + background contexts, other devices). There is no
//! cross-context lock: duplicate firing for the same id is collapsed at the
//! presentation boundary by the stable tag, so dispatch is at-least-once per
//! context by design.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use dosewatch_core::clock::Clock;
use dosewatch_core::error::{DosewatchError, Result};
use dosewatch_core::recurrence;
use dosewatch_core::traits::{AlarmStore, Presenter};
use dosewatch_core::types::{AlarmRecord, DomainEvent, Presentation, WakeEvent};

/// Outcome of one tick, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Presentations attempted for due records.
    pub fired: usize,
    /// Records found past the due window and retired without firing.
    pub missed: usize,
}

pub struct Dispatcher {
    store: Arc<dyn AlarmStore>,
    presenter: Arc<dyn Presenter>,
    clock: Arc<dyn Clock>,
    window: Duration,
    events: mpsc::UnboundedSender<DomainEvent>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn AlarmStore>,
        presenter: Arc<dyn Presenter>,
        clock: Arc<dyn Clock>,
        window_secs: i64,
        events: mpsc::UnboundedSender<DomainEvent>,
    ) -> Self {
        Self {
            store,
            presenter,
            clock,
            window: Duration::seconds(window_secs),
            events,
        }
    }

    /// One evaluation pass. Public so tests (and `check_now`) drive it
    /// directly instead of waiting on real time.
    pub async fn tick(&self) -> Result<TickReport> {
        let now = self.clock.now();
        let window_start = now - self.window;
        let mut report = TickReport::default();

        // Due: enabled records with scheduled_at in (now - window, now].
        for record in self.store.due_between(window_start, now).await? {
            self.fire(record, now).await?;
            report.fired += 1;
        }

        // Missed: anything older than the window is never backfilled — no
        // notification storms after a long suspension. Recurring records
        // advance silently to their next future occurrence; one-shots are
        // disabled and retained.
        for record in self
            .store
            .due_between(DateTime::UNIX_EPOCH, window_start)
            .await?
        {
            self.retire_missed(record, now).await?;
            report.missed += 1;
        }

        Ok(report)
    }

    async fn fire(&self, mut record: AlarmRecord, now: DateTime<Utc>) -> Result<()> {
        let presentation = Presentation::for_alarm(&record);
        match self.presenter.show(&presentation).await {
            Ok(()) => {
                tracing::info!("Fired alarm {} ({})", record.id, record.title);
            }
            Err(DosewatchError::PermissionDenied(detail)) => {
                // Must reach the user; the record still advances so firing
                // does not retry into a storm once permission returns.
                tracing::warn!("Notification permission denied: {detail}");
                let _ = self
                    .events
                    .send(DomainEvent::PermissionProblem { detail });
            }
            Err(e) => {
                tracing::warn!("Presentation failed for alarm {}: {e}", record.id);
            }
        }

        record.last_triggered = Some(now);
        match recurrence::advance_past(
            record.scheduled_at,
            record.recurrence,
            now,
            self.clock.local_offset(),
        ) {
            Some(next) => {
                // Strictly later than the fire time: the record leaves the
                // firing window immediately, so the same or next tick cannot
                // re-fire it.
                record.scheduled_at = next;
                record.advanced_at = Some(now);
            }
            None => {
                record.enabled = false;
            }
        }
        self.store.save(record).await
    }

    async fn retire_missed(&self, mut record: AlarmRecord, now: DateTime<Utc>) -> Result<()> {
        match recurrence::advance_past(
            record.scheduled_at,
            record.recurrence,
            now,
            self.clock.local_offset(),
        ) {
            Some(next) => {
                tracing::info!(
                    "Alarm {} missed at {}, advancing to {next} without firing",
                    record.id,
                    record.scheduled_at
                );
                record.scheduled_at = next;
                record.advanced_at = Some(now);
            }
            None => {
                tracing::info!("One-shot alarm {} missed at {}", record.id, record.scheduled_at);
                record.enabled = false;
            }
        }
        self.store.save(record).await
    }

    /// Start the owned tick loop. Ticks are triggered by the fixed-period
    /// interval, by explicit `check_now` requests, and by bridge wake
    /// events. The loop never crashes on a failed tick: the tick is skipped
    /// and the next trigger retries.
    pub fn spawn(
        self: Arc<Self>,
        period: std::time::Duration,
        mut wake_rx: mpsc::UnboundedReceiver<WakeEvent>,
    ) -> DispatcherHandle {
        let dispatcher = self;
        let (check_tx, mut check_rx) = mpsc::unbounded_channel::<()>();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    Some(()) = check_rx.recv() => {}
                    Some(wake) = wake_rx.recv() => {
                        tracing::debug!("Wake event for alarm {}", wake.id);
                    }
                    _ = &mut shutdown_rx => break,
                }
                match dispatcher.tick().await {
                    Ok(report) if report.fired > 0 || report.missed > 0 => {
                        tracing::debug!(
                            "Tick: fired {}, missed {}",
                            report.fired,
                            report.missed
                        );
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Tick skipped: {e}");
                        if let DosewatchError::StorageUnavailable(detail) = e {
                            let _ = dispatcher
                                .events
                                .send(DomainEvent::StorageProblem { detail });
                        }
                    }
                }
            }
            tracing::debug!("Dispatcher loop stopped");
        });

        DispatcherHandle {
            check_tx,
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }
}

/// Owned handle to a running dispatcher loop. Dropping the handle stops the
/// loop; there is no module-level singleton.
pub struct DispatcherHandle {
    check_tx: mpsc::UnboundedSender<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl DispatcherHandle {
    /// Request an immediate tick from a foreground context.
    pub fn check_now(&self) {
        let _ = self.check_tx.send(());
    }

    /// Stop the loop and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingPresenter;
    use chrono::TimeZone;
    use dosewatch_core::clock::ManualClock;
    use dosewatch_core::types::{Recurrence, TAG_PREFIX};
    use dosewatch_store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        presenter: Arc<RecordingPresenter>,
        clock: Arc<ManualClock>,
        dispatcher: Dispatcher,
        events_rx: mpsc::UnboundedReceiver<DomainEvent>,
    }

    fn fixture(now: DateTime<Utc>) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let presenter = Arc::new(RecordingPresenter::new());
        let clock = Arc::new(ManualClock::utc(now));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(
            store.clone(),
            presenter.clone(),
            clock.clone(),
            60,
            events_tx,
        );
        Fixture {
            store,
            presenter,
            clock,
            dispatcher,
            events_rx,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn alarm(id: &str, at: DateTime<Utc>, recurrence: Recurrence) -> AlarmRecord {
        let mut rec = AlarmRecord::new("Metformin", "500mg with food", at, recurrence);
        rec.id = id.into();
        rec
    }

    #[tokio::test]
    async fn test_due_once_alarm_fires_exactly_once_and_disables() {
        let f = fixture(t0() + Duration::seconds(10));
        f.store.save(alarm("a", t0(), Recurrence::Once)).await.unwrap();

        let report = f.dispatcher.tick().await.unwrap();
        assert_eq!(report.fired, 1);
        assert_eq!(f.presenter.shown().len(), 1);

        let rec = f.store.get_by_id("a").await.unwrap().unwrap();
        assert!(!rec.enabled);
        assert_eq!(rec.last_triggered, Some(t0() + Duration::seconds(10)));

        // Disabled records never fire again.
        let report = f.dispatcher.tick().await.unwrap();
        assert_eq!(report.fired, 0);
        assert_eq!(f.presenter.shown().len(), 1);
    }

    #[tokio::test]
    async fn test_daily_alarm_advances_and_does_not_refire() {
        // Scenario: scheduledAt = T, tick at T+10s fires once and sets
        // scheduledAt = T+24h; a second tick at T+20s does not fire again.
        let f = fixture(t0() + Duration::seconds(10));
        f.store.save(alarm("a", t0(), Recurrence::Daily)).await.unwrap();

        let report = f.dispatcher.tick().await.unwrap();
        assert_eq!(report.fired, 1);

        let rec = f.store.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(rec.scheduled_at, t0() + Duration::days(1));
        assert!(rec.scheduled_at > f.clock.now());
        assert!(rec.enabled);
        assert_eq!(rec.advanced_at, Some(t0() + Duration::seconds(10)));

        f.clock.set(t0() + Duration::seconds(20));
        let report = f.dispatcher.tick().await.unwrap();
        assert_eq!(report.fired, 0);
        assert_eq!(f.presenter.shown().len(), 1);
    }

    #[tokio::test]
    async fn test_missed_alarms_are_not_backfilled() {
        // Checked 10 minutes late: outside the 60 s window.
        let f = fixture(t0() + Duration::minutes(10));
        f.store.save(alarm("once", t0(), Recurrence::Once)).await.unwrap();
        f.store.save(alarm("daily", t0(), Recurrence::Daily)).await.unwrap();

        let report = f.dispatcher.tick().await.unwrap();
        assert_eq!(report.fired, 0);
        assert_eq!(report.missed, 2);
        assert!(f.presenter.shown().is_empty());

        // One-shot: disabled, retained.
        let once = f.store.get_by_id("once").await.unwrap().unwrap();
        assert!(!once.enabled);
        assert!(once.last_triggered.is_none());

        // Recurring: silently advanced past now.
        let daily = f.store.get_by_id("daily").await.unwrap().unwrap();
        assert!(daily.enabled);
        assert_eq!(daily.scheduled_at, t0() + Duration::days(1));
    }

    #[tokio::test]
    async fn test_repeat_fire_replaces_by_tag() {
        let f = fixture(t0() + Duration::seconds(10));
        f.store.save(alarm("a", t0(), Recurrence::Hourly)).await.unwrap();
        f.dispatcher.tick().await.unwrap();

        // One hour later the same alarm fires again; the presentation tag is
        // identical, so the notification layer replaces rather than stacks.
        f.clock.set(t0() + Duration::hours(1) + Duration::seconds(10));
        f.dispatcher.tick().await.unwrap();

        let shown = f.presenter.shown();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].tag, format!("{TAG_PREFIX}a"));
    }

    #[tokio::test]
    async fn test_permission_denied_surfaces_event_and_still_advances() {
        let mut f = fixture(t0() + Duration::seconds(10));
        f.presenter.deny_permission();
        f.store.save(alarm("a", t0(), Recurrence::Daily)).await.unwrap();

        f.dispatcher.tick().await.unwrap();

        let event = f.events_rx.try_recv().unwrap();
        assert!(matches!(event, DomainEvent::PermissionProblem { .. }));

        let rec = f.store.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(rec.scheduled_at, t0() + Duration::days(1));
    }

    #[tokio::test]
    async fn test_handle_check_now_and_stop() {
        let f = fixture(t0() + Duration::seconds(10));
        f.store.save(alarm("a", t0(), Recurrence::Once)).await.unwrap();

        let dispatcher = Arc::new(f.dispatcher);
        let (_wake_tx, wake_rx) = mpsc::unbounded_channel();
        // Long period: only check_now can trigger the tick in this test.
        let handle = dispatcher.spawn(std::time::Duration::from_secs(3600), wake_rx);

        handle.check_now();
        // The loop runs on the runtime; poll until the fire lands.
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            if !f.presenter.shown().is_empty() {
                break;
            }
        }
        assert_eq!(f.presenter.shown().len(), 1);

        handle.stop().await;
    }
}
