//! Request/reply messaging surface for foreground collaborators.
//!
//! Every request carries a oneshot reply channel; the handle wraps each call
//! in a 5 s timeout. On timeout the caller treats this background context as
//! unavailable and falls back to direct presentation where possible.

use chrono::Duration;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use dosewatch_core::clock::Clock;
use dosewatch_core::error::{DosewatchError, Result};
use dosewatch_core::traits::{AlarmStore, ExactAlarmBridge, Presenter};
use dosewatch_core::types::{AlarmRecord, Presentation};

use crate::dispatcher::{Dispatcher, TickReport};

/// Default caller-side timeout.
pub const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Bound on individual bridge calls made while handling a request.
const BRIDGE_CALL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

enum Request {
    Schedule {
        record: AlarmRecord,
        reply: oneshot::Sender<Result<String>>,
    },
    Cancel {
        id: String,
        reply: oneshot::Sender<Result<bool>>,
    },
    List {
        reply: oneshot::Sender<Result<Vec<AlarmRecord>>>,
    },
    Update {
        record: AlarmRecord,
        reply: oneshot::Sender<Result<()>>,
    },
    CheckNow {
        reply: oneshot::Sender<Result<TickReport>>,
    },
    TestNotification {
        title: String,
        message: String,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// The background half: owns the store surface and serves requests until
/// every handle is dropped.
pub struct AlarmService {
    store: Arc<dyn AlarmStore>,
    dispatcher: Arc<Dispatcher>,
    presenter: Arc<dyn Presenter>,
    bridge: Option<Arc<dyn ExactAlarmBridge>>,
    clock: Arc<dyn Clock>,
    lookahead: Duration,
    rx: mpsc::Receiver<Request>,
}

impl AlarmService {
    pub fn new(
        store: Arc<dyn AlarmStore>,
        dispatcher: Arc<Dispatcher>,
        presenter: Arc<dyn Presenter>,
        bridge: Option<Arc<dyn ExactAlarmBridge>>,
        clock: Arc<dyn Clock>,
        lookahead_hours: i64,
    ) -> (Self, ServiceHandle) {
        let (tx, rx) = mpsc::channel(32);
        (
            Self {
                store,
                dispatcher,
                presenter,
                bridge,
                clock,
                lookahead: Duration::hours(lookahead_hours),
                rx,
            },
            ServiceHandle {
                tx,
                timeout: REQUEST_TIMEOUT,
            },
        )
    }

    pub async fn run(mut self) {
        while let Some(request) = self.rx.recv().await {
            self.handle(request).await;
        }
        tracing::debug!("Alarm service stopped");
    }

    async fn handle(&self, request: Request) {
        match request {
            Request::Schedule { record, reply } => {
                let _ = reply.send(self.schedule(record).await);
            }
            Request::Cancel { id, reply } => {
                let _ = reply.send(self.cancel(&id).await);
            }
            Request::List { reply } => {
                let _ = reply.send(self.store.get_all().await);
            }
            Request::Update { record, reply } => {
                let _ = reply.send(self.schedule(record).await.map(|_| ()));
            }
            Request::CheckNow { reply } => {
                let _ = reply.send(self.dispatcher.tick().await);
            }
            Request::TestNotification {
                title,
                message,
                reply,
            } => {
                let _ = reply
                    .send(self.presenter.show(&Presentation::test(title, message)).await);
            }
        }
    }

    async fn schedule(&self, mut record: AlarmRecord) -> Result<String> {
        if record.id.trim().is_empty() {
            record.id = uuid::Uuid::new_v4().to_string();
        }
        let id = record.id.clone();
        let enabled = record.enabled;
        let fire_at = record.scheduled_at;
        self.store.save(record).await?;
        self.reserve_wakeup(&id, enabled, fire_at).await;
        Ok(id)
    }

    async fn cancel(&self, id: &str) -> Result<bool> {
        let existed = self.store.get_by_id(id).await?.is_some();
        self.store.delete(id).await?;
        if let Some(bridge) = &self.bridge {
            let call = bridge.cancel(id);
            if tokio::time::timeout(BRIDGE_CALL_TIMEOUT, call).await.is_err() {
                tracing::warn!("Bridge cancel for {id} timed out");
            }
        }
        Ok(existed)
    }

    /// Keep the wake reservation in step with the saved record. Bridge
    /// trouble degrades to the dispatcher interval; it never fails the
    /// request.
    async fn reserve_wakeup(&self, id: &str, enabled: bool, fire_at: chrono::DateTime<chrono::Utc>) {
        let Some(bridge) = &self.bridge else {
            return;
        };
        let now = self.clock.now();
        let call = async {
            if enabled && fire_at > now && fire_at <= now + self.lookahead {
                bridge.schedule(id, fire_at, serde_json::Value::Null).await
            } else {
                bridge.cancel(id).await
            }
        };
        match tokio::time::timeout(BRIDGE_CALL_TIMEOUT, call).await {
            Ok(Ok(())) => {}
            Ok(Err(DosewatchError::BestEffortOnly(detail))) => {
                tracing::warn!("Exact scheduling degraded for {id}: {detail}");
            }
            Ok(Err(e)) => {
                tracing::warn!("Bridge schedule for {id} failed: {e}");
            }
            Err(_) => {
                tracing::warn!("Bridge schedule for {id} timed out, continuing best-effort");
            }
        }
    }
}

/// The foreground half. Cheap to clone; every call is bounded by the
/// request timeout.
#[derive(Clone)]
pub struct ServiceHandle {
    tx: mpsc::Sender<Request>,
    timeout: std::time::Duration,
}

impl ServiceHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> Request,
    ) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| DosewatchError::timeout("background context unavailable"))?;
        match tokio::time::timeout(self.timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DosewatchError::timeout("background context dropped reply")),
            Err(_) => Err(DosewatchError::timeout("no reply from background context")),
        }
    }

    pub async fn schedule_alarm(&self, record: AlarmRecord) -> Result<String> {
        self.request(|reply| Request::Schedule { record, reply }).await
    }

    /// Returns whether the record existed.
    pub async fn cancel_alarm(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        self.request(|reply| Request::Cancel { id, reply }).await
    }

    pub async fn list_alarms(&self) -> Result<Vec<AlarmRecord>> {
        self.request(|reply| Request::List { reply }).await
    }

    pub async fn update_alarm(&self, record: AlarmRecord) -> Result<()> {
        self.request(|reply| Request::Update { record, reply }).await
    }

    pub async fn check_now(&self) -> Result<TickReport> {
        self.request(|reply| Request::CheckNow { reply }).await
    }

    pub async fn send_test_notification(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<()> {
        let (title, message) = (title.into(), message.into());
        self.request(|reply| Request::TestNotification {
            title,
            message,
            reply,
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingPresenter;
    use chrono::{TimeZone, Utc};
    use dosewatch_core::clock::ManualClock;
    use dosewatch_core::types::Recurrence;
    use dosewatch_store::MemoryStore;
    use tokio::sync::mpsc as tokio_mpsc;

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn spawn_service() -> (ServiceHandle, Arc<MemoryStore>, Arc<RecordingPresenter>) {
        let store = Arc::new(MemoryStore::new());
        let presenter = Arc::new(RecordingPresenter::new());
        let clock = Arc::new(ManualClock::utc(t0()));
        let (events_tx, _events_rx) = tokio_mpsc::unbounded_channel();
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            presenter.clone(),
            clock.clone(),
            60,
            events_tx,
        ));
        let (service, handle) =
            AlarmService::new(store.clone(), dispatcher, presenter.clone(), None, clock, 48);
        tokio::spawn(service.run());
        (handle, store, presenter)
    }

    #[tokio::test]
    async fn test_schedule_list_cancel_roundtrip() {
        let (handle, _store, _presenter) = spawn_service();

        let mut record =
            AlarmRecord::new("Insulin", "10 units", t0() + Duration::hours(1), Recurrence::Daily);
        record.id = String::new(); // service assigns one

        let id = handle.schedule_alarm(record).await.unwrap();
        assert!(!id.is_empty());

        let listed = handle.list_alarms().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);

        assert!(handle.cancel_alarm(&id).await.unwrap());
        assert!(!handle.cancel_alarm(&id).await.unwrap());
        assert!(handle.list_alarms().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_now_fires_due_alarm() {
        let (handle, store, presenter) = spawn_service();
        let mut rec = AlarmRecord::new("Insulin", "10 units", t0(), Recurrence::Once);
        rec.id = "due".into();
        rec.scheduled_at = t0() - Duration::seconds(5);
        store.save(rec).await.unwrap();

        let report = handle.check_now().await.unwrap();
        assert_eq!(report.fired, 1);
        assert_eq!(presenter.shown().len(), 1);
    }

    #[tokio::test]
    async fn test_test_notification_goes_straight_to_presenter() {
        let (handle, _store, presenter) = spawn_service();
        handle
            .send_test_notification("Dosewatch", "test notification")
            .await
            .unwrap();
        assert_eq!(presenter.shown().len(), 1);
        assert_eq!(presenter.shown()[0].title, "Dosewatch");
    }

    #[tokio::test]
    async fn test_dead_background_context_times_out() {
        let (handle, _store, _presenter) = spawn_service();
        // Drop the service by closing its channel: recreate a handle whose
        // receiver is gone.
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let dead = ServiceHandle {
            tx,
            timeout: std::time::Duration::from_millis(50),
        };
        let err = dead.list_alarms().await.unwrap_err();
        assert!(matches!(err, DosewatchError::Timeout(_)));

        // The live handle still works.
        assert!(handle.list_alarms().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slow_reply_times_out() {
        // A service that never replies: channel open, nobody receiving.
        let (tx, _rx) = mpsc::channel(1);
        let handle = ServiceHandle {
            tx,
            timeout: std::time::Duration::from_millis(50),
        };
        let err = handle.list_alarms().await.unwrap_err();
        assert!(matches!(err, DosewatchError::Timeout(_)));
    }
}
