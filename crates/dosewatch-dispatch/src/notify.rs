//! Presenter implementations — the outward surface to the host
//! notification layer.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;

use dosewatch_core::config::DosewatchConfig;
use dosewatch_core::error::{DosewatchError, Result};
use dosewatch_core::traits::Presenter;
use dosewatch_core::types::Presentation;

/// Create a presenter from configuration.
pub fn create_presenter(config: &DosewatchConfig) -> Result<Arc<dyn Presenter>> {
    match config.notify.backend.as_str() {
        "webhook" => {
            let url = config
                .notify
                .webhook_url
                .as_deref()
                .ok_or_else(|| DosewatchError::config("notify.webhook_url not set"))?;
            Ok(Arc::new(WebhookPresenter::new(url)?))
        }
        "log" => Ok(Arc::new(LogPresenter)),
        other => Err(DosewatchError::config(format!(
            "Unknown notify backend: {other}"
        ))),
    }
}

/// POSTs each presentation as JSON to the host notification endpoint.
/// The endpoint is expected to honor the tag (same tag replaces).
pub struct WebhookPresenter {
    url: String,
    client: reqwest::Client,
}

impl WebhookPresenter {
    pub fn new(url: &str) -> Result<Self> {
        url::Url::parse(url)
            .map_err(|e| DosewatchError::config(format!("Invalid webhook URL {url:?}: {e}")))?;
        Ok(Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Presenter for WebhookPresenter {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn show(&self, presentation: &Presentation) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(presentation)
            .send()
            .await
            .map_err(|e| DosewatchError::presentation(format!("Webhook send failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DosewatchError::PermissionDenied(format!(
                "notification endpoint returned {status}"
            )));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DosewatchError::presentation(format!(
                "Webhook {status}: {text}"
            )));
        }
        Ok(())
    }
}

/// Logs presentations instead of showing them. Default for headless hosts.
pub struct LogPresenter;

#[async_trait]
impl Presenter for LogPresenter {
    fn name(&self) -> &str {
        "log"
    }

    async fn show(&self, presentation: &Presentation) -> Result<()> {
        tracing::info!(
            "🔔 [{}] {} — {}",
            presentation.tag,
            presentation.title,
            presentation.body
        );
        Ok(())
    }
}

/// Captures presentations in memory, replacing by tag the way a real
/// notification layer does. Used by tests across the workspace.
#[derive(Default)]
pub struct RecordingPresenter {
    shown: Mutex<Vec<Presentation>>,
    deny: std::sync::atomic::AtomicBool,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `show` fail with `PermissionDenied`.
    pub fn deny_permission(&self) {
        self.deny.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn shown(&self) -> Vec<Presentation> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Presentation>> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Presenter for RecordingPresenter {
    fn name(&self) -> &str {
        "recording"
    }

    async fn show(&self, presentation: &Presentation) -> Result<()> {
        if self.deny.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(DosewatchError::PermissionDenied(
                "notifications blocked".into(),
            ));
        }
        let mut shown = self.lock();
        shown.retain(|p| p.tag != presentation.tag);
        shown.push(presentation.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dosewatch_core::config::DosewatchConfig;

    #[tokio::test]
    async fn test_recording_presenter_replaces_by_tag() {
        let presenter = RecordingPresenter::new();
        presenter.show(&Presentation::test("a", "1")).await.unwrap();
        presenter.show(&Presentation::test("b", "2")).await.unwrap();
        // Presentation::test always uses the same tag.
        assert_eq!(presenter.shown().len(), 1);
        assert_eq!(presenter.shown()[0].title, "b");
    }

    #[test]
    fn test_create_presenter_validates_webhook_url() {
        let mut config = DosewatchConfig::default();
        config.notify.backend = "webhook".into();
        assert!(create_presenter(&config).is_err());

        config.notify.webhook_url = Some("not a url".into());
        assert!(create_presenter(&config).is_err());

        config.notify.webhook_url = Some("http://localhost:9137/notify".into());
        assert!(create_presenter(&config).is_ok());
    }
}
