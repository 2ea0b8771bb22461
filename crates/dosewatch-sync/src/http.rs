//! HTTP remote store client.
//!
//! Speaks a small authenticated JSON API: list-by-principal, upsert-by-id,
//! delete-by-id. The remote schema mirrors the alarm record's wire form
//! plus server-only bookkeeping fields, which decode ignores and the
//! reconciler never replicates.

use async_trait::async_trait;

use dosewatch_core::config::SyncConfig;
use dosewatch_core::error::{DosewatchError, Result};
use dosewatch_core::traits::RemoteStore;
use dosewatch_core::types::AlarmRecord;

pub struct HttpRemoteStore {
    base_url: String,
    principal: String,
    client: reqwest::Client,
}

impl HttpRemoteStore {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let base = url::Url::parse(&config.base_url).map_err(|e| {
            DosewatchError::config(format!("Invalid sync.base_url {:?}: {e}", config.base_url))
        })?;
        if config.principal.is_empty() {
            return Err(DosewatchError::config("sync.principal not set"));
        }

        let mut headers = reqwest::header::HeaderMap::new();
        let auth = format!("Bearer {}", config.token)
            .parse()
            .map_err(|e| DosewatchError::config(format!("Invalid sync.token: {e}")))?;
        headers.insert(reqwest::header::AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .unwrap_or_default();

        Ok(Self {
            base_url: base.as_str().trim_end_matches('/').to_string(),
            principal: config.principal.clone(),
            client,
        })
    }

    fn alarms_url(&self) -> String {
        format!("{}/v1/principals/{}/alarms", self.base_url, self.principal)
    }

    fn check_status(status: reqwest::StatusCode, context: &str) -> Result<()> {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(DosewatchError::remote(format!(
                "{context}: authentication rejected ({status})"
            )));
        }
        if !status.is_success() {
            return Err(DosewatchError::remote(format!("{context}: {status}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn list(&self) -> Result<Vec<AlarmRecord>> {
        let response = self
            .client
            .get(self.alarms_url())
            .send()
            .await
            .map_err(|e| DosewatchError::network(format!("list failed: {e}")))?;
        Self::check_status(response.status(), "list")?;
        response
            .json()
            .await
            .map_err(|e| DosewatchError::remote(format!("list: invalid response: {e}")))
    }

    async fn upsert(&self, record: &AlarmRecord) -> Result<()> {
        let url = format!("{}/{}", self.alarms_url(), record.id);
        let response = self
            .client
            .put(url)
            .json(record)
            .send()
            .await
            .map_err(|e| DosewatchError::network(format!("upsert failed: {e}")))?;
        Self::check_status(response.status(), "upsert")
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let url = format!("{}/{}", self.alarms_url(), id);
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| DosewatchError::network(format!("delete failed: {e}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(()); // already gone
        }
        Self::check_status(response.status(), "delete")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str, principal: &str) -> SyncConfig {
        SyncConfig {
            enabled: true,
            base_url: base_url.into(),
            principal: principal.into(),
            token: "tok".into(),
            ..SyncConfig::default()
        }
    }

    #[test]
    fn test_new_validates_config() {
        assert!(HttpRemoteStore::new(&config("not a url", "u1")).is_err());
        assert!(HttpRemoteStore::new(&config("https://sync.example.com", "")).is_err());

        let store = HttpRemoteStore::new(&config("https://sync.example.com/", "u1")).unwrap();
        assert_eq!(
            store.alarms_url(),
            "https://sync.example.com/v1/principals/u1/alarms"
        );
    }
}
