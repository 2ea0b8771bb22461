//! Configuration management — `~/.dosewatch/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{DosewatchError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DosewatchConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "memory".
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Database path; defaults to `<home>/alarms.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Interval between dispatcher ticks while the host is alive.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Due window: a record is fired when `scheduled_at` lies within
    /// `(now - window, now]`. Absorbs coarse wake granularity; anything
    /// older is missed, never backfilled.
    #[serde(default = "default_window_secs")]
    pub window_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// "timer" or "none".
    #[serde(default = "default_bridge_backend")]
    pub backend: String,
    /// Bounded lookahead for wake-up reservations.
    #[serde(default = "default_lookahead_hours")]
    pub lookahead_hours: i64,
    /// Per-call bound on bridge operations.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub base_url: String,
    /// Authenticated principal whose alarm set is reconciled.
    #[serde(default)]
    pub principal: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_sync_interval_secs")]
    pub interval_secs: u64,
    /// Local-wins grace period after a dispatcher advance.
    #[serde(default = "default_grace_secs")]
    pub grace_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// "webhook" or "log".
    #[serde(default = "default_notify_backend")]
    pub backend: String,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_tick_secs() -> u64 {
    30
}
fn default_window_secs() -> i64 {
    60
}
fn default_bridge_backend() -> String {
    "timer".into()
}
fn default_lookahead_hours() -> i64 {
    48
}
fn default_call_timeout_ms() -> u64 {
    2_000
}
fn default_sync_interval_secs() -> u64 {
    300
}
fn default_grace_secs() -> i64 {
    300
}
fn default_notify_backend() -> String {
    "log".into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: None,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            window_secs: default_window_secs(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            backend: default_bridge_backend(),
            lookahead_hours: default_lookahead_hours(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            principal: String::new(),
            token: String::new(),
            interval_secs: default_sync_interval_secs(),
            grace_secs: default_grace_secs(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            backend: default_notify_backend(),
            webhook_url: None,
        }
    }
}

impl DosewatchConfig {
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dosewatch")
    }

    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Load from the default path, falling back to defaults when the file
    /// does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| DosewatchError::config(format!("Parse {}: {e}", path.display())))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| DosewatchError::config(format!("Serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Resolved database path for the SQLite store.
    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| Self::home_dir().join("alarms.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = DosewatchConfig::default();
        assert_eq!(cfg.store.backend, "sqlite");
        assert_eq!(cfg.dispatch.tick_secs, 30);
        assert_eq!(cfg.dispatch.window_secs, 60);
        assert_eq!(cfg.bridge.lookahead_hours, 48);
        assert_eq!(cfg.sync.grace_secs, 300);
        assert!(!cfg.sync.enabled);
    }

    #[test]
    fn test_toml_roundtrip_with_partial_file() {
        let toml = r#"
            [dispatch]
            tick_secs = 10

            [sync]
            enabled = true
            base_url = "https://sync.example.com"
            principal = "user-1"
        "#;
        let cfg: DosewatchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.dispatch.tick_secs, 10);
        // Unspecified fields keep their defaults.
        assert_eq!(cfg.dispatch.window_secs, 60);
        assert!(cfg.sync.enabled);
        assert_eq!(cfg.sync.interval_secs, 300);
    }

    #[test]
    fn test_load_missing_file_is_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = DosewatchConfig::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg.store.backend, "sqlite");
    }
}
