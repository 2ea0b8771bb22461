//! Bridge for hosts without a wake primitive. Scheduling reports the
//! best-effort downgrade; the dispatcher interval carries the load.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use dosewatch_core::error::{DosewatchError, Result};
use dosewatch_core::traits::{BridgeCapability, ExactAlarmBridge};

pub struct NoopBridge;

#[async_trait]
impl ExactAlarmBridge for NoopBridge {
    fn name(&self) -> &str {
        "none"
    }

    async fn schedule(
        &self,
        _id: &str,
        _fire_at: DateTime<Utc>,
        _payload: serde_json::Value,
    ) -> Result<()> {
        Err(DosewatchError::BestEffortOnly(
            "no exact wake primitive on this host".into(),
        ))
    }

    async fn cancel(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn cancel_all(&self) -> Result<()> {
        Ok(())
    }

    async fn check_capability(&self) -> BridgeCapability {
        BridgeCapability::BestEffort
    }
}
