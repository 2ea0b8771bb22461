//! In-memory alarm store — tests and ephemeral hosts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use dosewatch_core::error::{DosewatchError, Result};
use dosewatch_core::traits::AlarmStore;
use dosewatch_core::types::AlarmRecord;

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, AlarmRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, AlarmRecord>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, AlarmRecord>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AlarmStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_all(&self) -> Result<Vec<AlarmRecord>> {
        let mut all: Vec<AlarmRecord> = self.read().values().cloned().collect();
        all.sort_by(|a, b| (a.scheduled_at, &a.id).cmp(&(b.scheduled_at, &b.id)));
        Ok(all)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<AlarmRecord>> {
        Ok(self.read().get(id).cloned())
    }

    async fn save(&self, record: AlarmRecord) -> Result<()> {
        if record.id.trim().is_empty() {
            return Err(DosewatchError::malformed("empty alarm id"));
        }
        self.write().insert(record.id.clone(), record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.write().remove(id);
        Ok(())
    }

    async fn due_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AlarmRecord>> {
        let mut due: Vec<AlarmRecord> = self
            .read()
            .values()
            .filter(|r| r.enabled && r.scheduled_at > from && r.scheduled_at <= to)
            .cloned()
            .collect();
        due.sort_by(|a, b| (a.scheduled_at, &a.id).cmp(&(b.scheduled_at, &b.id)));
        Ok(due)
    }
}
