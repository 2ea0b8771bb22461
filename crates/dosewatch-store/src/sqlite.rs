//! SQLite alarm store.
//!
//! One keyed table with secondary indexes on `scheduled_at` and `enabled`
//! so the dispatcher's due scan stays sublinear. A `Mutex<Connection>`
//! serializes writers within the process; `INSERT OR REPLACE` makes the
//! upsert atomic. Rows that fail to decode are quarantined in place
//! (disabled + flagged), never silently deleted.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use dosewatch_core::error::{DosewatchError, Result};
use dosewatch_core::traits::AlarmStore;
use dosewatch_core::types::{AlarmRecord, PresentationFlags, Recurrence};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| DosewatchError::storage(e.to_string()))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS alarms (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                scheduled_at TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                recurrence TEXT NOT NULL,
                flags TEXT NOT NULL DEFAULT '{}',
                category TEXT,
                last_triggered TEXT,
                created_at TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                advanced_at TEXT,
                synced_at TEXT,
                quarantined INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_alarms_scheduled_at ON alarms(scheduled_at);
            CREATE INDEX IF NOT EXISTS idx_alarms_enabled ON alarms(enabled);",
        )
        .map_err(|e| DosewatchError::storage(e.to_string()))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DosewatchError::storage(e.to_string()))
    }

    fn select_rows(&self, where_clause: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<AlarmRecord>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT id, title, message, scheduled_at, enabled, recurrence, flags,
                    category, last_triggered, created_at, metadata, advanced_at, synced_at
             FROM alarms WHERE quarantined = 0 {where_clause}
             ORDER BY scheduled_at"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DosewatchError::storage(e.to_string()))?;

        let raw = stmt
            .query_map(params, RawRow::from_row)
            .map_err(|e| DosewatchError::storage(e.to_string()))?
            .collect::<rusqlite::Result<Vec<RawRow>>>()
            .map_err(|e| DosewatchError::storage(e.to_string()))?;
        drop(stmt);

        let mut records = Vec::with_capacity(raw.len());
        let mut bad = Vec::new();
        for row in raw {
            let id = row.id.clone();
            match row.decode() {
                Ok(rec) => records.push(rec),
                Err(e) => {
                    tracing::warn!("Quarantining malformed alarm record {id}: {e}");
                    bad.push(id);
                }
            }
        }

        // Quarantine in place: disabled and flagged, retained for inspection.
        for id in bad {
            conn.execute(
                "UPDATE alarms SET enabled = 0, quarantined = 1 WHERE id = ?1",
                rusqlite::params![id],
            )
            .map_err(|e| DosewatchError::storage(e.to_string()))?;
        }

        Ok(records)
    }
}

#[async_trait]
impl AlarmStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_all(&self) -> Result<Vec<AlarmRecord>> {
        self.select_rows("", &[])
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<AlarmRecord>> {
        let mut rows = self.select_rows("AND id = ?1", &[&id])?;
        Ok(rows.pop())
    }

    async fn save(&self, record: AlarmRecord) -> Result<()> {
        if record.id.trim().is_empty() {
            return Err(DosewatchError::malformed("empty alarm id"));
        }
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO alarms
                (id, title, message, scheduled_at, enabled, recurrence, flags,
                 category, last_triggered, created_at, metadata, advanced_at, synced_at,
                 quarantined)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0)",
            rusqlite::params![
                record.id,
                record.title,
                record.message,
                ts(record.scheduled_at),
                record.enabled as i64,
                record.recurrence.as_str(),
                serde_json::to_string(&record.flags)?,
                record.category,
                record.last_triggered.map(ts),
                ts(record.created_at),
                serde_json::to_string(&record.metadata)?,
                record.advanced_at.map(ts),
                record.synced_at.map(ts),
            ],
        )
        .map_err(|e| DosewatchError::storage(e.to_string()))?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM alarms WHERE id = ?1", rusqlite::params![id])
            .map_err(|e| DosewatchError::storage(e.to_string()))?;
        Ok(())
    }

    async fn due_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AlarmRecord>> {
        self.select_rows(
            "AND enabled = 1 AND scheduled_at > ?1 AND scheduled_at <= ?2",
            &[&ts(from), &ts(to)],
        )
    }
}

/// Fixed-width RFC 3339 (UTC, microseconds) so lexicographic column order is
/// chronological order and the scheduled_at index is usable for range scans.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| DosewatchError::malformed(format!("bad timestamp {s:?}: {e}")))
}

struct RawRow {
    id: String,
    title: String,
    message: String,
    scheduled_at: String,
    enabled: i64,
    recurrence: String,
    flags: String,
    category: Option<String>,
    last_triggered: Option<String>,
    created_at: String,
    metadata: String,
    advanced_at: Option<String>,
    synced_at: Option<String>,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            message: row.get(2)?,
            scheduled_at: row.get(3)?,
            enabled: row.get(4)?,
            recurrence: row.get(5)?,
            flags: row.get(6)?,
            category: row.get(7)?,
            last_triggered: row.get(8)?,
            created_at: row.get(9)?,
            metadata: row.get(10)?,
            advanced_at: row.get(11)?,
            synced_at: row.get(12)?,
        })
    }

    fn decode(self) -> Result<AlarmRecord> {
        let recurrence = Recurrence::parse(&self.recurrence)
            .ok_or_else(|| DosewatchError::malformed(format!("bad recurrence {:?}", self.recurrence)))?;
        let flags: PresentationFlags = serde_json::from_str(&self.flags)
            .map_err(|e| DosewatchError::malformed(format!("bad flags: {e}")))?;
        let metadata = serde_json::from_str(&self.metadata)
            .map_err(|e| DosewatchError::malformed(format!("bad metadata: {e}")))?;

        Ok(AlarmRecord {
            id: self.id,
            title: self.title,
            message: self.message,
            scheduled_at: parse_ts(&self.scheduled_at)?,
            enabled: self.enabled != 0,
            recurrence,
            flags,
            category: self.category,
            last_triggered: self.last_triggered.as_deref().map(parse_ts).transpose()?,
            created_at: parse_ts(&self.created_at)?,
            metadata,
            advanced_at: self.advanced_at.as_deref().map(parse_ts).transpose()?,
            synced_at: self.synced_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}
