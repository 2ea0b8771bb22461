//! Cloud reconciler: pull-merge with a local-wins grace window, push of
//! unsynced work, and tombstone-by-absence deletion.
//!
//! Runs on its own cadence; a failed round never blocks local dispatch
//! (fail-open), it just retries on the next pass.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use dosewatch_core::clock::Clock;
use dosewatch_core::error::Result;
use dosewatch_core::traits::{AlarmStore, RemoteStore};
use dosewatch_core::types::AlarmRecord;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub pulled: usize,
    pub pushed: usize,
    pub deleted: usize,
    /// Remote rows ignored because a fresh local advance won transiently.
    pub kept_local: usize,
}

pub struct Reconciler {
    store: Arc<dyn AlarmStore>,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    grace: Duration,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn AlarmStore>,
        remote: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
        grace_secs: i64,
    ) -> Self {
        Self {
            store,
            remote,
            clock,
            grace: Duration::seconds(grace_secs),
        }
    }

    /// One full pass. Aborts early if the remote listing cannot be fetched;
    /// individual push failures are logged and retried on the next pass.
    pub async fn run_once(&self) -> Result<SyncReport> {
        let remote_records = self.remote.list().await?;
        let local_records = self.store.get_all().await?;
        let now = self.clock.now();
        let mut report = SyncReport::default();

        // An empty remote listing against a non-empty local store means
        // "not yet pushed", never "everything was deleted" — guards the
        // first-sync race.
        if remote_records.is_empty() {
            for record in local_records {
                self.push(record, now, &mut report).await;
            }
            return Ok(report);
        }

        let remote_ids: HashSet<String> = remote_records.iter().map(|r| r.id.clone()).collect();

        // Pull-merge: remote is authoritative, except for records the local
        // dispatcher advanced within the grace period — a pull must not
        // clobber a just-fired recurrence. The same pull after the grace
        // period lets remote win.
        let mut kept_local: HashSet<String> = HashSet::new();
        for remote_rec in remote_records {
            let local = local_records.iter().find(|l| l.id == remote_rec.id);
            if let Some(local) = local {
                if self.within_grace(local.advanced_at, now) {
                    kept_local.insert(local.id.clone());
                    report.kept_local += 1;
                    continue;
                }
                if Self::same_content(local, &remote_rec) && local.synced_at.is_some() {
                    continue; // nothing to write
                }
            }
            let mut merged = remote_rec;
            merged.synced_at = Some(now);
            merged.advanced_at = None;
            self.store.save(merged).await?;
            report.pulled += 1;
        }

        for record in local_records {
            if !remote_ids.contains(record.id.as_str()) {
                if record.synced_at.is_some() {
                    // Tombstone-by-absence: previously synced, now missing
                    // from a non-empty full listing.
                    tracing::info!("Alarm {} deleted remotely, removing locally", record.id);
                    self.store.delete(&record.id).await?;
                    report.deleted += 1;
                } else {
                    // Local-only, never pushed.
                    self.push(record, now, &mut report).await;
                }
            } else if kept_local.contains(record.id.as_str()) {
                // The transient local winner carries a fresh advance the
                // remote has not seen yet.
                self.push(record, now, &mut report).await;
            }
        }

        tracing::debug!(
            "Sync pass: pulled {}, pushed {}, deleted {}, kept local {}",
            report.pulled,
            report.pushed,
            report.deleted,
            report.kept_local
        );
        Ok(report)
    }

    async fn push(&self, mut record: AlarmRecord, now: DateTime<Utc>, report: &mut SyncReport) {
        match self.remote.upsert(&record).await {
            Ok(()) => {
                record.synced_at = Some(now);
                if let Err(e) = self.store.save(record).await {
                    tracing::warn!("Failed to mark record synced: {e}");
                }
                report.pushed += 1;
            }
            Err(e) => {
                // Retried on the next pass; synced_at stays unset.
                tracing::warn!("Push of {} failed: {e}", record.id);
            }
        }
    }

    fn within_grace(&self, advanced_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        advanced_at
            .map(|at| now.signed_duration_since(at) < self.grace)
            .unwrap_or(false)
    }

    /// Wire-visible fields only; bookkeeping differences alone are not a
    /// reason to rewrite a record.
    fn same_content(a: &AlarmRecord, b: &AlarmRecord) -> bool {
        a.title == b.title
            && a.message == b.message
            && a.scheduled_at == b.scheduled_at
            && a.enabled == b.enabled
            && a.recurrence == b.recurrence
            && a.flags == b.flags
            && a.category == b.category
            && a.last_triggered == b.last_triggered
            && a.metadata == b.metadata
    }
}
