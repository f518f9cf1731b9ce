use chrono::{DateTime, Utc};
use croner::Cron;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{BackupPhase, BackupStatus, Condition, ObjectRef, S3StorageSpec, SchedulePhase};
use crate::error::{Error, Result};

/// Newest entries kept in `recentBackups`.
pub const RECENT_BACKUPS_LIMIT: usize = 10;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    pub keep_last: Option<u32>,
    pub keep_daily: Option<u32>,
    pub keep_weekly: Option<u32>,
    pub keep_monthly: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupScheduleSpec {
    pub name: String,
    pub namespace: String,
    /// Five-field cron, or six fields with leading seconds.
    pub schedule: String,
    pub cluster_ref: ObjectRef,
    pub storage: S3StorageSpec,
    pub collections: Vec<String>,
    pub retention_policy: RetentionPolicy,
    pub suspend: bool,
    /// Creation time of the schedule object. Anchors the first run.
    pub created_at: Option<DateTime<Utc>>,
}

impl BackupScheduleSpec {
    pub fn backup_name(&self, at: DateTime<Utc>) -> String {
        format!("{}-{}", self.name, at.format("%Y%m%d-%H%M%S"))
    }
}

/// First occurrence of `schedule` strictly after `anchor`.
pub fn next_run(schedule: &str, anchor: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let cron = Cron::new(schedule)
        .with_seconds_optional()
        .parse()
        .map_err(|e| Error::config(format!("invalid cron expression {schedule:?}: {e}")))?;
    cron.find_next_occurrence(&anchor, false)
        .map_err(|e| Error::config(format!("no upcoming run for {schedule:?}: {e}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecentBackup {
    pub name: String,
    pub creation_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: BackupPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupScheduleStatus {
    #[serde(default)]
    pub phase: SchedulePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_backup_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_backup_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_backup_status: Option<BackupPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_backup_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_backup: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_backups: Vec<RecentBackup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl BackupScheduleStatus {
    /// Records a freshly submitted backup at the head of the history.
    pub fn push_recent(&mut self, entry: RecentBackup) {
        self.recent_backups.insert(0, entry);
        self.recent_backups.truncate(RECENT_BACKUPS_LIMIT);
    }
}

/// Folds the observed status of the schedule's active backup into the schedule status.
/// Once that backup is terminal it stops being active.
pub fn absorb_backup_outcome(
    status: &BackupScheduleStatus,
    backup_name: &str,
    backup: &BackupStatus,
) -> BackupScheduleStatus {
    let mut next = status.clone();
    if let Some(entry) = next.recent_backups.iter_mut().find(|b| b.name == backup_name) {
        entry.status = backup.phase;
        entry.completion_time = backup.completion_time;
        entry.size = backup.total_size.clone();
    }
    if next.last_backup_name.as_deref() == Some(backup_name) {
        next.last_backup_status = Some(backup.phase);
    }
    if backup.phase.is_terminal() && next.active_backup.as_deref() == Some(backup_name) {
        next.active_backup = None;
    }
    next
}
