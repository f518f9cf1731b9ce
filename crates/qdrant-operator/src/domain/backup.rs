use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{BackupPhase, Condition, ItemStatus, S3StorageSpec, format_size};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSpec {
    pub name: String,
    pub namespace: String,
    pub cluster_ref: ObjectRef,
    pub storage: S3StorageSpec,
    /// Empty means every collection on the cluster.
    pub collections: Vec<String>,
    pub retention_days: Option<u32>,
}

impl BackupSpec {
    /// Where this backup's snapshots land: `s3://<bucket>/<prefix>/<name>`.
    pub fn storage_path(&self) -> String {
        self.storage
            .uri(&super::object_key(&[&self.storage.prefix, &self.name]))
    }
}

/// A snapshot as reported by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub name: String,
    pub collection: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CollectionBackupStatus {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CollectionBackupStatus {
    pub fn completed(name: &str, snapshot: &Snapshot) -> Self {
        Self {
            name: name.to_string(),
            snapshot_name: Some(snapshot.name.clone()),
            size: Some(format_size(snapshot.size_bytes)),
            status: ItemStatus::Completed,
            error: None,
        }
    }

    pub fn failed(name: &str, error: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            status: ItemStatus::Failed,
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BackupStatus {
    pub phase: BackupPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<CollectionBackupStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl BackupStatus {
    pub fn in_progress(at: DateTime<Utc>) -> Self {
        Self {
            phase: BackupPhase::InProgress,
            start_time: Some(at),
            ..Default::default()
        }
    }

    pub fn failed(error: impl ToString, at: DateTime<Utc>) -> Self {
        Self {
            phase: BackupPhase::Failed,
            completion_time: Some(at),
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}
