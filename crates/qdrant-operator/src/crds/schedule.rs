use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ObjectReference, StorageTarget, identity};
use crate::domain::{BackupScheduleSpec, BackupScheduleStatus, RetentionPolicy};
use crate::error::{Error, Result};

#[derive(CustomResource, Debug, Serialize, Deserialize, Clone, JsonSchema)]
#[kube(
    group = "qdrant.io",
    version = "v1alpha1",
    kind = "QdrantBackupSchedule",
    plural = "qdrantbackupschedules",
    namespaced,
    status = "BackupScheduleStatus",
    shortname = "qbs",
    printcolumn = r#"{"name":"Schedule","type":"string","jsonPath":".spec.schedule"}"#,
    printcolumn = r#"{"name":"Last","type":"string","jsonPath":".status.lastBackupTime"}"#,
    printcolumn = r#"{"name":"Next","type":"string","jsonPath":".status.nextBackupTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct QdrantBackupScheduleSpec {
    /// Cron expression, e.g. "0 2 * * *"
    pub schedule: String,
    pub cluster_ref: ObjectReference,
    pub storage: StorageTarget,
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub retention_policy: RetentionPolicy,
    #[serde(default)]
    pub suspend: bool,
}

impl TryFrom<&QdrantBackupSchedule> for BackupScheduleSpec {
    type Error = Error;

    fn try_from(schedule: &QdrantBackupSchedule) -> Result<Self> {
        let (name, namespace) = identity(schedule)?;
        let s = &schedule.spec;
        Ok(BackupScheduleSpec {
            schedule: s.schedule.clone(),
            cluster_ref: s.cluster_ref.resolve(&namespace),
            storage: s.storage.s3.to_storage(&namespace),
            collections: s.collections.clone(),
            retention_policy: s.retention_policy.clone(),
            suspend: s.suspend,
            created_at: schedule.metadata.creation_timestamp.as_ref().map(|t| t.0),
            name,
            namespace,
        })
    }
}
