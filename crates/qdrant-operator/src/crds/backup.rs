use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ObjectReference, StorageTarget, identity};
use crate::domain::{BackupSpec, BackupStatus};
use crate::error::{Error, Result};

/// Label carried by backups created from a schedule.
pub const SCHEDULE_LABEL: &str = "qdrant.io/schedule";

/// Due time of the scheduled run a backup was created for.
pub const SCHEDULED_FOR_ANNOTATION: &str = "qdrant.io/scheduled-for";

#[derive(CustomResource, Debug, Serialize, Deserialize, Clone, JsonSchema)]
#[kube(
    group = "qdrant.io",
    version = "v1alpha1",
    kind = "QdrantBackup",
    plural = "qdrantbackups",
    namespaced,
    status = "BackupStatus",
    shortname = "qb",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Size","type":"string","jsonPath":".status.totalSize"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct QdrantBackupSpec {
    pub cluster_ref: ObjectReference,
    pub storage: StorageTarget,
    /// Collections to back up; all when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u32>,
}

impl TryFrom<&QdrantBackup> for BackupSpec {
    type Error = Error;

    fn try_from(backup: &QdrantBackup) -> Result<Self> {
        let (name, namespace) = identity(backup)?;
        let s = &backup.spec;
        Ok(BackupSpec {
            cluster_ref: s.cluster_ref.resolve(&namespace),
            storage: s.storage.s3.to_storage(&namespace),
            collections: s.collections.clone(),
            retention_days: s.retention_days,
            name,
            namespace,
        })
    }
}
