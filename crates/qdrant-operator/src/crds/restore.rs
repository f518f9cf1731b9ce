use std::collections::BTreeMap;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{ObjectReference, StorageTarget, identity};
use crate::domain::{RestoreSpec, RestoreStatus};
use crate::error::{Error, Result};

#[derive(CustomResource, Debug, Serialize, Deserialize, Clone, JsonSchema)]
#[kube(
    group = "qdrant.io",
    version = "v1alpha1",
    kind = "QdrantRestore",
    plural = "qdrantrestores",
    namespaced,
    status = "RestoreStatus",
    shortname = "qr",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Progress","type":"integer","jsonPath":".status.progress.percentage"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct QdrantRestoreSpec {
    pub target_cluster_ref: ObjectReference,
    /// Restore from a QdrantBackup
    pub backup_ref: Option<ObjectReference>,
    /// Or straight from a bucket path
    pub source: Option<StorageTarget>,
    #[serde(default)]
    pub collections: Vec<String>,
    /// Source collection name to target collection name
    #[serde(default)]
    pub collection_mapping: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub wait_for_indexing: bool,
}

fn default_true() -> bool {
    true
}

impl TryFrom<&QdrantRestore> for RestoreSpec {
    type Error = Error;

    fn try_from(restore: &QdrantRestore) -> Result<Self> {
        let (name, namespace) = identity(restore)?;
        let s = &restore.spec;
        if s.backup_ref.is_none() && s.source.is_none() {
            return Err(Error::config(format!(
                "{name}: one of backupRef or source is required"
            )));
        }
        Ok(RestoreSpec {
            target_cluster_ref: s.target_cluster_ref.resolve(&namespace),
            backup_ref: s.backup_ref.as_ref().map(|r| r.resolve(&namespace)),
            source: s.source.as_ref().map(|t| t.s3.to_storage(&namespace)),
            collections: s.collections.clone(),
            collection_mapping: s.collection_mapping.clone(),
            wait_for_indexing: s.wait_for_indexing,
            name,
            namespace,
        })
    }
}
