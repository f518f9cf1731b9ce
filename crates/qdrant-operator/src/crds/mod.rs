//! Custom resources served under `qdrant.io/v1alpha1` and their conversion
//! into domain spec objects.

pub mod backup;
pub mod cluster;
pub mod restore;
pub mod schedule;

use kube::{Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::domain::{
    DEFAULT_ACCESS_KEY_ID_KEY, DEFAULT_REGION, ObjectRef, S3StorageSpec, SecretRef,
};
use crate::error::{Error, Result};

pub use backup::{QdrantBackup, QdrantBackupSpec};
pub use cluster::{QdrantCluster, QdrantClusterSpec};
pub use restore::{QdrantRestore, QdrantRestoreSpec};
pub use schedule::{QdrantBackupSchedule, QdrantBackupScheduleSpec};

/// Name and namespace of a namespaced object.
pub(crate) fn identity<K: Resource>(obj: &K) -> Result<(String, String)> {
    let name = obj
        .meta()
        .name
        .clone()
        .ok_or_else(|| Error::config("object has no metadata.name"))?;
    let namespace = obj
        .namespace()
        .ok_or_else(|| Error::config(format!("{name} has no namespace")))?;
    Ok((name, namespace))
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ObjectReference {
    pub name: String,
    /// Defaults to the namespace of the referencing object
    pub namespace: Option<String>,
}

impl ObjectReference {
    pub fn resolve(&self, default_namespace: &str) -> ObjectRef {
        ObjectRef {
            name: self.name.clone(),
            namespace: self
                .namespace
                .clone()
                .unwrap_or_else(|| default_namespace.to_string()),
        }
    }
}

impl From<&ObjectRef> for ObjectReference {
    fn from(r: &ObjectRef) -> Self {
        Self {
            name: r.name.clone(),
            namespace: Some(r.namespace.clone()),
        }
    }
}

/// Secret holding `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsSecretRef {
    pub name: String,
    /// Key of the access key id, default AWS_ACCESS_KEY_ID
    #[serde(default = "default_access_key_id_key")]
    pub access_key_id_key: String,
    pub namespace: Option<String>,
}

fn default_access_key_id_key() -> String {
    DEFAULT_ACCESS_KEY_ID_KEY.into()
}
fn default_region() -> String {
    DEFAULT_REGION.into()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct S3Location {
    pub bucket: String,
    #[serde(default, alias = "path")]
    pub prefix: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Endpoint override for S3-compatible services
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    pub credentials_secret_ref: CredentialsSecretRef,
}

impl S3Location {
    pub fn to_storage(&self, default_namespace: &str) -> S3StorageSpec {
        let creds = &self.credentials_secret_ref;
        S3StorageSpec {
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            force_path_style: self.force_path_style,
            credentials_secret_ref: SecretRef::new(
                &creds.name,
                &creds.access_key_id_key,
                creds.namespace.as_deref().unwrap_or(default_namespace),
            ),
        }
    }
}

impl From<&S3StorageSpec> for S3Location {
    fn from(s: &S3StorageSpec) -> Self {
        Self {
            bucket: s.bucket.clone(),
            prefix: s.prefix.clone(),
            region: s.region.clone(),
            endpoint: s.endpoint.clone(),
            force_path_style: s.force_path_style,
            credentials_secret_ref: CredentialsSecretRef {
                name: s.credentials_secret_ref.name.clone(),
                access_key_id_key: s.credentials_secret_ref.key.clone(),
                namespace: Some(s.credentials_secret_ref.namespace.clone()),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct StorageTarget {
    pub s3: S3Location,
}
