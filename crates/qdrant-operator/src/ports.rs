//! Narrow interfaces the use cases call through. Each has one adapter in
//! [`crate::adapters`]; tests substitute in-memory doubles.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{CollectionInfo, S3StorageSpec, SecretRef, Snapshot, StorageCredentials};
use crate::error::Result;

/// Identifies a custom resource type on the API server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceKind {
    pub group: &'static str,
    pub version: &'static str,
    pub kind: &'static str,
    pub plural: &'static str,
}

impl ResourceKind {
    pub fn api_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }
}

pub const GROUP: &str = "qdrant.io";
pub const VERSION: &str = "v1alpha1";

pub const QDRANT_CLUSTERS: ResourceKind = ResourceKind {
    group: GROUP,
    version: VERSION,
    kind: "QdrantCluster",
    plural: "qdrantclusters",
};
pub const QDRANT_BACKUPS: ResourceKind = ResourceKind {
    group: GROUP,
    version: VERSION,
    kind: "QdrantBackup",
    plural: "qdrantbackups",
};
pub const QDRANT_RESTORES: ResourceKind = ResourceKind {
    group: GROUP,
    version: VERSION,
    kind: "QdrantRestore",
    plural: "qdrantrestores",
};
pub const QDRANT_BACKUP_SCHEDULES: ResourceKind = ResourceKind {
    group: GROUP,
    version: VERSION,
    kind: "QdrantBackupSchedule",
    plural: "qdrantbackupschedules",
};

/// Installs and upgrades chart releases.
#[async_trait]
pub trait ChartDeployer: Send + Sync {
    async fn install(
        &self,
        release: &str,
        namespace: &str,
        chart: &str,
        values: &Value,
        version: Option<&str>,
    ) -> Result<String>;

    async fn upgrade(
        &self,
        release: &str,
        namespace: &str,
        chart: &str,
        values: &Value,
        version: Option<&str>,
    ) -> Result<String>;

    async fn uninstall(&self, release: &str, namespace: &str) -> Result<()>;

    /// `None` when the release does not exist.
    async fn release_status(&self, release: &str, namespace: &str) -> Result<Option<Value>>;
}

#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fails when the Secret or the key is missing.
    async fn secret_value(&self, secret: &SecretRef) -> Result<String>;

    /// `None` when the object does not exist.
    async fn get_resource(
        &self,
        kind: &ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Value>>;

    async fn list_resources(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>>;

    async fn create_resource(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        body: &Value,
    ) -> Result<Value>;

    async fn delete_resource(&self, kind: &ResourceKind, name: &str, namespace: &str)
    -> Result<()>;

    async fn update_status(
        &self,
        kind: &ResourceKind,
        name: &str,
        namespace: &str,
        status: &Value,
    ) -> Result<()>;

    /// In-cluster URL of a service.
    async fn service_endpoint(&self, name: &str, namespace: &str) -> Result<String>;
}

/// Endpoint and API key of one running cluster.
#[derive(Clone, PartialEq, Eq)]
pub struct ClusterConnection {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl ClusterConnection {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

impl std::fmt::Debug for ClusterConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterConnection")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Database client bound to a single cluster.
#[async_trait]
pub trait VectorDatabase: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<String>>;
    async fn create_snapshot(&self, collection: &str) -> Result<Snapshot>;
    async fn list_snapshots(&self, collection: &str) -> Result<Vec<Snapshot>>;
    async fn delete_snapshot(&self, collection: &str, snapshot: &str) -> Result<()>;
    async fn download_snapshot(
        &self,
        collection: &str,
        snapshot: &str,
        destination: &Path,
    ) -> Result<PathBuf>;
    async fn recover_from_snapshot(&self, collection: &str, snapshot_path: &Path) -> Result<()>;
    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo>;
    async fn health_check(&self) -> bool;
}

/// Opens a [`VectorDatabase`] for a given cluster.
pub trait DatabaseConnector: Send + Sync {
    fn connect(&self, connection: &ClusterConnection) -> Result<Arc<dyn VectorDatabase>>;
}

/// S3-compatible object storage.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Returns the `s3://` URI of the uploaded object.
    async fn upload_file(
        &self,
        storage: &S3StorageSpec,
        credentials: &StorageCredentials,
        local_path: &Path,
        key: &str,
    ) -> Result<String>;

    async fn download_file(
        &self,
        storage: &S3StorageSpec,
        credentials: &StorageCredentials,
        key: &str,
        local_path: &Path,
    ) -> Result<PathBuf>;

    async fn delete_file(
        &self,
        storage: &S3StorageSpec,
        credentials: &StorageCredentials,
        key: &str,
    ) -> Result<()>;

    async fn list_files(
        &self,
        storage: &S3StorageSpec,
        credentials: &StorageCredentials,
        prefix: &str,
    ) -> Result<Vec<String>>;

    async fn file_exists(
        &self,
        storage: &S3StorageSpec,
        credentials: &StorageCredentials,
        key: &str,
    ) -> Result<bool>;
}
