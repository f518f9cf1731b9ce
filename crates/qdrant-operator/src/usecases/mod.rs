//! Orchestration: each use case takes a spec (and prior status where it
//! matters), calls out through [`crate::ports`], and hands back a new status.

mod backup;
mod cluster;
mod restore;
mod schedule;

pub use backup::BackupExecutor;
pub use cluster::{ClusterDeleter, ClusterReconciler};
pub use restore::{IndexingWait, RestoreExecutor};
pub use schedule::{ScheduleProcessor, backup_request};

use std::path::Path;

use tracing::warn;

use crate::crds::QdrantCluster;
use crate::domain::{
    ObjectRef, S3StorageSpec, SECRET_ACCESS_KEY_KEY, StorageCredentials, release_name,
};
use crate::error::{Error, Result};
use crate::ports::{ClusterApi, ClusterConnection, QDRANT_CLUSTERS};

/// Endpoint and API key of the cluster a backup or restore points at.
pub async fn resolve_connection(
    api: &dyn ClusterApi,
    cluster_ref: &ObjectRef,
) -> Result<ClusterConnection> {
    let value = api
        .get_resource(&QDRANT_CLUSTERS, &cluster_ref.name, &cluster_ref.namespace)
        .await?
        .ok_or_else(|| {
            Error::not_found(QDRANT_CLUSTERS.kind, &cluster_ref.name, &cluster_ref.namespace)
        })?;
    let cluster: QdrantCluster = serde_json::from_value(value)?;

    let endpoint = api
        .service_endpoint(&release_name(&cluster_ref.name), &cluster_ref.namespace)
        .await?;
    let api_key = match cluster.api_key_ref(&cluster_ref.namespace) {
        Some(secret) => Some(api.secret_value(&secret).await?),
        None => None,
    };
    Ok(ClusterConnection::new(endpoint, api_key))
}

/// Access key from the referenced key, secret key from `AWS_SECRET_ACCESS_KEY`
/// in the same Secret.
pub(crate) async fn storage_credentials(
    api: &dyn ClusterApi,
    storage: &S3StorageSpec,
) -> Result<StorageCredentials> {
    let access_ref = &storage.credentials_secret_ref;
    let access_key_id = api.secret_value(access_ref).await?;
    let secret_access_key = api
        .secret_value(&access_ref.with_key(SECRET_ACCESS_KEY_KEY))
        .await?;
    Ok(StorageCredentials {
        access_key_id,
        secret_access_key,
    })
}

/// Best effort removal of a staged snapshot file.
pub(crate) async fn discard_staged(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove staged snapshot"),
    }
}
