use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::{discard_staged, storage_credentials};
use crate::domain::{
    BackupPhase, BackupSpec, BackupStatus, CollectionBackupStatus, Condition, ItemStatus,
    Snapshot, StorageCredentials, format_size, object_key,
};
use crate::error::Result;
use crate::ports::{
    ClusterApi, ClusterConnection, DatabaseConnector, ObjectStorage, VectorDatabase,
};

/// Snapshots every requested collection and ships it to object storage.
pub struct BackupExecutor {
    connector: Arc<dyn DatabaseConnector>,
    storage: Arc<dyn ObjectStorage>,
    cluster_api: Arc<dyn ClusterApi>,
    staging_dir: PathBuf,
}

impl BackupExecutor {
    pub fn new(
        connector: Arc<dyn DatabaseConnector>,
        storage: Arc<dyn ObjectStorage>,
        cluster_api: Arc<dyn ClusterApi>,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            connector,
            storage,
            cluster_api,
            staging_dir: staging_dir.into(),
        }
    }

    /// Credential and discovery failures abort the whole backup. A failure on
    /// one collection is recorded against that collection and the rest still run.
    pub async fn execute(
        &self,
        spec: &BackupSpec,
        connection: &ClusterConnection,
    ) -> Result<BackupStatus> {
        let start_time = Utc::now();
        let credentials = storage_credentials(self.cluster_api.as_ref(), &spec.storage).await?;
        let db = self.connector.connect(connection)?;

        let collections = if spec.collections.is_empty() {
            db.list_collections().await?
        } else {
            spec.collections.clone()
        };
        info!(
            backup = %spec.name,
            endpoint = %connection.endpoint,
            collections = collections.len(),
            "starting backup"
        );

        let mut statuses = Vec::with_capacity(collections.len());
        let mut total_bytes: u64 = 0;
        for collection in &collections {
            match self
                .backup_collection(db.as_ref(), spec, &credentials, collection)
                .await
            {
                Ok(snapshot) => {
                    total_bytes += snapshot.size_bytes;
                    statuses.push(CollectionBackupStatus::completed(collection, &snapshot));
                }
                Err(e) => {
                    warn!(backup = %spec.name, collection = %collection, error = %e, "collection backup failed");
                    statuses.push(CollectionBackupStatus::failed(collection, e));
                }
            }
        }

        let failed: Vec<&CollectionBackupStatus> = statuses
            .iter()
            .filter(|c| c.status == ItemStatus::Failed)
            .collect();
        let phase = if failed.is_empty() {
            BackupPhase::Completed
        } else {
            BackupPhase::Failed
        };
        let error = failed.first().and_then(|c| c.error.clone());
        let succeeded = collections.len() - failed.len();
        let completion_time = Utc::now();
        info!(backup = %spec.name, ?phase, succeeded, total = collections.len(), "backup finished");

        Ok(BackupStatus {
            phase,
            start_time: Some(start_time),
            completion_time: Some(completion_time),
            s3_path: Some(spec.storage_path()),
            total_size: Some(format_size(total_bytes)),
            collections: statuses,
            error,
            conditions: vec![Condition::new(
                "Complete",
                phase == BackupPhase::Completed,
                if phase == BackupPhase::Completed {
                    "BackupCompleted"
                } else {
                    "BackupFailed"
                },
                format!("Backed up {succeeded}/{} collections", collections.len()),
                completion_time,
            )],
        })
    }

    async fn backup_collection(
        &self,
        db: &dyn VectorDatabase,
        spec: &BackupSpec,
        credentials: &StorageCredentials,
        collection: &str,
    ) -> Result<Snapshot> {
        let snapshot = db.create_snapshot(collection).await?;
        let local = self.staging_dir.join(&snapshot.name);
        let key = object_key(&[&spec.storage.prefix, &spec.name, collection, &snapshot.name]);

        let transferred = async {
            db.download_snapshot(collection, &snapshot.name, &local)
                .await?;
            self.storage
                .upload_file(&spec.storage, credentials, &local, &key)
                .await
        }
        .await;
        discard_staged(&local).await;
        let uri = transferred?;

        db.delete_snapshot(collection, &snapshot.name).await?;
        info!(collection = %collection, snapshot = %snapshot.name, uri = %uri, "collection backed up");
        Ok(snapshot)
    }
}
