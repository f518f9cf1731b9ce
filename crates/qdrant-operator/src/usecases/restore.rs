use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{discard_staged, storage_credentials};
use crate::crds::QdrantBackup;
use crate::domain::{
    CollectionInfo, Condition, ItemStatus, RestorePhase, RestoreProgress, RestoreSpec,
    RestoreStatus, RestoredCollection, S3StorageSpec, StorageCredentials,
    collections_from_keys, find_snapshot_key, listing_prefix, strip_s3_uri,
};
use crate::error::{Error, Result};
use crate::ports::{
    ClusterApi, ClusterConnection, DatabaseConnector, ObjectStorage, QDRANT_BACKUPS,
    VectorDatabase,
};

/// How long to wait for a recovered collection to finish indexing.
#[derive(Debug, Clone, Copy)]
pub struct IndexingWait {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for IndexingWait {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 120,
        }
    }
}

/// Receives the phase a restore is in together with its progress.
type ProgressObserver = Arc<dyn Fn(RestorePhase, &RestoreProgress) + Send + Sync>;

/// Pulls collection snapshots from object storage and recovers them into a cluster.
pub struct RestoreExecutor {
    connector: Arc<dyn DatabaseConnector>,
    storage: Arc<dyn ObjectStorage>,
    cluster_api: Arc<dyn ClusterApi>,
    staging_dir: PathBuf,
    indexing: IndexingWait,
    observer: Option<ProgressObserver>,
}

/// Where the snapshots of a restore come from.
struct Source {
    storage: S3StorageSpec,
    path: String,
}

impl RestoreExecutor {
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
            indexing: IndexingWait::default(),
            observer: None,
        }
    }

    pub fn with_indexing_wait(mut self, indexing: IndexingWait) -> Self {
        self.indexing = indexing;
        self
    }

    /// Called with `Restoring` before each collection starts and with
    /// `Indexing` when a recovered collection is polled for readiness.
    pub fn with_progress_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub async fn execute(
        &self,
        spec: &RestoreSpec,
        connection: &ClusterConnection,
    ) -> Result<RestoreStatus> {
        let start_time = Utc::now();
        let source = self.resolve_source(spec).await?;
        let credentials = storage_credentials(self.cluster_api.as_ref(), &source.storage).await?;
        let db = self.connector.connect(connection)?;

        let files = self
            .storage
            .list_files(&source.storage, &credentials, &listing_prefix(&source.path))
            .await?;
        let collections = if spec.collections.is_empty() {
            collections_from_keys(&files)
        } else {
            spec.collections.clone()
        };
        let total = collections.len();
        info!(
            restore = %spec.name,
            source = %source.path,
            endpoint = %connection.endpoint,
            collections = total,
            "starting restore"
        );

        let mut restored = Vec::with_capacity(total);
        for (index, collection) in collections.iter().enumerate() {
            let target = spec.target_name(collection);
            let progress = RestoreProgress::before(index, total, target);
            debug!(restore = %spec.name, percentage = progress.percentage, current = %target, "restore progress");
            self.report(RestorePhase::Restoring, &progress);

            match self
                .restore_collection(
                    db.as_ref(),
                    &source.storage,
                    &credentials,
                    &files,
                    collection,
                    target,
                    spec.wait_for_indexing.then_some(&progress),
                )
                .await
            {
                Ok(info) => {
                    restored.push(RestoredCollection::completed(collection, target, info.points_count))
                }
                Err(e) => {
                    warn!(restore = %spec.name, collection = %collection, target = %target, error = %e, "collection restore failed");
                    restored.push(RestoredCollection::failed(collection, target, e));
                }
            }
        }

        let failures = restored
            .iter()
            .filter(|r| r.status == ItemStatus::Failed)
            .count();
        let error = restored
            .iter()
            .find(|r| r.status == ItemStatus::Failed)
            .and_then(|r| r.error.clone());
        let phase = if failures == 0 {
            RestorePhase::Completed
        } else {
            RestorePhase::Failed
        };
        let completion_time = Utc::now();
        info!(restore = %spec.name, ?phase, failures, total, "restore finished");

        Ok(RestoreStatus {
            phase,
            start_time: Some(start_time),
            completion_time: Some(completion_time),
            source_backup: Some(source.storage.uri(&source.path)),
            restored_collections: restored,
            progress: RestoreProgress::finished(total, failures),
            error,
            conditions: vec![Condition::new(
                "Complete",
                failures == 0,
                if failures == 0 {
                    "RestoreCompleted"
                } else {
                    "RestoreFailed"
                },
                format!("Restored {}/{total} collections", total - failures),
                completion_time,
            )],
        })
    }

    /// Backup reference first, then the direct source.
    async fn resolve_source(&self, spec: &RestoreSpec) -> Result<Source> {
        let mut backup: Option<QdrantBackup> = None;
        if let Some(r) = &spec.backup_ref {
            match self
                .cluster_api
                .get_resource(&QDRANT_BACKUPS, &r.name, &r.namespace)
                .await?
            {
                Some(value) => backup = Some(serde_json::from_value(value)?),
                None if spec.source.is_none() => {
                    return Err(Error::not_found(QDRANT_BACKUPS.kind, &r.name, &r.namespace));
                }
                None => {
                    warn!(restore = %spec.name, backup = %r.name, "referenced backup not found, using direct source")
                }
            }
        }

        let recorded_path = backup
            .as_ref()
            .and_then(|b| b.status.as_ref())
            .and_then(|s| s.s3_path.as_deref())
            .map(strip_s3_uri);
        let path = match (recorded_path, &spec.source) {
            (Some(path), _) => path,
            (None, Some(source)) => source.prefix.clone(),
            (None, None) => {
                return Err(Error::config(format!(
                    "{}: no valid backup source found",
                    spec.name
                )));
            }
        };

        let storage = match (&spec.source, &backup) {
            (Some(source), _) => source.clone(),
            (None, Some(b)) => {
                let namespace = spec
                    .backup_ref
                    .as_ref()
                    .map(|r| r.namespace.as_str())
                    .unwrap_or(&spec.namespace);
                b.spec.storage.s3.to_storage(namespace)
            }
            (None, None) => {
                return Err(Error::config(format!(
                    "{}: no storage configuration found",
                    spec.name
                )));
            }
        };

        Ok(Source { storage, path })
    }

    #[allow(clippy::too_many_arguments)]
    async fn restore_collection(
        &self,
        db: &dyn VectorDatabase,
        storage: &S3StorageSpec,
        credentials: &StorageCredentials,
        files: &[String],
        collection: &str,
        target: &str,
        indexing: Option<&RestoreProgress>,
    ) -> Result<CollectionInfo> {
        let key = find_snapshot_key(files, collection).ok_or_else(|| {
            Error::S3(format!("no snapshot found for collection {collection}"))
        })?;
        let local = self
            .staging_dir
            .join(format!("{collection}_restore.snapshot"));

        let result = async {
            self.storage
                .download_file(storage, credentials, key, &local)
                .await?;
            db.recover_from_snapshot(target, &local).await?;
            match indexing {
                Some(progress) => {
                    self.report(RestorePhase::Indexing, progress);
                    self.wait_until_indexed(db, target).await
                }
                None => db.collection_info(target).await,
            }
        }
        .await;
        discard_staged(&local).await;

        let info = result?;
        info!(collection = %collection, target = %target, points = ?info.points_count, "collection restored");
        Ok(info)
    }

    fn report(&self, phase: RestorePhase, progress: &RestoreProgress) {
        if let Some(observer) = &self.observer {
            observer(phase, progress);
        }
    }

    async fn wait_until_indexed(&self, db: &dyn VectorDatabase, target: &str) -> Result<CollectionInfo> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let info = db.collection_info(target).await?;
            if info.is_green() {
                return Ok(info);
            }
            if attempts >= self.indexing.max_attempts {
                return Err(Error::Qdrant(format!(
                    "collection {target} still {} after {attempts} checks",
                    info.status.as_deref().unwrap_or("unknown")
                )));
            }
            debug!(collection = %target, attempts, "waiting for indexing");
            tokio::time::sleep(self.indexing.interval).await;
        }
    }
}
