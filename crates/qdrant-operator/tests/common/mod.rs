#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use qdrant_operator::domain::{
    CollectionInfo, ObjectRef, S3StorageSpec, SecretRef, Snapshot, StorageCredentials,
};
use qdrant_operator::error::{Error, Result};
use qdrant_operator::ports::{
    ChartDeployer, ClusterApi, ClusterConnection, DatabaseConnector, ObjectStorage, ResourceKind,
    VectorDatabase,
};
use serde_json::Value;

pub const NS: &str = "prod";

pub fn storage(prefix: &str) -> S3StorageSpec {
    S3StorageSpec {
        bucket: "snapshots".into(),
        prefix: prefix.into(),
        region: "us-east-1".into(),
        endpoint: Some("http://minio:9000".into()),
        force_path_style: true,
        credentials_secret_ref: SecretRef::new("s3-creds", "AWS_ACCESS_KEY_ID", NS),
    }
}

pub fn cluster_ref() -> ObjectRef {
    ObjectRef {
        name: "vectors".into(),
        namespace: NS.into(),
    }
}

pub fn connection() -> ClusterConnection {
    ClusterConnection::new("http://qdrant-vectors.prod.svc.cluster.local:6333", None)
}

#[derive(Debug, Clone, PartialEq)]
pub enum HelmCall {
    Install { release: String, chart: String, values: Value, version: Option<String> },
    Upgrade { release: String, chart: String, values: Value, version: Option<String> },
    Uninstall { release: String },
}

#[derive(Default)]
pub struct FakeDeployer {
    pub releases: Mutex<HashSet<(String, String)>>,
    pub calls: Mutex<Vec<HelmCall>>,
    pub fail_with: Option<String>,
}

impl FakeDeployer {
    pub fn with_release(release: &str, namespace: &str) -> Self {
        let d = Self::default();
        d.releases
            .lock()
            .unwrap()
            .insert((release.into(), namespace.into()));
        d
    }

    pub fn calls(&self) -> Vec<HelmCall> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self) -> Result<()> {
        match &self.fail_with {
            Some(msg) => Err(Error::Helm(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChartDeployer for FakeDeployer {
    async fn install(
        &self,
        release: &str,
        namespace: &str,
        chart: &str,
        values: &Value,
        version: Option<&str>,
    ) -> Result<String> {
        self.check()?;
        self.calls.lock().unwrap().push(HelmCall::Install {
            release: release.into(),
            chart: chart.into(),
            values: values.clone(),
            version: version.map(String::from),
        });
        self.releases
            .lock()
            .unwrap()
            .insert((release.into(), namespace.into()));
        Ok(release.into())
    }

    async fn upgrade(
        &self,
        release: &str,
        _namespace: &str,
        chart: &str,
        values: &Value,
        version: Option<&str>,
    ) -> Result<String> {
        self.check()?;
        self.calls.lock().unwrap().push(HelmCall::Upgrade {
            release: release.into(),
            chart: chart.into(),
            values: values.clone(),
            version: version.map(String::from),
        });
        Ok(release.into())
    }

    async fn uninstall(&self, release: &str, namespace: &str) -> Result<()> {
        self.check()?;
        let removed = self
            .releases
            .lock()
            .unwrap()
            .remove(&(release.to_string(), namespace.to_string()));
        if !removed {
            return Err(Error::Helm(format!("uninstall: Release not loaded: {release}: release: not found")));
        }
        self.calls.lock().unwrap().push(HelmCall::Uninstall {
            release: release.into(),
        });
        Ok(())
    }

    async fn release_status(&self, release: &str, namespace: &str) -> Result<Option<Value>> {
        let exists = self
            .releases
            .lock()
            .unwrap()
            .contains(&(release.to_string(), namespace.to_string()));
        Ok(exists.then(|| serde_json::json!({ "name": release, "info": { "status": "deployed" } })))
    }
}

/// In-memory API server: secrets plus custom resources keyed by plural/namespace/name.
#[derive(Default)]
pub struct FakeClusterApi {
    pub secrets: Mutex<HashMap<(String, String, String), String>>,
    pub resources: Mutex<BTreeMap<(String, String, String), Value>>,
    pub created: Mutex<Vec<Value>>,
    pub secret_lookups: Mutex<Vec<SecretRef>>,
}

impl FakeClusterApi {
    pub fn with_s3_credentials() -> Self {
        let api = Self::default();
        api.put_secret("s3-creds", "AWS_ACCESS_KEY_ID", "AKIA");
        api.put_secret("s3-creds", "AWS_SECRET_ACCESS_KEY", "shh");
        api
    }

    pub fn put_secret(&self, name: &str, key: &str, value: &str) {
        self.secrets
            .lock()
            .unwrap()
            .insert((NS.into(), name.into(), key.into()), value.into());
    }

    pub fn put_resource(&self, kind: &ResourceKind, name: &str, value: Value) {
        self.resources
            .lock()
            .unwrap()
            .insert((kind.plural.into(), NS.into(), name.into()), value);
    }

    pub fn created(&self) -> Vec<Value> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterApi for FakeClusterApi {
    async fn secret_value(&self, secret: &SecretRef) -> Result<String> {
        self.secret_lookups.lock().unwrap().push(secret.clone());
        self.secrets
            .lock()
            .unwrap()
            .get(&(secret.namespace.clone(), secret.name.clone(), secret.key.clone()))
            .cloned()
            .ok_or_else(|| Error::not_found("Secret", &secret.name, &secret.namespace))
    }

    async fn get_resource(
        &self,
        kind: &ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Value>> {
        Ok(self
            .resources
            .lock()
            .unwrap()
            .get(&(kind.plural.into(), namespace.into(), name.into()))
            .cloned())
    }

    async fn list_resources(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        _label_selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        Ok(self
            .resources
            .lock()
            .unwrap()
            .iter()
            .filter(|((plural, ns, _), _)| plural == kind.plural && ns == namespace)
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn create_resource(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        body: &Value,
    ) -> Result<Value> {
        let name = body["metadata"]["name"].as_str().unwrap_or_default().to_string();
        self.resources
            .lock()
            .unwrap()
            .insert((kind.plural.into(), namespace.into(), name), body.clone());
        self.created.lock().unwrap().push(body.clone());
        Ok(body.clone())
    }

    async fn delete_resource(&self, kind: &ResourceKind, name: &str, namespace: &str) -> Result<()> {
        self.resources
            .lock()
            .unwrap()
            .remove(&(kind.plural.into(), namespace.into(), name.into()));
        Ok(())
    }

    async fn update_status(
        &self,
        kind: &ResourceKind,
        name: &str,
        namespace: &str,
        status: &Value,
    ) -> Result<()> {
        if let Some(obj) = self
            .resources
            .lock()
            .unwrap()
            .get_mut(&(kind.plural.into(), namespace.into(), name.into()))
        {
            obj["status"] = status.clone();
        }
        Ok(())
    }

    async fn service_endpoint(&self, name: &str, namespace: &str) -> Result<String> {
        Ok(format!("http://{name}.{namespace}.svc.cluster.local:6333"))
    }
}

/// Qdrant double. Snapshot files are written with the collection name as content.
#[derive(Default)]
pub struct FakeDatabase {
    pub collections: Vec<String>,
    pub snapshot_sizes: HashMap<String, u64>,
    pub fail_snapshot: HashSet<String>,
    pub fail_recover: HashSet<String>,
    /// Statuses handed out by successive `collection_info` calls; last one repeats
    pub info_statuses: Mutex<Vec<String>>,
    pub deleted_snapshots: Mutex<Vec<(String, String)>>,
    pub recovered: Mutex<Vec<(String, String)>>,
    pub info_calls: Mutex<u32>,
}

impl FakeDatabase {
    pub fn with_collections(names: &[&str]) -> Self {
        Self {
            collections: names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn recovered(&self) -> Vec<(String, String)> {
        self.recovered.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorDatabase for FakeDatabase {
    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.collections.clone())
    }

    async fn create_snapshot(&self, collection: &str) -> Result<Snapshot> {
        if self.fail_snapshot.contains(collection) {
            return Err(Error::Qdrant(format!("snapshot of {collection} failed")));
        }
        Ok(Snapshot {
            name: format!("{collection}-2026-03-14.snapshot"),
            collection: collection.into(),
            size_bytes: self.snapshot_sizes.get(collection).copied().unwrap_or(1024),
            created_at: Utc.with_ymd_and_hms(2026, 3, 14, 2, 0, 0).unwrap(),
        })
    }

    async fn list_snapshots(&self, _collection: &str) -> Result<Vec<Snapshot>> {
        Ok(vec![])
    }

    async fn delete_snapshot(&self, collection: &str, snapshot: &str) -> Result<()> {
        self.deleted_snapshots
            .lock()
            .unwrap()
            .push((collection.into(), snapshot.into()));
        Ok(())
    }

    async fn download_snapshot(
        &self,
        collection: &str,
        _snapshot: &str,
        destination: &Path,
    ) -> Result<PathBuf> {
        tokio::fs::write(destination, collection.as_bytes()).await?;
        Ok(destination.to_path_buf())
    }

    async fn recover_from_snapshot(&self, collection: &str, snapshot_path: &Path) -> Result<()> {
        if self.fail_recover.contains(collection) {
            return Err(Error::Qdrant(format!("recovery of {collection} failed")));
        }
        let content = tokio::fs::read_to_string(snapshot_path).await?;
        self.recovered
            .lock()
            .unwrap()
            .push((collection.into(), content));
        Ok(())
    }

    async fn collection_info(&self, _collection: &str) -> Result<CollectionInfo> {
        let mut calls = self.info_calls.lock().unwrap();
        *calls += 1;
        let mut statuses = self.info_statuses.lock().unwrap();
        let status = if statuses.len() > 1 {
            statuses.remove(0)
        } else {
            statuses.first().cloned().unwrap_or_else(|| "green".into())
        };
        Ok(CollectionInfo {
            points_count: Some(100),
            status: Some(status),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }
}

pub struct FakeConnector {
    pub db: Arc<FakeDatabase>,
    pub connections: Mutex<Vec<ClusterConnection>>,
}

impl FakeConnector {
    pub fn new(db: Arc<FakeDatabase>) -> Self {
        Self {
            db,
            connections: Mutex::new(vec![]),
        }
    }
}

impl DatabaseConnector for FakeConnector {
    fn connect(&self, connection: &ClusterConnection) -> Result<Arc<dyn VectorDatabase>> {
        self.connections.lock().unwrap().push(connection.clone());
        Ok(self.db.clone())
    }
}

/// Bucket contents as key -> bytes. Bucket and endpoint are ignored.
#[derive(Default)]
pub struct FakeStorage {
    pub objects: Mutex<BTreeMap<String, Vec<u8>>>,
    pub fail_upload_for: HashSet<String>,
    pub credentials_seen: Mutex<Vec<StorageCredentials>>,
}

impl FakeStorage {
    pub fn with_objects(keys: &[(&str, &str)]) -> Self {
        let s = Self::default();
        for (k, v) in keys {
            s.objects
                .lock()
                .unwrap()
                .insert(k.to_string(), v.as_bytes().to_vec());
        }
        s
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload_file(
        &self,
        storage: &S3StorageSpec,
        credentials: &StorageCredentials,
        local_path: &Path,
        key: &str,
    ) -> Result<String> {
        self.credentials_seen.lock().unwrap().push(credentials.clone());
        if self.fail_upload_for.iter().any(|c| key.contains(&format!("/{c}/"))) {
            return Err(Error::S3(format!("access denied for {key}")));
        }
        let bytes = tokio::fs::read(local_path).await?;
        self.objects.lock().unwrap().insert(key.into(), bytes);
        Ok(storage.uri(key))
    }

    async fn download_file(
        &self,
        _storage: &S3StorageSpec,
        _credentials: &StorageCredentials,
        key: &str,
        local_path: &Path,
    ) -> Result<PathBuf> {
        let bytes = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::S3(format!("NoSuchKey: {key}")))?;
        tokio::fs::write(local_path, bytes).await?;
        Ok(local_path.to_path_buf())
    }

    async fn delete_file(
        &self,
        _storage: &S3StorageSpec,
        _credentials: &StorageCredentials,
        key: &str,
    ) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_files(
        &self,
        _storage: &S3StorageSpec,
        _credentials: &StorageCredentials,
        prefix: &str,
    ) -> Result<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn file_exists(
        &self,
        _storage: &S3StorageSpec,
        _credentials: &StorageCredentials,
        key: &str,
    ) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }
}
