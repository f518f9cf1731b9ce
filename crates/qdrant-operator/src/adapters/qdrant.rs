use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::domain::{CollectionInfo, Snapshot};
use crate::error::{Error, Result};
use crate::ports::{ClusterConnection, DatabaseConnector, VectorDatabase};

const API_KEY_HEADER: &str = "api-key";

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct CollectionsPage {
    collections: Vec<CollectionName>,
}

#[derive(Deserialize)]
struct CollectionName {
    name: String,
}

#[derive(Deserialize)]
struct SnapshotDescription {
    name: String,
    creation_time: Option<String>,
    #[serde(default)]
    size: u64,
}

impl SnapshotDescription {
    fn into_snapshot(self, collection: &str) -> Snapshot {
        let created_at = self
            .creation_time
            .as_deref()
            .and_then(parse_creation_time)
            .unwrap_or_else(Utc::now);
        Snapshot {
            name: self.name,
            collection: collection.to_string(),
            size_bytes: self.size,
            created_at,
        }
    }
}

#[derive(Deserialize)]
struct CollectionDescription {
    status: Option<String>,
    points_count: Option<u64>,
}

/// Qdrant reports naive UTC timestamps; accept RFC 3339 too.
fn parse_creation_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|n| n.and_utc())
}

/// REST client for one Qdrant cluster.
pub struct QdrantHttp {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl QdrantHttp {
    pub fn new(connection: &ClusterConnection, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: connection.endpoint.trim_end_matches('/').to_string(),
            api_key: connection.api_key.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let req = self
            .http
            .request(method, format!("{}{}", self.endpoint, path));
        match &self.api_key {
            Some(key) => req.header(API_KEY_HEADER, key),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(Error::Qdrant(format!("{status}: {}", body.trim())))
    }

    async fn result<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let envelope: Envelope<T> = self.send(req).await?.json().await?;
        Ok(envelope.result)
    }
}

#[async_trait]
impl VectorDatabase for QdrantHttp {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let page: CollectionsPage = self.result(self.request(Method::GET, "/collections")).await?;
        Ok(page.collections.into_iter().map(|c| c.name).collect())
    }

    async fn create_snapshot(&self, collection: &str) -> Result<Snapshot> {
        let path = format!("/collections/{collection}/snapshots?wait=true");
        let desc: SnapshotDescription = self.result(self.request(Method::POST, &path)).await?;
        debug!(collection = %collection, snapshot = %desc.name, size = desc.size, "snapshot created");
        Ok(desc.into_snapshot(collection))
    }

    async fn list_snapshots(&self, collection: &str) -> Result<Vec<Snapshot>> {
        let path = format!("/collections/{collection}/snapshots");
        let descs: Vec<SnapshotDescription> =
            self.result(self.request(Method::GET, &path)).await?;
        Ok(descs
            .into_iter()
            .map(|d| d.into_snapshot(collection))
            .collect())
    }

    async fn delete_snapshot(&self, collection: &str, snapshot: &str) -> Result<()> {
        let path = format!("/collections/{collection}/snapshots/{snapshot}?wait=true");
        self.send(self.request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn download_snapshot(
        &self,
        collection: &str,
        snapshot: &str,
        destination: &Path,
    ) -> Result<PathBuf> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let path = format!("/collections/{collection}/snapshots/{snapshot}");
        let resp = self.send(self.request(Method::GET, &path)).await?;

        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(destination.to_path_buf())
    }

    async fn recover_from_snapshot(&self, collection: &str, snapshot_path: &Path) -> Result<()> {
        let file = tokio::fs::File::open(snapshot_path).await?;
        let length = file.metadata().await?.len();
        let file_name = snapshot_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{collection}.snapshot"));
        // streamed from disk, snapshots can be larger than memory
        let part = Part::stream_with_length(Body::from(file), length).file_name(file_name);
        let form = Form::new().part("snapshot", part);
        let path = format!("/collections/{collection}/snapshots/upload?wait=true&priority=snapshot");
        self.send(self.request(Method::POST, &path).multipart(form))
            .await?;
        Ok(())
    }

    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
        let path = format!("/collections/{collection}");
        let desc: CollectionDescription = self.result(self.request(Method::GET, &path)).await?;
        Ok(CollectionInfo {
            points_count: desc.points_count,
            status: desc.status,
        })
    }

    async fn health_check(&self) -> bool {
        match self.send(self.request(Method::GET, "/healthz")).await {
            Ok(_) => true,
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "qdrant health check failed");
                false
            }
        }
    }
}

/// Builds a [`QdrantHttp`] per cluster connection.
#[derive(Debug, Clone)]
pub struct QdrantConnector {
    pub timeout: Duration,
}

impl Default for QdrantConnector {
    fn default() -> Self {
        // snapshot creation on large collections is slow
        Self {
            timeout: Duration::from_secs(600),
        }
    }
}

impl DatabaseConnector for QdrantConnector {
    fn connect(&self, connection: &ClusterConnection) -> Result<Arc<dyn VectorDatabase>> {
        Ok(Arc::new(QdrantHttp::new(connection, self.timeout)?))
    }
}
