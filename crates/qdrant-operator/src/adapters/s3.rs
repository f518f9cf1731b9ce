use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::domain::{S3StorageSpec, StorageCredentials};
use crate::error::{Error, Result};
use crate::ports::ObjectStorage;

/// [`ObjectStorage`] over the AWS SDK. Each call builds a client from the
/// bucket settings and credentials it is given, since every backup may point
/// at a different store.
#[derive(Debug, Clone, Default)]
pub struct S3ObjectStorage;

impl S3ObjectStorage {
    pub fn new() -> Self {
        Self
    }

    fn client(storage: &S3StorageSpec, credentials: &StorageCredentials) -> Client {
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(storage.region.clone()))
            .credentials_provider(Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                None,
                None,
                "qdrant-operator",
            ));
        if let Some(endpoint) = &storage.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if storage.force_path_style {
            builder = builder.force_path_style(true);
        }
        Client::from_conf(builder.build())
    }
}

fn s3_error<E>(err: SdkError<E>) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    Error::S3(DisplayErrorContext(&err).to_string())
}

/// Token for the next listing page. A truncated page without a token ends
/// the listing instead of restarting it.
fn next_page(is_truncated: Option<bool>, token: Option<&str>) -> Option<String> {
    match (is_truncated, token) {
        (Some(true), Some(token)) if !token.is_empty() => Some(token.to_string()),
        _ => None,
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    async fn upload_file(
        &self,
        storage: &S3StorageSpec,
        credentials: &StorageCredentials,
        local_path: &Path,
        key: &str,
    ) -> Result<String> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| Error::S3(format!("reading {}: {e}", local_path.display())))?;
        Self::client(storage, credentials)
            .put_object()
            .bucket(&storage.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(s3_error)?;
        debug!(bucket = %storage.bucket, key = %key, "object uploaded");
        Ok(storage.uri(key))
    }

    async fn download_file(
        &self,
        storage: &S3StorageSpec,
        credentials: &StorageCredentials,
        key: &str,
        local_path: &Path,
    ) -> Result<PathBuf> {
        let output = Self::client(storage, credentials)
            .get_object()
            .bucket(&storage.bucket)
            .key(key)
            .send()
            .await
            .map_err(s3_error)?;

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::File::create(local_path).await?;
        let mut body = output.body;
        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| Error::S3(format!("reading {key}: {e}")))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        debug!(bucket = %storage.bucket, key = %key, path = %local_path.display(), "object downloaded");
        Ok(local_path.to_path_buf())
    }

    async fn delete_file(
        &self,
        storage: &S3StorageSpec,
        credentials: &StorageCredentials,
        key: &str,
    ) -> Result<()> {
        Self::client(storage, credentials)
            .delete_object()
            .bucket(&storage.bucket)
            .key(key)
            .send()
            .await
            .map_err(s3_error)?;
        Ok(())
    }

    async fn list_files(
        &self,
        storage: &S3StorageSpec,
        credentials: &StorageCredentials,
        prefix: &str,
    ) -> Result<Vec<String>> {
        let client = Self::client(storage, credentials);
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;
        loop {
            let mut request = client
                .list_objects_v2()
                .bucket(&storage.bucket)
                .prefix(prefix);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }
            let output = request.send().await.map_err(s3_error)?;
            keys.extend(output.contents().iter().filter_map(|o| o.key().map(String::from)));

            continuation_token = next_page(output.is_truncated(), output.next_continuation_token());
            if continuation_token.is_none() {
                break;
            }
        }
        Ok(keys)
    }

    async fn file_exists(
        &self,
        storage: &S3StorageSpec,
        credentials: &StorageCredentials,
        key: &str,
    ) -> Result<bool> {
        match Self::client(storage, credentials)
            .head_object()
            .bucket(&storage.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(ref err)) if err.raw().status().as_u16() == 404 => {
                Ok(false)
            }
            Err(e) => Err(s3_error(e)),
        }
    }
}
