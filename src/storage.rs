use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::error::ServiceError;

/// Prefix under which every email attachment is stored.
pub const ATTACHMENT_PREFIX: &str = "attachments";

/// Lifetime of an upload URL.
pub const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid presigning config: {0}")]
    Config(String),

    #[error("presign request failed: {0}")]
    Presign(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        tracing::error!("object storage failure: {:?}", err);
        ServiceError::Storage("Failed to generate upload URL".to_string())
    }
}

/// StorageService
///
/// Object storage used for email attachments. Clients upload directly to the bucket through a
/// presigned URL and then reference the returned key in an email's `attachments`.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates the bucket if missing. Only called at local startup (MinIO).
    async fn ensure_bucket_exists(&self);

    /// Signs a PUT for `key`, pinned to `content_type`.
    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError>;
}

/// S3StorageClient
///
/// AWS SDK client. Path-style addressing keeps it compatible with MinIO and other
/// S3-compatible gateways.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    bucket_name: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket on an existing bucket fails harmlessly.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!("create_bucket: {:?}", e);
        }
    }

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(UPLOAD_URL_TTL)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(presigned_req.uri().to_string())
    }
}

/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a client-supplied name cannot escape its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Key prefix holding every attachment uploaded for `owner`, trailing slash included.
pub fn owner_prefix(owner: Uuid) -> String {
    format!("{}/{}/", ATTACHMENT_PREFIX, owner)
}

/// attachment_key
///
/// Object key for a new upload: `attachments/<owner>/<random>-<filename>`. The random part
/// keeps two uploads of the same file name from overwriting each other.
pub fn attachment_key(owner: Uuid, filename: &str) -> String {
    let name = sanitize_key(filename).replace('/', "_");
    format!("{}{}-{}", owner_prefix(owner), Uuid::new_v4(), name)
}

/// MockStorageService
///
/// Offline `StorageService` for tests. Returns deterministic URLs.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_bucket_exists(&self) {}

    async fn get_presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Presign("simulated failure".to_string()));
        }
        Ok(format!(
            "http://localhost:9000/mock-bucket/{}?signature=fake",
            sanitize_key(key)
        ))
    }
}

/// StorageState
///
/// Shared handle stored in `AppState`.
pub type StorageState = Arc<dyn StorageService>;
