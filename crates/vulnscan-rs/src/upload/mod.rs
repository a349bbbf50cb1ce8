use std::path::Path;

use aws_sdk_s3::{error::DisplayErrorContext, primitives::ByteStream};
use tracing::info;

use crate::config::UploadConfig;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{0} has no file name")]
    InvalidPath(String),
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },
    #[error("object storage error: {0}")]
    Api(String),
}

/// Publishes finished reports. Returns the key the report was stored under.
#[async_trait::async_trait]
pub trait ReportUploader: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<String, UploadError>;
}

/// `<prefix>/<file name>`, without doubling a trailing slash on the prefix.
pub fn object_key(prefix: &str, path: &Path) -> Result<String, UploadError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| UploadError::InvalidPath(path.display().to_string()))?;
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        Ok(name.to_string())
    } else {
        Ok(format!("{prefix}/{name}"))
    }
}

pub struct S3Uploader {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
}

impl S3Uploader {
    /// Credentials and region come from the usual AWS environment; they are
    /// only checked when the first upload happens.
    pub async fn new(cfg: &UploadConfig) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest()).load().await;
        Self {
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket: cfg.bucket.clone(),
            prefix: cfg.prefix.clone(),
        }
    }
}

#[async_trait::async_trait]
impl ReportUploader for S3Uploader {
    async fn upload(&self, path: &Path) -> Result<String, UploadError> {
        let key = object_key(&self.prefix, path)?;
        let body = ByteStream::from_path(path).await.map_err(|e| UploadError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        info!(bucket = %self.bucket, key = %key, "uploading report");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type("application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::Api(DisplayErrorContext(e).to_string()))?;
        Ok(key)
    }
}
