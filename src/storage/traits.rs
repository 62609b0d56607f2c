//! Storage trait definitions
//!
//! `ObjectStore` is the capability callers program against: image upload, raw
//! upload, delete and signed download URLs. Alternate backends implement it to
//! be swapped in behind `Arc<dyn ObjectStore>`.
//!
//! `ObjectApi` is the narrower seam underneath `StorageClient`: the three raw
//! primitives of an S3-compatible SDK. It is implemented for `aws_sdk_s3::Client`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::imaging::ImagingError;

/// Boxed error from the underlying SDK, passed through untouched
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// ============================================================================
// Error Types
// ============================================================================

/// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid image: {0}")]
    ImageDecode(#[from] ImagingError),

    #[error("{operation} failed for key {key}: {source}")]
    Remote {
        operation: Operation,
        key: String,
        #[source]
        source: BoxError,
    },
}

impl StorageError {
    /// The SDK error behind a remote failure
    pub fn remote_source(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            StorageError::Remote { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Remote operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    PutObject,
    DeleteObject,
    PresignGetObject,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::PutObject => "put_object",
            Operation::DeleteObject => "delete_object",
            Operation::PresignGetObject => "presign_get_object",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Result Descriptors
// ============================================================================

/// Result of an upload operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PutObjectOutcome {
    pub key: String,
    /// Size of the body actually sent, in bytes
    pub size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

/// Result of a delete operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteObjectOutcome {
    pub key: String,
    pub delete_marker: Option<bool>,
    pub version_id: Option<String>,
}

/// Time-limited download URL
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignedUrl {
    pub url: String,
    pub key: String,
    /// Validity window in seconds
    pub expires_in: u64,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// SDK Seam
// ============================================================================

/// Parameters of a single put-object call
#[derive(Debug, Clone, PartialEq)]
pub struct PutObjectRequest {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    pub content_type: Option<String>,
}

/// Fields we keep from a put-object response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PutObjectReply {
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

/// Fields we keep from a delete-object response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteObjectReply {
    pub delete_marker: Option<bool>,
    pub version_id: Option<String>,
}

/// Raw object-storage primitives
#[async_trait]
pub trait ObjectApi: Send + Sync {
    async fn put(&self, request: PutObjectRequest) -> Result<PutObjectReply, BoxError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<DeleteObjectReply, BoxError>;

    /// Sign a GET for `key` locally; must not touch the network
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, BoxError>;
}

// ============================================================================
// Capability Trait
// ============================================================================

/// Object storage capability
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Contain-fit `content` onto the image canvas and upload it under `key`
    async fn upload_image(
        &self,
        content: Bytes,
        key: &str,
        content_type: &str,
    ) -> StorageResult<PutObjectOutcome>;

    /// Upload `content` byte-for-byte under `key`
    async fn upload_raw(&self, content: Bytes, key: &str) -> StorageResult<PutObjectOutcome>;

    async fn delete_object(&self, key: &str) -> StorageResult<DeleteObjectOutcome>;

    /// Signed GET URL for `key`; `None` uses the default expiry
    async fn signed_download_url(
        &self,
        key: &str,
        expires_in: Option<Duration>,
    ) -> StorageResult<SignedUrl>;
}
