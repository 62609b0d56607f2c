//! S3-compatible SDK binding
//!
//! Builds an `aws_sdk_s3::Client` from static credentials and implements the
//! `ObjectApi` primitives on top of it. Works against AWS S3 directly or any
//! S3-compatible endpoint (R2, MinIO) via `endpoint_url`.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::{
    Client as S3Client,
    config::{BehaviorVersion, Builder, Credentials, Region},
    presigning::PresigningConfig,
    primitives::ByteStream,
};
use tracing::debug;

use crate::config::StorageSettings;
use super::traits::{BoxError, DeleteObjectReply, ObjectApi, PutObjectReply, PutObjectRequest};

/// Build an SDK client; no network traffic happens here
pub(crate) fn build_client(settings: &StorageSettings) -> S3Client {
    let credentials = Credentials::new(
        &settings.access_key_id,
        &settings.secret_access_key,
        None, // session token
        None, // expiry
        "bucket-glue-static-credentials",
    );

    let mut builder = Builder::new()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new(settings.region.clone()))
        .credentials_provider(credentials)
        .force_path_style(settings.force_path_style);

    if let Some(ref endpoint) = settings.endpoint_url {
        debug!("Creating S3 client with endpoint: {}", endpoint);
        builder = builder.endpoint_url(endpoint);
    }

    S3Client::from_conf(builder.build())
}

#[async_trait]
impl ObjectApi for S3Client {
    async fn put(&self, request: PutObjectRequest) -> Result<PutObjectReply, BoxError> {
        let output = self
            .put_object()
            .bucket(request.bucket)
            .key(request.key)
            .body(ByteStream::from(request.body))
            .set_content_type(request.content_type)
            .send()
            .await?;

        Ok(PutObjectReply {
            etag: output.e_tag().map(String::from),
            version_id: output.version_id().map(String::from),
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<DeleteObjectReply, BoxError> {
        let output = self
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await?;

        Ok(DeleteObjectReply {
            delete_marker: output.delete_marker(),
            version_id: output.version_id().map(String::from),
        })
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, BoxError> {
        let presigning = PresigningConfig::expires_in(expires_in)?;

        let presigned = self
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await?;

        Ok(presigned.uri().to_string())
    }
}
