//! Object storage module
//!
//! Provides an S3-compatible storage client for image uploads, raw uploads,
//! deletes and signed download URLs. Any S3-compatible store works, so we use
//! the AWS SDK.

mod client;
mod s3;
mod traits;

pub use client::{StorageClient, DEFAULT_SIGNED_URL_EXPIRY};
pub use traits::{
    BoxError, DeleteObjectOutcome, DeleteObjectReply, ObjectApi, ObjectStore, Operation,
    PutObjectOutcome, PutObjectReply, PutObjectRequest, SignedUrl, StorageError, StorageResult,
};
