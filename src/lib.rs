//! Bucket Glue
//!
//! Thin object storage client: contain-fit image uploads, raw uploads,
//! deletes and time-limited signed download URLs against any S3-compatible
//! store.
//!
//! ```no_run
//! use bucket_glue::config::StorageSettings;
//! use bucket_glue::storage::StorageClient;
//!
//! # async fn run() -> Result<(), bucket_glue::storage::StorageError> {
//! let settings = StorageSettings::new("media", "eu-west-1", "AKID", "secret");
//! let client = StorageClient::new(&settings, tracing::info_span!("media-storage"))?;
//!
//! client.upload_raw(bytes::Bytes::from_static(b"hello"), "notes/hello.txt").await?;
//! let signed = client.signed_download_url("notes/hello.txt", None).await?;
//! println!("{}", signed.url);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod imaging;
pub mod storage;
