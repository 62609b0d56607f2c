use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use bucket_glue::config::StorageSettings;

/// Bucket Glue - object storage uploads, deletes and signed URLs
#[derive(Parser, Debug)]
#[command(name = "bucket-glue")]
#[command(version)]
#[command(about = "Upload, delete and sign objects in an S3-compatible bucket", long_about = None)]
pub struct Cli {
    /// Bucket name (overrides configuration)
    #[arg(long, global = true)]
    pub bucket: Option<String>,

    /// Bucket region (overrides configuration)
    #[arg(long, global = true)]
    pub region: Option<String>,

    /// Access key ID (overrides configuration)
    #[arg(long, global = true)]
    pub access_key_id: Option<String>,

    /// Secret access key (overrides configuration)
    #[arg(long, global = true)]
    pub secret_access_key: Option<String>,

    /// Custom S3-compatible endpoint, e.g. http://localhost:9000
    #[arg(long, global = true)]
    pub endpoint_url: Option<String>,

    /// Use path-style addressing (required by MinIO and R2)
    #[arg(long, global = true)]
    pub force_path_style: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resize an image onto the upload canvas and store it
    UploadImage {
        file: PathBuf,
        #[arg(short, long)]
        key: String,
        /// Defaults to the type implied by the file extension or contents
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Store a file byte-for-byte
    UploadRaw {
        file: PathBuf,
        #[arg(short, long)]
        key: String,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Delete an object
    Delete { key: String },
    /// Print a time-limited download URL
    Sign {
        key: String,
        /// Validity in seconds (defaults to signing.default_expiry_secs)
        #[arg(long)]
        expires_in: Option<u64>,
    },
}

impl Cli {
    /// Apply connection flags on top of loaded settings
    pub fn apply_overrides(&self, storage: &mut StorageSettings) {
        if let Some(ref bucket) = self.bucket {
            storage.bucket = bucket.clone();
        }
        if let Some(ref region) = self.region {
            storage.region = region.clone();
        }
        if let Some(ref access_key_id) = self.access_key_id {
            storage.access_key_id = access_key_id.clone();
        }
        if let Some(ref secret_access_key) = self.secret_access_key {
            storage.secret_access_key = secret_access_key.clone();
        }
        if let Some(ref endpoint_url) = self.endpoint_url {
            storage.endpoint_url = Some(endpoint_url.clone());
        }
        if self.force_path_style {
            storage.force_path_style = true;
        }
    }
}

/// Image MIME type from the file extension, falling back to sniffing the bytes
pub fn image_content_type(path: &Path, data: &[u8]) -> Option<&'static str> {
    image::ImageFormat::from_path(path)
        .or_else(|_| image::guess_format(data))
        .ok()
        .map(|format| format.to_mime_type())
}
