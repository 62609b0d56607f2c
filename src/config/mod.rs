//! Configuration module for the storage client

use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};
use std::fmt;
use std::path::PathBuf;

/// Main application settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub image: ImageSettings,
    #[serde(default)]
    pub signing: SigningSettings,
}

/// Object storage connection settings
///
/// `bucket`, `region`, `access_key_id` and `secret_access_key` are all required;
/// they default to empty here so that a missing value is reported by the client
/// constructor rather than as a deserialization failure.
#[derive(Clone, Default, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    /// Custom endpoint for S3-compatible stores (R2, MinIO, ...)
    #[serde(default)]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

impl StorageSettings {
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            endpoint_url: None,
            force_path_style: false,
        }
    }

    /// Route requests to a non-AWS endpoint
    pub fn with_endpoint(
        mut self,
        endpoint_url: impl Into<String>,
        force_path_style: bool,
    ) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self.force_path_style = force_path_style;
        self
    }
}

impl fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSettings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("endpoint_url", &self.endpoint_url)
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

/// Canvas used by image uploads
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub width: u32,
    pub height: u32,
    /// Letterbox fill, RGBA
    pub background: [u8; 4],
    pub jpeg_quality: u8,
}

impl Default for ImageSettings {
    fn default() -> Self {
        ImageSettings {
            width: 1280,
            height: 720,
            background: [0, 0, 0, 255],
            jpeg_quality: 85,
        }
    }
}

impl ImageSettings {
    /// The canvas must have a non-zero area
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!(
                "image canvas must be non-empty, got {}x{}",
                self.width, self.height
            ));
        }
        Ok(())
    }
}

/// Signed URL settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SigningSettings {
    pub default_expiry_secs: u64,
}

impl Default for SigningSettings {
    fn default() -> Self {
        SigningSettings {
            default_expiry_secs: 60,
        }
    }
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with BUCKET_GLUE_)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // BUCKET_GLUE_STORAGE__BUCKET, BUCKET_GLUE_IMAGE__WIDTH, etc.
            .add_source(
                Environment::with_prefix("BUCKET_GLUE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.image.validate().map_err(ConfigError::Message)?;

        Ok(settings)
    }
}
