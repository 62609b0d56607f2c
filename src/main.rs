//! Bucket Glue
//!
//! Command-line front end for the storage client: image uploads, raw uploads,
//! deletes and signed download URLs. Results are printed as JSON on stdout,
//! logs go to stderr.

use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use clap::Parser;
use serde::Serialize;
use tracing::info;

mod args;

use crate::args::{image_content_type, Cli, Command};
use bucket_glue::config::Settings;
use bucket_glue::storage::StorageClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bucket_glue=info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load().context("Failed to load configuration")?;
    cli.apply_overrides(&mut settings.storage);

    info!(
        "Starting bucket-glue v{} against bucket {:?}",
        env!("CARGO_PKG_VERSION"),
        settings.storage.bucket
    );

    let span = tracing::info_span!("storage", bucket = %settings.storage.bucket);
    let client = StorageClient::new(&settings.storage, span)?
        .with_image_settings(settings.image.clone())?
        .with_default_expiry(Duration::from_secs(settings.signing.default_expiry_secs));

    match cli.command {
        Command::UploadImage { file, key, content_type } => {
            let data = read_file(&file).await?;
            let content_type = match content_type {
                Some(ct) => ct,
                None => image_content_type(&file, &data)
                    .context("Cannot infer image content type, pass --content-type")?
                    .to_string(),
            };
            print_json(&client.upload_image(data, &key, &content_type).await?)
        }
        Command::UploadRaw { file, key, content_type } => {
            let data = read_file(&file).await?;
            let outcome = match content_type {
                Some(ct) => client.upload_raw_with_type(data, &key, &ct).await?,
                None => client.upload_raw(data, &key).await?,
            };
            print_json(&outcome)
        }
        Command::Delete { key } => print_json(&client.delete_object(&key).await?),
        Command::Sign { key, expires_in } => {
            let expires_in = expires_in.map(Duration::from_secs);
            print_json(&client.signed_download_url(&key, expires_in).await?)
        }
    }
}

async fn read_file(path: &std::path::Path) -> anyhow::Result<Bytes> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Bytes::from(data))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
