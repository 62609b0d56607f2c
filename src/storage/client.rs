//! Storage client
//!
//! Translates the four high-level intents (image upload, raw upload, delete,
//! signed download URL) into single calls against an `ObjectApi`. There is no
//! retry, caching or fallback: remote failures are logged inside the client's
//! span and returned to the caller unchanged.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::{debug, error, info, info_span, instrument, warn, Span};

use crate::config::{ImageSettings, StorageSettings};
use crate::imaging;
use super::s3::build_client;
use super::traits::{
    DeleteObjectOutcome, ObjectApi, ObjectStore, Operation, PutObjectOutcome, PutObjectRequest,
    SignedUrl, StorageError, StorageResult,
};

/// Validity window of signed download URLs unless the caller asks otherwise
pub const DEFAULT_SIGNED_URL_EXPIRY: Duration = Duration::from_secs(60);

/// Object storage client bound to a single bucket
pub struct StorageClient<A = S3Client> {
    api: Arc<A>,
    bucket: String,
    image: ImageSettings,
    default_expiry: Duration,
    span: Span,
}

impl<A> Clone for StorageClient<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            bucket: self.bucket.clone(),
            image: self.image.clone(),
            default_expiry: self.default_expiry,
            span: self.span.clone(),
        }
    }
}

impl<A> fmt::Debug for StorageClient<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageClient")
            .field("bucket", &self.bucket)
            .field("image", &self.image)
            .field("default_expiry", &self.default_expiry)
            .finish_non_exhaustive()
    }
}

impl StorageClient<S3Client> {
    /// Create a client backed by the AWS SDK
    ///
    /// Every log event the client emits is recorded under `span`.
    pub fn new(settings: &StorageSettings, span: Span) -> StorageResult<Self> {
        validate(settings)?;
        let client = build_client(settings);

        info!(
            parent: &span,
            bucket = %settings.bucket,
            region = %settings.region,
            endpoint = settings.endpoint_url.as_deref().unwrap_or("aws"),
            "Storage client initialized"
        );

        Ok(Self::assemble(settings, client, span))
    }

    /// Create a client logging under a default `storage` span
    pub fn from_settings(settings: &StorageSettings) -> StorageResult<Self> {
        let span = info_span!("storage", bucket = %settings.bucket);
        Self::new(settings, span)
    }
}

impl<A: ObjectApi> StorageClient<A> {
    /// Create a client over an arbitrary `ObjectApi` implementation
    pub fn with_api(settings: &StorageSettings, api: A, span: Span) -> StorageResult<Self> {
        validate(settings)?;
        Ok(Self::assemble(settings, api, span))
    }

    fn assemble(settings: &StorageSettings, api: A, span: Span) -> Self {
        Self {
            api: Arc::new(api),
            bucket: settings.bucket.clone(),
            image: ImageSettings::default(),
            default_expiry: DEFAULT_SIGNED_URL_EXPIRY,
            span,
        }
    }

    /// Override the image canvas; a zero width or height is rejected
    pub fn with_image_settings(mut self, image: ImageSettings) -> StorageResult<Self> {
        image.validate().map_err(StorageError::Configuration)?;
        self.image = image;
        Ok(self)
    }

    /// Override the expiry used when `signed_download_url` gets `None`
    pub fn with_default_expiry(mut self, expiry: Duration) -> Self {
        self.default_expiry = expiry;
        self
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn image_settings(&self) -> &ImageSettings {
        &self.image
    }

    /// Contain-fit an image onto the canvas and upload it
    #[instrument(parent = &self.span, skip(self, content), fields(size = content.len()))]
    pub async fn upload_image(
        &self,
        content: Bytes,
        key: &str,
        content_type: &str,
    ) -> StorageResult<PutObjectOutcome> {
        let processed = imaging::process_image(content, self.image.clone())
            .await
            .map_err(|e| {
                warn!(error = %e, "Rejected image upload");
                StorageError::from(e)
            })?;

        debug!(
            width = processed.width,
            height = processed.height,
            content_width = processed.content_width,
            content_height = processed.content_height,
            format = ?processed.format,
            bytes = processed.bytes.len(),
            "Image prepared for upload"
        );

        self.put(processed.bytes, key, Some(content_type.to_string())).await
    }

    /// Upload bytes exactly as given, with no content type
    #[instrument(parent = &self.span, skip(self, content), fields(size = content.len()))]
    pub async fn upload_raw(&self, content: Bytes, key: &str) -> StorageResult<PutObjectOutcome> {
        self.put(content, key, None).await
    }

    /// Upload bytes exactly as given
    #[instrument(parent = &self.span, skip(self, content), fields(size = content.len()))]
    pub async fn upload_raw_with_type(
        &self,
        content: Bytes,
        key: &str,
        content_type: &str,
    ) -> StorageResult<PutObjectOutcome> {
        self.put(content, key, Some(content_type.to_string())).await
    }

    /// Delete an object; a missing key is left to the store's semantics
    #[instrument(parent = &self.span, skip(self))]
    pub async fn delete_object(&self, key: &str) -> StorageResult<DeleteObjectOutcome> {
        debug!("Deleting object");

        let reply = self
            .api
            .delete(&self.bucket, key)
            .await
            .map_err(|source| {
                error!(error = %source, details = ?source, "Delete failed");
                StorageError::Remote {
                    operation: Operation::DeleteObject,
                    key: key.to_string(),
                    source,
                }
            })?;

        info!("Deleted object");

        Ok(DeleteObjectOutcome {
            key: key.to_string(),
            delete_marker: reply.delete_marker,
            version_id: reply.version_id,
        })
    }

    /// Presign a GET for `key`, valid for `expires_in` (default 60 seconds)
    #[instrument(parent = &self.span, skip(self))]
    pub async fn signed_download_url(
        &self,
        key: &str,
        expires_in: Option<Duration>,
    ) -> StorageResult<SignedUrl> {
        let expires_in = expires_in.unwrap_or(self.default_expiry);
        let issued_at = chrono::Utc::now();

        let url = self
            .api
            .presign_get(&self.bucket, key, expires_in)
            .await
            .map_err(|source| {
                error!(error = %source, details = ?source, "Signing download URL failed");
                StorageError::Remote {
                    operation: Operation::PresignGetObject,
                    key: key.to_string(),
                    source,
                }
            })?;

        debug!(expires_in = expires_in.as_secs(), "Signed download URL");

        let expires_at = chrono::Duration::from_std(expires_in)
            .ok()
            .and_then(|d| issued_at.checked_add_signed(d))
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);

        Ok(SignedUrl {
            url,
            key: key.to_string(),
            expires_in: expires_in.as_secs(),
            expires_at,
        })
    }

    async fn put(
        &self,
        body: Bytes,
        key: &str,
        content_type: Option<String>,
    ) -> StorageResult<PutObjectOutcome> {
        let size = body.len() as u64;
        debug!("Uploading {} bytes to {}/{}", size, self.bucket, key);

        let request = PutObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            body,
            content_type: content_type.clone(),
        };

        let reply = self.api.put(request).await.map_err(|source| {
            error!(error = %source, details = ?source, "Upload failed");
            StorageError::Remote {
                operation: Operation::PutObject,
                key: key.to_string(),
                source,
            }
        })?;

        info!("Uploaded {} ({} bytes)", key, size);

        Ok(PutObjectOutcome {
            key: key.to_string(),
            size,
            content_type,
            etag: reply.etag,
            version_id: reply.version_id,
        })
    }
}

#[async_trait]
impl<A: ObjectApi> ObjectStore for StorageClient<A> {
    async fn upload_image(
        &self,
        content: Bytes,
        key: &str,
        content_type: &str,
    ) -> StorageResult<PutObjectOutcome> {
        StorageClient::upload_image(self, content, key, content_type).await
    }

    async fn upload_raw(&self, content: Bytes, key: &str) -> StorageResult<PutObjectOutcome> {
        StorageClient::upload_raw(self, content, key).await
    }

    async fn delete_object(&self, key: &str) -> StorageResult<DeleteObjectOutcome> {
        StorageClient::delete_object(self, key).await
    }

    async fn signed_download_url(
        &self,
        key: &str,
        expires_in: Option<Duration>,
    ) -> StorageResult<SignedUrl> {
        StorageClient::signed_download_url(self, key, expires_in).await
    }
}

/// All four connection parameters are required
fn validate(settings: &StorageSettings) -> StorageResult<()> {
    let required = [
        ("bucket", &settings.bucket),
        ("region", &settings.region),
        ("access_key_id", &settings.access_key_id),
        ("secret_access_key", &settings.secret_access_key),
    ];

    let missing: Vec<&str> = required
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

    if !missing.is_empty() {
        return Err(StorageError::Configuration(format!(
            "missing required parameter(s): {}",
            missing.join(", ")
        )));
    }

    if let Some(ref endpoint) = settings.endpoint_url {
        url::Url::parse(endpoint).map_err(|e| {
            StorageError::Configuration(format!("invalid endpoint_url {:?}: {}", endpoint, e))
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::traits::{BoxError, DeleteObjectReply, PutObjectReply};
    use image::{DynamicImage, GenericImageView, ImageOutputFormat, Rgba, RgbaImage};
    use parking_lot::Mutex;
    use std::io::Cursor;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Debug, Clone, PartialEq)]
    struct RemoteFault(&'static str);

    impl std::fmt::Display for RemoteFault {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "remote fault: {}", self.0)
        }
    }

    impl std::error::Error for RemoteFault {}

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Put(PutObjectRequest),
        Delete { bucket: String, key: String },
        Presign { bucket: String, key: String, expires_in: Duration },
    }

    /// Records every primitive call; fails all of them when `fault` is set
    #[derive(Default)]
    struct RecordingApi {
        calls: Mutex<Vec<Call>>,
        fault: Option<RemoteFault>,
    }

    impl RecordingApi {
        fn failing(message: &'static str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fault: Some(RemoteFault(message)),
            }
        }

        fn check(&self) -> Result<(), BoxError> {
            match self.fault {
                Some(ref fault) => Err(Box::new(fault.clone())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl ObjectApi for RecordingApi {
        async fn put(&self, request: PutObjectRequest) -> Result<PutObjectReply, BoxError> {
            self.calls.lock().push(Call::Put(request));
            self.check()?;
            Ok(PutObjectReply {
                etag: Some("\"etag-1\"".to_string()),
                version_id: None,
            })
        }

        async fn delete(&self, bucket: &str, key: &str) -> Result<DeleteObjectReply, BoxError> {
            self.calls.lock().push(Call::Delete {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
            self.check()?;
            Ok(DeleteObjectReply {
                delete_marker: Some(true),
                version_id: Some("v2".to_string()),
            })
        }

        async fn presign_get(
            &self,
            bucket: &str,
            key: &str,
            expires_in: Duration,
        ) -> Result<String, BoxError> {
            self.calls.lock().push(Call::Presign {
                bucket: bucket.to_string(),
                key: key.to_string(),
                expires_in,
            });
            self.check()?;
            Ok(format!("https://{}.example/{}?X-Amz-Expires={}", bucket, key, expires_in.as_secs()))
        }
    }

    fn settings() -> StorageSettings {
        StorageSettings::new("b", "r", "k", "s")
    }

    fn client(api: RecordingApi) -> StorageClient<RecordingApi> {
        StorageClient::with_api(&settings(), api, Span::none()).unwrap()
    }

    fn calls(client: &StorageClient<RecordingApi>) -> Vec<Call> {
        client.api.calls.lock().clone()
    }

    fn png(width: u32, height: u32) -> Bytes {
        let pixels = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
        let image = DynamicImage::ImageRgba8(pixels);
        let mut cursor = Cursor::new(Vec::new());
        image.write_to(&mut cursor, ImageOutputFormat::Png).unwrap();
        Bytes::from(cursor.into_inner())
    }

    fn assert_remote_fault(err: &StorageError, operation: Operation, message: &'static str) {
        match err {
            StorageError::Remote { operation: op, source, .. } => {
                assert_eq!(*op, operation);
                let fault = source.downcast_ref::<RemoteFault>().expect("SDK error preserved");
                assert_eq!(fault, &RemoteFault(message));
            }
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[test]
    fn test_every_missing_parameter_combination_is_rejected() {
        for mask in 1u8..16 {
            let pick = |bit: u8, value: &str| {
                if mask & (1 << bit) != 0 { String::new() } else { value.to_string() }
            };
            let settings =
                StorageSettings::new(pick(0, "b"), pick(1, "r"), pick(2, "k"), pick(3, "s"));

            let err = assert_err!(StorageClient::with_api(
                &settings,
                RecordingApi::default(),
                Span::none()
            ));
            assert!(matches!(err, StorageError::Configuration(_)), "mask {:04b}", mask);

            let err = assert_err!(StorageClient::new(&settings, Span::none()));
            assert!(matches!(err, StorageError::Configuration(_)), "mask {:04b}", mask);
        }
    }

    #[test]
    fn test_configuration_error_names_missing_fields() {
        let settings = StorageSettings::new("b", "  ", "k", "");
        match StorageClient::with_api(&settings, RecordingApi::default(), Span::none()) {
            Err(StorageError::Configuration(message)) => {
                assert!(message.contains("region"), "{}", message);
                assert!(message.contains("secret_access_key"), "{}", message);
                assert!(!message.contains("bucket"), "{}", message);
            }
            _ => panic!("expected configuration error"),
        }
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let settings = settings().with_endpoint("not a url", true);
        let err = assert_err!(StorageClient::new(&settings, Span::none()));
        assert!(matches!(err, StorageError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_sdk_client_constructs_without_network() {
        let client = assert_ok!(StorageClient::from_settings(&settings()));
        assert_eq!(client.bucket(), "b");
    }

    #[tokio::test]
    async fn test_upload_raw_issues_exactly_one_put() {
        let client = client(RecordingApi::default());

        let outcome = client.upload_raw(Bytes::from_static(&[1, 2, 3]), "f.bin").await.unwrap();

        assert_eq!(
            calls(&client),
            vec![Call::Put(PutObjectRequest {
                bucket: "b".to_string(),
                key: "f.bin".to_string(),
                body: Bytes::from_static(&[1, 2, 3]),
                content_type: None,
            })]
        );
        assert_eq!(outcome.key, "f.bin");
        assert_eq!(outcome.size, 3);
        assert_eq!(outcome.etag.as_deref(), Some("\"etag-1\""));
    }

    #[tokio::test]
    async fn test_upload_raw_never_transforms_content() {
        let client = client(RecordingApi::default());
        // Looks like a PNG header but must go out untouched
        let body: Vec<u8> = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]
            .into_iter()
            .chain((0..=255u8).cycle().take(4096))
            .collect();

        client.upload_raw_with_type(Bytes::from(body.clone()), "blob", "application/octet-stream")
            .await
            .unwrap();

        match calls(&client).as_slice() {
            [Call::Put(request)] => {
                assert_eq!(request.body.as_ref(), body.as_slice());
                assert_eq!(request.content_type.as_deref(), Some("application/octet-stream"));
            }
            other => panic!("unexpected calls {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_image_sends_fitted_canvas() {
        let client = client(RecordingApi::default());

        let outcome = client
            .upload_image(png(300, 600), "img/tall.png", "image/png")
            .await
            .unwrap();

        let recorded = calls(&client);
        assert_eq!(recorded.len(), 1);
        let Call::Put(ref request) = recorded[0] else {
            panic!("expected put, got {:?}", recorded[0]);
        };
        assert_eq!(request.bucket, "b");
        assert_eq!(request.key, "img/tall.png");
        assert_eq!(request.content_type.as_deref(), Some("image/png"));
        assert_eq!(outcome.size, request.body.len() as u64);

        let uploaded = image::load_from_memory(&request.body).unwrap();
        assert_eq!(uploaded.dimensions(), (1280, 720));
        // 360x720 content centered, bars left and right
        assert_eq!(uploaded.get_pixel(100, 360).0, [0, 0, 0, 255]);
        let center = uploaded.get_pixel(640, 360).0;
        assert!((198..=202).contains(&center[0]), "{:?}", center);
    }

    #[tokio::test]
    async fn test_upload_image_uses_configured_canvas() {
        let client = client(RecordingApi::default())
            .with_image_settings(ImageSettings {
                width: 200,
                height: 200,
                ..ImageSettings::default()
            })
            .unwrap();

        client.upload_image(png(400, 100), "wide.png", "image/png").await.unwrap();

        let recorded = calls(&client);
        let Call::Put(ref request) = recorded[0] else {
            panic!("expected put");
        };
        assert_eq!(image::load_from_memory(&request.body).unwrap().dimensions(), (200, 200));
    }

    #[test]
    fn test_zero_canvas_is_a_configuration_error() {
        for (width, height) in [(0, 720), (1280, 0)] {
            let image = ImageSettings { width, height, ..ImageSettings::default() };
            let err = assert_err!(client(RecordingApi::default()).with_image_settings(image));
            assert!(matches!(err, StorageError::Configuration(_)), "{}x{}", width, height);
        }
    }

    #[tokio::test]
    async fn test_upload_image_rejects_non_image_without_remote_call() {
        let client = client(RecordingApi::default());

        let err = client
            .upload_image(Bytes::from_static(b"definitely not an image"), "x.png", "image/png")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::ImageDecode(_)));
        assert!(calls(&client).is_empty());
    }

    #[tokio::test]
    async fn test_upload_failures_propagate_unchanged() {
        let client = client(RecordingApi::failing("NoSuchBucket"));

        let err = client.upload_raw(Bytes::from_static(b"abc"), "a").await.unwrap_err();
        assert_remote_fault(&err, Operation::PutObject, "NoSuchBucket");

        let err = client.upload_image(png(10, 10), "b.png", "image/png").await.unwrap_err();
        assert_remote_fault(&err, Operation::PutObject, "NoSuchBucket");
    }

    #[tokio::test]
    async fn test_delete_object() {
        let client = client(RecordingApi::default());

        let outcome = client.delete_object("old/file.txt").await.unwrap();

        assert_eq!(
            calls(&client),
            vec![Call::Delete { bucket: "b".to_string(), key: "old/file.txt".to_string() }]
        );
        assert_eq!(outcome.delete_marker, Some(true));
        assert_eq!(outcome.version_id.as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_delete_failure_propagates_unchanged() {
        let client = client(RecordingApi::failing("AccessDenied"));
        let err = client.delete_object("k").await.unwrap_err();
        assert_remote_fault(&err, Operation::DeleteObject, "AccessDenied");
    }

    #[tokio::test]
    async fn test_signed_url_defaults_to_sixty_seconds() {
        let client = client(RecordingApi::default());
        let before = chrono::Utc::now();

        let signed = client.signed_download_url("doc.pdf", None).await.unwrap();

        assert_eq!(
            calls(&client),
            vec![Call::Presign {
                bucket: "b".to_string(),
                key: "doc.pdf".to_string(),
                expires_in: Duration::from_secs(60),
            }]
        );
        assert_eq!(signed.expires_in, 60);
        assert_eq!(signed.url, "https://b.example/doc.pdf?X-Amz-Expires=60");
        let window = signed.expires_at - before;
        assert!(window >= chrono::Duration::seconds(59) && window <= chrono::Duration::seconds(61));
    }

    #[tokio::test]
    async fn test_signed_url_explicit_and_configured_expiry() {
        let client = client(RecordingApi::default()).with_default_expiry(Duration::from_secs(300));

        let signed = client.signed_download_url("a", None).await.unwrap();
        assert_eq!(signed.expires_in, 300);

        let signed = client.signed_download_url("a", Some(Duration::from_secs(5))).await.unwrap();
        assert_eq!(signed.expires_in, 5);
    }

    #[tokio::test]
    async fn test_signing_failure_propagates_unchanged() {
        let client = client(RecordingApi::failing("bad credentials"));
        let err = client.signed_download_url("a", None).await.unwrap_err();
        assert_remote_fault(&err, Operation::PresignGetObject, "bad credentials");
    }

    #[tokio::test]
    async fn test_sdk_signed_url_defaults_to_sixty_seconds() {
        let settings = StorageSettings::new("media-assets", "eu-west-1", "AKIDEXAMPLE", "secret");
        let client = StorageClient::new(&settings, Span::none()).unwrap();
        let signed = client.signed_download_url("f.bin", None).await.unwrap();
        assert!(signed.url.contains("X-Amz-Expires=60"), "{}", signed.url);
        assert!(signed.url.contains("f.bin"), "{}", signed.url);
    }

    #[tokio::test]
    async fn test_usable_as_trait_object() {
        let store: Arc<dyn ObjectStore> = Arc::new(client(RecordingApi::default()));

        store.upload_raw(Bytes::from_static(b"x"), "one").await.unwrap();
        store.delete_object("one").await.unwrap();
        let signed = store.signed_download_url("one", None).await.unwrap();

        assert_eq!(signed.expires_in, 60);
    }
}
