use crate::keys::validate_key;
use crate::traits::{BlobStore, ObjectHandle, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::gcp::{GoogleCloudStorage, GoogleCloudStorageBuilder};
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
    Result as ObjectResult,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use uuid::Uuid;

/// Longest validity V4 query-string signatures accept (7 days), on both GCS and S3.
pub const MAX_V4_SIGNATURE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Token download endpoint served in front of GCS buckets.
pub const GCS_DOWNLOAD_ENDPOINT: &str = "https://firebasestorage.googleapis.com/v0";

/// Custom metadata key the download endpoint checks tokens against.
const DOWNLOAD_TOKEN_METADATA: &str = "firebaseStorageDownloadTokens";

/// The object key is a single path segment in token URLs, so `/` is encoded too.
const OBJECT_NAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

type StoreBuilder<S> = Box<dyn Fn(&str) -> StorageResult<S> + Send + Sync>;

/// How read URLs are granted for stored objects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadAccess {
    /// Query-string signatures. Requests for longer than `max_ttl` are refused.
    Signed { max_ttl: Duration },
    /// A random token is stored in the object metadata on upload and carried in the
    /// URL. The URL does not expire; it stays valid until the token is revoked.
    DownloadToken { endpoint: String },
}

/// Cloud object store backend
///
/// Wraps any `object_store` implementation that can also sign URLs. The event
/// names the bucket, so one store per bucket is built lazily and cached.
pub struct CloudBlobStore<S> {
    backend: StorageBackend,
    build: StoreBuilder<S>,
    stores: RwLock<HashMap<String, Arc<S>>>,
    read_access: ReadAccess,
}

impl CloudBlobStore<GoogleCloudStorage> {
    /// Google Cloud Storage. Credentials come from the service account file when
    /// given, otherwise from the environment (`GOOGLE_*` variables / metadata server).
    pub fn gcs(service_account_path: Option<String>) -> Self {
        Self::new(
            StorageBackend::Gcs,
            Box::new(move |bucket: &str| {
                let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket);
                if let Some(ref path) = service_account_path {
                    builder = builder.with_service_account_path(path.clone());
                }
                builder
                    .build()
                    .map_err(|e| StorageError::ConfigError(e.to_string()))
            }),
        )
    }
}

impl CloudBlobStore<AmazonS3> {
    /// S3 or an S3-compatible provider.
    ///
    /// # Arguments
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    pub fn s3(region: String, endpoint_url: Option<String>) -> Self {
        Self::new(
            StorageBackend::S3,
            Box::new(move |bucket: &str| {
                let mut builder = AmazonS3Builder::from_env()
                    .with_region(region.clone())
                    .with_bucket_name(bucket);

                if let Some(ref endpoint) = endpoint_url {
                    let allow_http = endpoint.starts_with("http://");
                    builder = builder
                        .with_endpoint(endpoint.clone())
                        .with_allow_http(allow_http);
                }

                builder
                    .build()
                    .map_err(|e| StorageError::ConfigError(e.to_string()))
            }),
        )
    }
}

impl<S> CloudBlobStore<S>
where
    S: ObjectStore + Signer,
{
    pub fn new(backend: StorageBackend, build: StoreBuilder<S>) -> Self {
        let read_access = match backend {
            StorageBackend::Gcs => ReadAccess::DownloadToken {
                endpoint: GCS_DOWNLOAD_ENDPOINT.to_string(),
            },
            _ => ReadAccess::Signed {
                max_ttl: MAX_V4_SIGNATURE_TTL,
            },
        };
        Self {
            backend,
            build,
            stores: RwLock::new(HashMap::new()),
            read_access,
        }
    }

    pub fn with_read_access(mut self, read_access: ReadAccess) -> Self {
        self.read_access = read_access;
        self
    }

    pub fn read_access(&self) -> &ReadAccess {
        &self.read_access
    }

    fn store_for(&self, bucket: &str) -> StorageResult<Arc<S>> {
        if bucket.is_empty() {
            return Err(StorageError::InvalidKey("Bucket name is empty".to_string()));
        }

        if let Some(store) = self
            .stores
            .read()
            .map_err(|_| StorageError::BackendError("Store cache poisoned".to_string()))?
            .get(bucket)
        {
            return Ok(Arc::clone(store));
        }

        let store = Arc::new((self.build)(bucket)?);
        let mut stores = self
            .stores
            .write()
            .map_err(|_| StorageError::BackendError("Store cache poisoned".to_string()))?;
        Ok(Arc::clone(
            stores.entry(bucket.to_string()).or_insert(store),
        ))
    }
}

#[async_trait]
impl<S> BlobStore for CloudBlobStore<S>
where
    S: ObjectStore + Signer,
{
    async fn download(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        validate_key(key)?;
        let store = self.store_for(bucket)?;
        let start = std::time::Instant::now();
        let location = Path::from(key.to_string());

        let result: ObjectResult<_> = store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => {
                StorageError::NotFound(format!("{}/{}", bucket, key))
            }
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::info!(
            backend = %self.backend,
            bucket = %bucket,
            key = %key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object download successful"
        );

        Ok(bytes.to_vec())
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<ObjectHandle> {
        validate_key(key)?;
        let store = self.store_for(bucket)?;
        let size = data.len() as u64;
        let location = Path::from(key.to_string());
        let start = std::time::Instant::now();

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let download_token = match self.read_access {
            ReadAccess::DownloadToken { .. } => {
                let token = Uuid::new_v4().to_string();
                attributes.insert(
                    Attribute::Metadata(DOWNLOAD_TOKEN_METADATA.into()),
                    token.clone().into(),
                );
                Some(token)
            }
            ReadAccess::Signed { .. } => None,
        };
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        let result: ObjectResult<_> = store
            .put_opts(&location, PutPayload::from(Bytes::from(data)), options)
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            backend = %self.backend,
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object upload successful"
        );

        Ok(ObjectHandle {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size_bytes: size,
            download_token,
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let store = self.store_for(bucket)?;
        let start = std::time::Instant::now();
        let location = Path::from(key.to_string());

        let result: ObjectResult<_> = store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            backend = %self.backend,
            bucket = %bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object delete successful"
        );

        Ok(())
    }

    async fn signed_read_url(
        &self,
        handle: &ObjectHandle,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let max_ttl = match &self.read_access {
            ReadAccess::DownloadToken { endpoint } => {
                let token = handle.download_token.as_deref().ok_or_else(|| {
                    StorageError::SigningFailed(format!(
                        "No download token recorded for {}/{}",
                        handle.bucket, handle.key
                    ))
                })?;
                return Ok(download_token_url(endpoint, handle, token));
            }
            ReadAccess::Signed { max_ttl } => *max_ttl,
        };

        if expires_in > max_ttl {
            tracing::error!(
                backend = %self.backend,
                bucket = %handle.bucket,
                key = %handle.key,
                requested_secs = expires_in.as_secs(),
                max_secs = max_ttl.as_secs(),
                "Requested URL expiry exceeds provider maximum"
            );
            return Err(StorageError::ExpiryUnsupported(format!(
                "{} signatures are valid for at most {}s, {}s requested",
                self.backend,
                max_ttl.as_secs(),
                expires_in.as_secs()
            )));
        }

        let store = self.store_for(&handle.bucket)?;
        let location = Path::from(handle.key.clone());

        let url_result: ObjectResult<_> =
            store.signed_url(Method::GET, &location, expires_in).await;

        let url = url_result
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %handle.bucket,
                    key = %handle.key,
                    "URL signing failed"
                );
                StorageError::SigningFailed(e.to_string())
            })?
            .to_string();

        Ok(url)
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}

fn download_token_url(endpoint: &str, handle: &ObjectHandle, token: &str) -> String {
    format!(
        "{}/b/{}/o/{}?alt=media&token={}",
        endpoint.trim_end_matches('/'),
        utf8_percent_encode(&handle.bucket, OBJECT_NAME),
        utf8_percent_encode(&handle.key, OBJECT_NAME),
        token
    )
}
