//! In-memory collaborators for pipeline tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use image::{ImageFormat, RgbImage};
use rescale_core::{DocumentBackend, StorageBackend, UploadEvent};
use rescale_db::{DocumentError, DocumentResult, DocumentStore, Fields};
use rescale_processing::{
    Clock, NativeImageMetrics, NativeResizer, PipelineDeps, PipelineSettings, Resizer,
};
use rescale_storage::{BlobStore, ObjectHandle, StorageError, StorageResult};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One call made against the mock blob store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobOp {
    Download(String),
    Upload(String),
    Sign(String),
    Delete(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Upload,
    Sign,
    /// Signing refused because the backend cannot grant the requested lifetime.
    SignExpiry,
    Delete,
}

/// Mock blob store keeping objects in memory, keyed by `bucket/key`
#[derive(Default)]
pub struct MockBlobStore {
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    ops: Mutex<Vec<BlobOp>>,
    fail_on: Mutex<Option<FailOn>>,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn path(bucket: &str, key: &str) -> String {
        format!("{}/{}", bucket, key)
    }

    pub fn put(&self, bucket: &str, key: &str, data: Vec<u8>, content_type: &str) {
        self.objects
            .lock()
            .unwrap()
            .insert(Self::path(bucket, key), (data, content_type.to_string()));
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&Self::path(bucket, key))
            .map(|(data, _)| data.clone())
    }

    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(&Self::path(bucket, key))
            .map(|(_, ct)| ct.clone())
    }

    pub fn has(&self, bucket: &str, key: &str) -> bool {
        self.get(bucket, key).is_some()
    }

    /// Keys currently stored in `bucket`, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let prefix = format!("{}/", bucket);
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect();
        keys.sort();
        keys
    }

    pub fn ops(&self) -> Vec<BlobOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn fail_on(&self, op: FailOn) {
        *self.fail_on.lock().unwrap() = Some(op);
    }

    fn record(&self, op: BlobOp) {
        self.ops.lock().unwrap().push(op);
    }

    fn should_fail(&self, op: FailOn) -> bool {
        *self.fail_on.lock().unwrap() == Some(op)
    }
}

#[async_trait]
impl BlobStore for MockBlobStore {
    async fn download(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        self.record(BlobOp::Download(key.to_string()));
        self.get(bucket, key)
            .ok_or_else(|| StorageError::NotFound(Self::path(bucket, key)))
    }

    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<ObjectHandle> {
        self.record(BlobOp::Upload(key.to_string()));
        if self.should_fail(FailOn::Upload) {
            return Err(StorageError::UploadFailed("injected failure".to_string()));
        }
        let size_bytes = data.len() as u64;
        self.put(bucket, key, data, content_type);
        Ok(ObjectHandle {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size_bytes,
            download_token: None,
        })
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.record(BlobOp::Delete(key.to_string()));
        if self.should_fail(FailOn::Delete) {
            return Err(StorageError::DeleteFailed("injected failure".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&Self::path(bucket, key));
        Ok(())
    }

    async fn signed_read_url(
        &self,
        handle: &ObjectHandle,
        expires_in: Duration,
    ) -> StorageResult<String> {
        self.record(BlobOp::Sign(handle.key.clone()));
        if self.should_fail(FailOn::Sign) {
            return Err(StorageError::SigningFailed("injected failure".to_string()));
        }
        if self.should_fail(FailOn::SignExpiry) {
            return Err(StorageError::ExpiryUnsupported(format!(
                "at most 604800s, {}s requested",
                expires_in.as_secs()
            )));
        }
        if !self.has(&handle.bucket, &handle.key) {
            return Err(StorageError::NotFound(handle.key.clone()));
        }
        Ok(format!(
            "https://signed.example.com/{}/{}?ttl={}",
            handle.bucket,
            handle.key,
            expires_in.as_secs()
        ))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

/// Mock document store; updates to unknown documents fail with `NotFound`
#[derive(Default)]
pub struct MockDocumentStore {
    documents: Mutex<HashMap<String, Fields>>,
    updates: Mutex<Vec<(String, Fields)>>,
    unavailable: Mutex<bool>,
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str) {
        self.documents
            .lock()
            .unwrap()
            .insert(path.to_string(), Fields::new());
    }

    pub fn get(&self, path: &str) -> Option<Fields> {
        self.documents.lock().unwrap().get(path).cloned()
    }

    pub fn updates(&self) -> Vec<(String, Fields)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn set_unavailable(&self) {
        *self.unavailable.lock().unwrap() = true;
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn update(&self, document_path: &str, fields: Fields) -> DocumentResult<()> {
        self.updates
            .lock()
            .unwrap()
            .push((document_path.to_string(), fields.clone()));
        if *self.unavailable.lock().unwrap() {
            return Err(DocumentError::Transport("connection refused".to_string()));
        }
        let mut documents = self.documents.lock().unwrap();
        let document = documents
            .get_mut(document_path)
            .ok_or_else(|| DocumentError::NotFound(document_path.to_string()))?;
        document.extend(fields);
        Ok(())
    }

    fn backend_type(&self) -> DocumentBackend {
        DocumentBackend::Local
    }
}

/// Resizer that records requested heights and paths and delegates to `NativeResizer`
#[derive(Default)]
pub struct RecordingResizer {
    heights: Mutex<Vec<u32>>,
    paths: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl RecordingResizer {
    pub fn calls(&self) -> Vec<u32> {
        self.heights.lock().unwrap().clone()
    }

    /// `(input, output)` scratch paths of every call.
    pub fn paths(&self) -> Vec<(PathBuf, PathBuf)> {
        self.paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl Resizer for RecordingResizer {
    async fn resize(
        &self,
        input: &Path,
        output: &Path,
        target_height: u32,
    ) -> Result<(), anyhow::Error> {
        self.heights.lock().unwrap().push(target_height);
        self.paths
            .lock()
            .unwrap()
            .push((input.to_path_buf(), output.to_path_buf()));
        NativeResizer.resize(input, output, target_height).await
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Resizer that behaves like a crashed external tool: it leaves a truncated
/// output behind and reports failure.
pub struct FailingResizer;

#[async_trait]
impl Resizer for FailingResizer {
    async fn resize(
        &self,
        _input: &Path,
        output: &Path,
        _target_height: u32,
    ) -> Result<(), anyhow::Error> {
        tokio::fs::write(output, b"\x89PNG truncated").await?;
        Err(anyhow::anyhow!("convert: killed by signal 9"))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
}

/// Everything a pipeline test needs, with handles to inspect the mocks
pub struct Harness {
    pub blobs: Arc<MockBlobStore>,
    pub documents: Arc<MockDocumentStore>,
    pub resizer: Arc<RecordingResizer>,
    pub deps: PipelineDeps,
    pub settings: PipelineSettings,
    pub scratch: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::at(fixed_time())
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        let blobs = Arc::new(MockBlobStore::new());
        let documents = Arc::new(MockDocumentStore::new());
        let resizer = Arc::new(RecordingResizer::default());
        let scratch = tempfile::tempdir().unwrap();

        let deps = PipelineDeps {
            blob_store: blobs.clone(),
            document_store: documents.clone(),
            resizer: resizer.clone(),
            metrics: Arc::new(NativeImageMetrics),
            clock: Arc::new(FixedClock(now)),
        };
        let settings = PipelineSettings {
            scratch_dir: scratch.path().to_path_buf(),
            ..PipelineSettings::default()
        };

        Self {
            blobs,
            documents,
            resizer,
            deps,
            settings,
            scratch,
        }
    }

    /// Files left anywhere under the scratch root.
    pub fn scratch_files(&self) -> Vec<std::path::PathBuf> {
        fn walk(dir: &Path, out: &mut Vec<std::path::PathBuf>) {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(&path, out);
                } else {
                    out.push(path);
                }
            }
        }
        let mut files = Vec::new();
        walk(self.scratch.path(), &mut files);
        files
    }
}

pub fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

pub fn image_event(name: &str) -> UploadEvent {
    UploadEvent::new("bucket", name).with_content_type("image/png")
}

pub fn decode_dimensions(data: &[u8]) -> (u32, u32) {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .unwrap()
        .into_dimensions()
        .unwrap()
}
