//! In-memory object store used by unit tests in place of a MinIO server

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncRead, ReadBuf};

use crate::core::config::StorageConfig;
use crate::core::error::{AppError, Result};
use crate::modules::storage::{
    BucketCreation, ObjectEntry, ObjectMetadata, ObjectStore, SessionFactory, StorageSession,
    UploadedPart,
};

pub const TEST_ENDPOINT: &str = "http://minio.test:9000";
pub const TEST_BUCKET: &str = "uploads";

pub fn test_config(upload_part_size: usize) -> StorageConfig {
    StorageConfig {
        endpoint: TEST_ENDPOINT.to_string(),
        access_key: "minioadmin".to_string(),
        secret_key: "minioadmin".to_string(),
        bucket: TEST_BUCKET.to_string(),
        region: "us-east-1".to_string(),
        presigned_url_expiry_secs: 3600,
        upload_part_size,
    }
}

/// A façade over a fresh in-memory store
pub fn memory_object_store(upload_part_size: usize) -> (ObjectStore, MemoryStore) {
    let memory = MemoryStore::new();
    let store = ObjectStore::new(test_config(upload_part_size), memory.factory());
    (store, memory)
}

pub const PUBLIC_POLICY: &str = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Principal":{"AWS":["*"]},"Action":["s3:GetObject"],"Resource":["arn:aws:s3:::uploads/*"]}]}"#;
pub const PRIVATE_POLICY: &str = r#"{"Version":"2012-10-17","Statement":[]}"#;

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    content_type: String,
    metadata: HashMap<String, String>,
}

#[derive(Debug, Default)]
struct MemoryBucket {
    objects: BTreeMap<String, StoredBlob>,
    policy: Option<String>,
}

#[derive(Debug)]
struct PendingUpload {
    content_type: String,
    parts: BTreeMap<u32, Vec<u8>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    buckets: BTreeMap<String, MemoryBucket>,
    uploads: HashMap<String, PendingUpload>,
    next_upload_id: u64,
    calls: Vec<String>,
    fail_part: Option<u32>,
    fail_puts: bool,
    deny_policy: bool,
}

/// Shared handle on the in-memory store; every clone sees the same state
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    opened: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factory(&self) -> Arc<dyn SessionFactory> {
        Arc::new(self.clone())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    pub fn create_bucket(&self, bucket: &str) {
        self.state().buckets.entry(bucket.to_string()).or_default();
    }

    pub fn set_policy(&self, bucket: &str, policy: Option<&str>) {
        self.state()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .policy = policy.map(str::to_string);
    }

    pub fn insert_object(&self, bucket: &str, key: &str, data: &[u8]) {
        self.state()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .objects
            .insert(
                key.to_string(),
                StoredBlob {
                    data: data.to_vec(),
                    content_type: "application/octet-stream".to_string(),
                    metadata: HashMap::new(),
                },
            );
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|blob| blob.data.clone())
    }

    pub fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.state()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|blob| blob.content_type.clone())
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.state().buckets.contains_key(bucket)
    }

    /// Fail the upload of this part number
    pub fn fail_part(&self, part_number: u32) {
        self.state().fail_part = Some(part_number);
    }

    /// Fail every single-request put
    pub fn fail_puts(&self) {
        self.state().fail_puts = true;
    }

    pub fn deny_policy(&self) {
        self.state().deny_policy = true;
    }

    /// Operation names in call order, e.g. `"put_object"`
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn pending_uploads(&self) -> usize {
        self.state().uploads.len()
    }

    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn live_sessions(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for MemoryStore {
    async fn open(&self, config: &StorageConfig) -> Result<Box<dyn StorageSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySession {
            store: self.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        }))
    }
}

struct MemorySession {
    store: MemoryStore,
    endpoint: String,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.store.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemorySession {
    fn record(&self, call: &str) -> std::sync::MutexGuard<'_, MemoryState> {
        let mut state = self.store.state();
        state.calls.push(call.to_string());
        state
    }
}

fn no_such_bucket(bucket: &str) -> AppError {
    AppError::NotFound(format!("bucket '{}': NoSuchBucket", bucket))
}

#[async_trait]
impl StorageSession for MemorySession {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.record("bucket_exists").buckets.contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation> {
        let mut state = self.record("create_bucket");
        if state.buckets.contains_key(bucket) {
            return Ok(BucketCreation::AlreadyExists);
        }
        state.buckets.insert(bucket.to_string(), MemoryBucket::default());
        Ok(BucketCreation::Created)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let mut state = self.record("put_object");
        if state.fail_puts {
            return Err(AppError::Storage("connection reset by peer".to_string()));
        }
        let bucket = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        bucket.objects.insert(
            key.to_string(),
            StoredBlob {
                data,
                content_type: content_type.to_string(),
                metadata: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn begin_multipart(
        &self,
        bucket: &str,
        _key: &str,
        content_type: &str,
    ) -> Result<String> {
        let mut state = self.record("begin_multipart");
        if !state.buckets.contains_key(bucket) {
            return Err(no_such_bucket(bucket));
        }
        state.next_upload_id += 1;
        let upload_id = format!("upload-{}", state.next_upload_id);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                content_type: content_type.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: u32,
        data: Vec<u8>,
    ) -> Result<UploadedPart> {
        let mut state = self.record("upload_part");
        if state.fail_part == Some(part_number) {
            return Err(AppError::Storage(format!(
                "part {} timed out",
                part_number
            )));
        }
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| AppError::NotFound(format!("upload '{}': NoSuchUpload", upload_id)))?;
        let etag = format!("etag-{}-{}", part_number, data.len());
        upload.parts.insert(part_number, data);
        Ok(UploadedPart { part_number, etag })
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<()> {
        let mut state = self.record("complete_multipart");
        let upload = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| AppError::NotFound(format!("upload '{}': NoSuchUpload", upload_id)))?;

        let mut data = Vec::new();
        for part in &parts {
            let chunk = upload.parts.get(&part.part_number).ok_or_else(|| {
                AppError::Storage(format!("part {} was never uploaded", part.part_number))
            })?;
            data.extend_from_slice(chunk);
        }

        let bucket = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        bucket.objects.insert(
            key.to_string(),
            StoredBlob {
                data,
                content_type: upload.content_type,
                metadata: HashMap::new(),
            },
        );
        Ok(())
    }

    async fn abort_multipart(&self, _bucket: &str, _key: &str, upload_id: &str) -> Result<()> {
        self.record("abort_multipart").uploads.remove(upload_id);
        Ok(())
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectMetadata>> {
        let state = self.record("stat_object");
        Ok(state
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|blob| ObjectMetadata {
                object_name: key.to_string(),
                content_type: Some(blob.content_type.clone()),
                size: blob.data.len() as u64,
                last_modified: Some(Utc::now()),
                etag: Some(format!("{:x}", blob.data.len())),
                metadata: blob.metadata.clone(),
            }))
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()> {
        let mut state = self.record("remove_object");
        let bucket = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        bucket.objects.remove(key);
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> Result<Vec<ObjectEntry>> {
        let state = self.record("list_objects");
        let objects = &state
            .buckets
            .get(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?
            .objects;

        let mut dirs = BTreeSet::new();
        let mut entries = Vec::new();
        for (key, blob) in objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            match rest.find('/') {
                Some(idx) if !recursive => {
                    dirs.insert(format!("{}{}", prefix, &rest[..=idx]));
                }
                _ => entries.push(ObjectEntry {
                    object_name: key.clone(),
                    size: blob.data.len() as u64,
                    last_modified: Some(Utc::now()),
                    is_dir: false,
                }),
            }
        }
        entries.extend(dirs.into_iter().map(|dir| ObjectEntry {
            object_name: dir,
            size: 0,
            last_modified: None,
            is_dir: true,
        }));
        entries.sort_by(|a, b| a.object_name.cmp(&b.object_name));
        Ok(entries)
    }

    async fn bucket_policy(&self, bucket: &str) -> Result<Option<String>> {
        let state = self.record("bucket_policy");
        if state.deny_policy {
            return Err(AppError::PermissionDenied(format!(
                "Access denied to policy of bucket '{}'",
                bucket
            )));
        }
        state
            .buckets
            .get(bucket)
            .map(|b| b.policy.clone())
            .ok_or_else(|| no_such_bucket(bucket))
    }

    async fn presign_get(&self, bucket: &str, key: &str, expiry_secs: u32) -> Result<String> {
        drop(self.record("presign_get"));
        let path = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Ok(format!(
            "{}/{}/{}?X-Amz-Algorithm=AWS4-HMAC-SHA256&X-Amz-Credential=minioadmin%2F20240501%2Fus-east-1%2Fs3%2Faws4_request&X-Amz-Date=20240501T120000Z&X-Amz-Expires={}&X-Amz-SignedHeaders=host&X-Amz-Signature=0f1e2d3c",
            self.endpoint, bucket, path, expiry_secs
        ))
    }
}

/// Reader wrapper that records when it is dropped
pub struct TrackedReader<R> {
    inner: R,
    dropped: Arc<AtomicBool>,
}

impl<R> TrackedReader<R> {
    pub fn new(inner: R) -> (Self, Arc<AtomicBool>) {
        let dropped = Arc::new(AtomicBool::new(false));
        (
            Self {
                inner,
                dropped: Arc::clone(&dropped),
            },
            dropped,
        )
    }
}

impl<R> Drop for TrackedReader<R> {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for TrackedReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}
