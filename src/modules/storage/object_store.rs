//! Object store façade
//!
//! Every public operation opens its own [`StorageSession`], runs its round
//! trips against the configured bucket, and drops the session on return.
//! Input validation happens before any session is opened.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::core::config::StorageConfig;
use crate::core::error::{AppError, Result};
use crate::modules::storage::minio_client::MinIOSessionFactory;
use crate::modules::storage::object_key::{normalize_prefix, ObjectKey};
use crate::modules::storage::policy::{strip_signature, BucketPolicy};
use crate::modules::storage::session::{
    BucketCreation, ObjectEntry, ObjectMetadata, SessionFactory, StorageSession, UploadedPart,
};
use crate::modules::storage::url_parser::{extract_bucket, extract_object_key, ObjectRef};
use crate::shared::validation::BUCKET_NAME_REGEX;

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    /// Signed link for private buckets, canonical link for public ones
    pub url: String,
}

/// Bucket listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BucketListing {
    pub bucket: String,
    pub file_count: usize,
    pub files: Vec<ObjectEntry>,
}

/// Listing outcome. A missing bucket is reported as a payload, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum BucketInfo {
    Found(BucketListing),
    Missing { error: String },
}

/// Listing scope; the default is the top level of the bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub recursive: bool,
}

/// Façade over one MinIO/S3 bucket
#[derive(Clone)]
pub struct ObjectStore {
    config: StorageConfig,
    sessions: Arc<dyn SessionFactory>,
}

impl ObjectStore {
    pub fn new(config: StorageConfig, sessions: Arc<dyn SessionFactory>) -> Self {
        Self { config, sessions }
    }

    /// Façade backed by real MinIO sessions
    pub fn minio(config: StorageConfig) -> Result<Self> {
        let factory = MinIOSessionFactory::new()?;
        info!(
            "Object store configured for endpoint: {}, bucket: {}",
            config.endpoint, config.bucket
        );
        Ok(Self::new(config, Arc::new(factory)))
    }

    /// A new façade talking to another endpoint; this one is left untouched
    pub fn with_endpoint(&self, endpoint: impl Into<String>) -> Self {
        Self {
            config: self.config.with_endpoint(endpoint),
            sessions: Arc::clone(&self.sessions),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn bucket_name(&self) -> &str {
        &self.config.bucket
    }

    async fn session(&self) -> Result<Box<dyn StorageSession>> {
        self.sessions.open(&self.config).await
    }

    // =========================================================================
    // UPLOAD
    // =========================================================================

    /// Upload a local file under `object_name` at the bucket root
    pub async fn upload_file_by_path(
        &self,
        object_name: &str,
        path: impl AsRef<Path>,
    ) -> Result<StoredObject> {
        self.upload_file_by_path_in(None, object_name, path).await
    }

    /// Upload a local file under `prefix/object_name`
    pub async fn upload_file_by_path_in(
        &self,
        prefix: Option<&str>,
        object_name: &str,
        path: impl AsRef<Path>,
    ) -> Result<StoredObject> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| AppError::Validation(format!("File does not exist: {}", path.display())))?;
        if !metadata.is_file() {
            return Err(AppError::Validation(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }

        let file = tokio::fs::File::open(path).await.map_err(|e| {
            AppError::Validation(format!("Cannot open {}: {}", path.display(), e))
        })?;

        info!("Uploading {} ({} bytes)", path.display(), metadata.len());
        self.upload(prefix, object_name, file, metadata.len()).await
    }

    /// Upload `size` bytes from `reader` under `object_name` at the bucket root
    pub async fn upload_stream<R>(&self, object_name: &str, reader: R, size: u64) -> Result<StoredObject>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.upload(None, object_name, reader, size).await
    }

    /// Upload `size` bytes from `reader` under `prefix/object_name`
    pub async fn upload_stream_in<R>(
        &self,
        prefix: &str,
        object_name: &str,
        reader: R,
        size: u64,
    ) -> Result<StoredObject>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.upload(Some(prefix), object_name, reader, size).await
    }

    /// Upload a stream of exactly `size` bytes and return its access URL
    ///
    /// Payloads up to one part are sent with a single put; larger ones as a
    /// multipart upload that is aborted if any part fails.
    ///
    /// # Errors
    /// - `Validation` for a bad key or a stream shorter than `size`
    /// - `Storage` / `PermissionDenied` for store failures, never retried
    pub async fn upload<R>(
        &self,
        prefix: Option<&str>,
        object_name: &str,
        reader: R,
        size: u64,
    ) -> Result<StoredObject>
    where
        R: AsyncRead + Unpin + Send,
    {
        let key = ObjectKey::new(prefix, object_name)?;
        let content_type = mime_guess::from_path(key.as_str())
            .first_or_octet_stream()
            .to_string();
        let bucket = self.config.bucket.as_str();

        let session = self.session().await?;
        self.ensure_bucket(session.as_ref(), bucket).await;

        let mut reader = reader.take(size);
        self.stream_to_store(session.as_ref(), bucket, &key, &content_type, &mut reader, size)
            .await?;

        info!(
            "Uploaded '{}' to bucket '{}' ({} bytes, {})",
            key, bucket, size, content_type
        );

        let url = self.issue_url(session.as_ref(), bucket, key.as_str()).await?;

        Ok(StoredObject {
            bucket: bucket.to_string(),
            key: key.into_string(),
            size,
            url,
        })
    }

    /// Create the bucket when absent; failures are logged and left to the put to surface
    async fn ensure_bucket(&self, session: &dyn StorageSession, bucket: &str) {
        match session.bucket_exists(bucket).await {
            Ok(true) => {
                debug!("Bucket '{}' already exists", bucket);
                return;
            }
            Ok(false) => {}
            Err(e) => warn!("Could not check bucket '{}': {}", bucket, e),
        }

        match session.create_bucket(bucket).await {
            Ok(BucketCreation::Created) => info!("Bucket '{}' created successfully", bucket),
            Ok(BucketCreation::AlreadyExists) => debug!("Bucket '{}' already exists", bucket),
            Err(e) => warn!(
                "Could not create bucket '{}': {}. Assuming it exists.",
                bucket, e
            ),
        }
    }

    async fn stream_to_store<R>(
        &self,
        session: &dyn StorageSession,
        bucket: &str,
        key: &ObjectKey,
        content_type: &str,
        reader: &mut R,
        size: u64,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let part_size = self.config.upload_part_size.max(1);
        let first = read_part(reader, part_size, size).await?;

        if first.len() as u64 == size {
            debug!("Uploading '{}' in a single request", key);
            return session
                .put_object(bucket, key.as_str(), first, content_type)
                .await;
        }

        let upload_id = session
            .begin_multipart(bucket, key.as_str(), content_type)
            .await?;
        debug!("Started multipart upload '{}' for '{}'", upload_id, key);

        let result = upload_parts(session, bucket, key, &upload_id, first, reader, part_size, size).await;
        match result {
            Ok(parts) => {
                session
                    .complete_multipart(bucket, key.as_str(), &upload_id, parts)
                    .await
            }
            Err(e) => {
                if let Err(abort_err) = session
                    .abort_multipart(bucket, key.as_str(), &upload_id)
                    .await
                {
                    warn!(
                        "Failed to abort multipart upload '{}' for '{}': {}",
                        upload_id, key, abort_err
                    );
                }
                Err(e)
            }
        }
    }

    // =========================================================================
    // DELETE
    // =========================================================================

    /// Remove the object a URL points at. Removing a missing object succeeds.
    pub async fn delete_object(&self, url: &str) -> Result<ObjectRef> {
        let object = parse_url(url)?;

        let session = self.session().await?;
        session.remove_object(&object.bucket, &object.key).await?;

        info!(
            "Object '{}' deleted from bucket '{}'",
            object.key, object.bucket
        );
        Ok(object)
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// Top-level listing of the configured bucket
    pub async fn info(&self) -> Result<BucketInfo> {
        self.info_with(&ListOptions::default()).await
    }

    /// Listing of the configured bucket, optionally under a prefix and recursive
    pub async fn info_with(&self, options: &ListOptions) -> Result<BucketInfo> {
        let bucket = self.config.bucket.as_str();
        let prefix = options
            .prefix
            .as_deref()
            .map(normalize_prefix)
            .filter(|p| !p.is_empty())
            .map(|p| format!("{}/", p))
            .unwrap_or_default();

        let session = self.session().await?;
        if !session.bucket_exists(bucket).await? {
            debug!("Listing requested for missing bucket '{}'", bucket);
            return Ok(BucketInfo::Missing {
                error: format!("Bucket '{}' does not exist", bucket),
            });
        }

        let files = session
            .list_objects(bucket, &prefix, options.recursive)
            .await?;
        debug!(
            "Listed {} entries in bucket '{}' under '{}'",
            files.len(),
            bucket,
            prefix
        );

        Ok(BucketInfo::Found(BucketListing {
            bucket: bucket.to_string(),
            file_count: files.len(),
            files,
        }))
    }

    /// Full metadata of the object a URL points at
    pub async fn object_info(&self, url: &str) -> Result<ObjectMetadata> {
        let object = parse_url(url)?;

        let session = self.session().await?;
        self.require_object(session.as_ref(), &object.bucket, &object.key)
            .await
    }

    /// Access URL for an object in the configured bucket
    pub async fn get_url(&self, object_name: &str) -> Result<String> {
        let bucket = self.config.bucket.clone();
        self.get_url_in(&bucket, object_name).await
    }

    /// Access URL for an object in `bucket`
    ///
    /// # Errors
    /// `NotFound` when the bucket or the object is absent
    pub async fn get_url_in(&self, bucket: &str, object_name: &str) -> Result<String> {
        check_bucket_name(bucket)?;
        let key = ObjectKey::new(None, object_name)?;

        let session = self.session().await?;
        self.require_object(session.as_ref(), bucket, key.as_str())
            .await?;
        self.issue_url(session.as_ref(), bucket, key.as_str()).await
    }

    /// Policy classification of `bucket`
    pub async fn bucket_policy(&self, bucket: &str) -> Result<BucketPolicy> {
        check_bucket_name(bucket)?;

        let session = self.session().await?;
        self.policy_of(session.as_ref(), bucket).await
    }

    /// Policy classification of the configured bucket
    pub async fn default_bucket_policy(&self) -> Result<BucketPolicy> {
        let bucket = self.config.bucket.clone();
        self.bucket_policy(&bucket).await
    }

    async fn require_object(
        &self,
        session: &dyn StorageSession,
        bucket: &str,
        key: &str,
    ) -> Result<ObjectMetadata> {
        if !session.bucket_exists(bucket).await? {
            return Err(AppError::NotFound(format!(
                "Bucket '{}' does not exist",
                bucket
            )));
        }

        session
            .stat_object(bucket, key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Object '{}' does not exist", key)))
    }

    async fn policy_of(&self, session: &dyn StorageSession, bucket: &str) -> Result<BucketPolicy> {
        let document = session.bucket_policy(bucket).await?;
        let policy = BucketPolicy::classify(document.as_deref())?;
        debug!("Bucket '{}' policy classified as {:?}", bucket, policy);
        Ok(policy)
    }

    /// Presign a GET link, dropping the signature for public buckets
    async fn issue_url(
        &self,
        session: &dyn StorageSession,
        bucket: &str,
        key: &str,
    ) -> Result<String> {
        let policy = self.policy_of(session, bucket).await?;
        let presigned = session
            .presign_get(bucket, key, self.config.presigned_url_expiry_secs)
            .await?;

        if policy.allows_unsigned_links() {
            Ok(strip_signature(&presigned).to_string())
        } else {
            Ok(presigned)
        }
    }
}

/// Upload every part after the first; returns the receipts in part order
#[allow(clippy::too_many_arguments)]
async fn upload_parts<R>(
    session: &dyn StorageSession,
    bucket: &str,
    key: &ObjectKey,
    upload_id: &str,
    first: Vec<u8>,
    reader: &mut R,
    part_size: usize,
    size: u64,
) -> Result<Vec<UploadedPart>>
where
    R: AsyncRead + Unpin + Send,
{
    let mut parts = Vec::new();
    let mut sent: u64 = 0;
    let mut part_number: u32 = 1;
    let mut chunk = first;

    loop {
        sent += chunk.len() as u64;
        debug!(
            "Uploading part {} of '{}' ({} bytes)",
            part_number,
            key,
            chunk.len()
        );
        let part = session
            .upload_part(bucket, key.as_str(), upload_id, part_number, chunk)
            .await?;
        parts.push(part);

        if sent >= size {
            return Ok(parts);
        }

        chunk = read_part(reader, part_size, size - sent).await?;
        part_number += 1;
    }
}

/// Read the next part: `part_size` bytes, or the remainder when that is smaller
async fn read_part<R>(reader: &mut R, part_size: usize, remaining: u64) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + Send,
{
    let want = remaining.min(part_size as u64) as usize;
    let mut buf = Vec::with_capacity(want);
    (&mut *reader)
        .take(want as u64)
        .read_to_end(&mut buf)
        .await
        .map_err(|e| AppError::Storage(format!("Failed to read upload stream: {}", e)))?;

    if buf.len() < want {
        return Err(AppError::Validation(format!(
            "Upload stream ended early: expected {} more bytes, got {}",
            remaining,
            buf.len()
        )));
    }
    Ok(buf)
}

/// Bucket and key from a URL, with the reason on failure
fn parse_url(url: &str) -> Result<ObjectRef> {
    let key = extract_object_key(url)
        .ok_or_else(|| AppError::Validation(format!("Cannot parse object name from URL '{}'", url)))?;
    let bucket = extract_bucket(url)
        .ok_or_else(|| AppError::Validation(format!("Cannot parse bucket from URL '{}'", url)))?;
    check_bucket_name(&bucket)?;
    Ok(ObjectRef { bucket, key })
}

fn check_bucket_name(bucket: &str) -> Result<()> {
    if BUCKET_NAME_REGEX.is_match(bucket) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Invalid bucket name '{}'",
            bucket
        )))
    }
}
