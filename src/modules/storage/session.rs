//! Storage session seam
//!
//! A session is one client connection to the object store, opened at the start
//! of a façade call and dropped when the call returns.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core::config::StorageConfig;
use crate::core::error::Result;

/// Full metadata of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    pub object_name: String,
    pub content_type: Option<String>,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(rename = "etag")]
    pub etag: Option<String>,
    /// User metadata (`x-amz-meta-*`), prefix stripped
    pub metadata: HashMap<String, String>,
}

/// One row of a bucket listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEntry {
    pub object_name: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub is_dir: bool,
}

/// Outcome of a create-bucket request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketCreation {
    Created,
    AlreadyExists,
}

/// Receipt for one uploaded multipart part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_number: u32,
    pub etag: String,
}

/// Operations the façade needs from the object store
#[async_trait]
pub trait StorageSession: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation>;

    /// Single-request upload of a complete payload
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;

    /// Start a multipart upload, returning its upload id
    async fn begin_multipart(&self, bucket: &str, key: &str, content_type: &str)
        -> Result<String>;

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Vec<u8>,
    ) -> Result<UploadedPart>;

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<()>;

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()>;

    /// Metadata probe; `None` when the object does not exist
    async fn stat_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectMetadata>>;

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()>;

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> Result<Vec<ObjectEntry>>;

    /// Raw policy document; `None` when no policy is set
    async fn bucket_policy(&self, bucket: &str) -> Result<Option<String>>;

    async fn presign_get(&self, bucket: &str, key: &str, expiry_secs: u32) -> Result<String>;
}

/// Opens a fresh session per façade call
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, config: &StorageConfig) -> Result<Box<dyn StorageSession>>;
}
