use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::modules::storage::{BucketPolicy, StoredObject};

/// Upload object request DTO for OpenAPI documentation
/// Note: This struct is for Swagger UI documentation only.
/// The actual handler uses axum's Multipart extractor directly.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadObjectDto {
    /// The file to upload
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// Directory prefix inside the bucket; slashes are normalized
    #[schema(example = "reports/2024")]
    pub prefix: Option<String>,
    /// Object name; defaults to the uploaded file name
    #[schema(example = "summary.pdf")]
    pub name: Option<String>,
}

/// Response DTO for a completed upload
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadObjectResponseDto {
    /// Bucket the object was written to
    pub bucket: String,
    /// Normalized object key
    pub key: String,
    /// Size of the object in bytes
    pub size: u64,
    /// Signed URL for private buckets, plain URL for public ones
    pub url: String,
}

impl From<StoredObject> for UploadObjectResponseDto {
    fn from(stored: StoredObject) -> Self {
        Self {
            bucket: stored.bucket,
            key: stored.key,
            size: stored.size,
            url: stored.url,
        }
    }
}

/// Request DTO for deleting an object by URL
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct DeleteObjectDto {
    /// The URL of the object to delete
    #[validate(url(message = "Invalid URL format"))]
    #[validate(length(min = 1, message = "url is required"))]
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteObjectResponseDto {
    pub deleted: bool,
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListObjectsQuery {
    /// Only list entries under this directory prefix
    pub prefix: Option<String>,
    /// Descend into sub-directories instead of reporting them as entries
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ObjectUrlQuery {
    /// Fully qualified object URL, e.g. `http://host:9000/bucket/dir/file.png`
    #[validate(url(message = "Invalid URL format"))]
    pub url: String,
}

#[derive(Debug, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ResolveUrlQuery {
    /// Object key inside the bucket
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    /// Bucket to resolve in; the configured bucket when absent
    pub bucket: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ObjectUrlResponseDto {
    pub url: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BucketPolicyQuery {
    /// Bucket to inspect; the configured bucket when absent
    pub bucket: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BucketPolicyResponseDto {
    pub bucket: String,
    pub policy: BucketPolicy,
}
