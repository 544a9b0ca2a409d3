//! MinIO/S3-compatible storage session
//!
//! Object-level operations go through the rust-s3 crate. Bucket HEAD and
//! policy GET are sent with reqwest and signed by [`SigV4Signer`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method};
use s3::creds::Credentials;
use s3::serde_types::Part;
use s3::{Bucket, BucketConfiguration, Region};
use tracing::debug;
use url::Url;

use crate::core::config::StorageConfig;
use crate::core::error::{AppError, Result};
use crate::modules::storage::session::{
    BucketCreation, ObjectEntry, ObjectMetadata, SessionFactory, StorageSession, UploadedPart,
};
use crate::modules::storage::sigv4::SigV4Signer;
use crate::shared::validation::s3_error_code;

const USER_METADATA_PREFIX: &str = "x-amz-meta-";

/// Opens [`MinIOSession`]s; the HTTP connection pool is shared between them
#[derive(Clone)]
pub struct MinIOSessionFactory {
    http_client: Client,
}

impl MinIOSessionFactory {
    pub fn new() -> Result<Self> {
        let http_client = Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl SessionFactory for MinIOSessionFactory {
    async fn open(&self, config: &StorageConfig) -> Result<Box<dyn StorageSession>> {
        let session = MinIOSession::connect(config, self.http_client.clone())?;
        Ok(Box::new(session))
    }
}

/// MinIO/S3-compatible storage session
pub struct MinIOSession {
    region: Region,
    credentials: Credentials,
    endpoint: Url,
    signer: SigV4Signer,
    http_client: Client,
}

impl MinIOSession {
    pub fn connect(config: &StorageConfig, http_client: Client) -> Result<Self> {
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Storage(format!("Failed to create MinIO credentials: {}", e)))?;

        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| AppError::Storage(format!("Invalid endpoint URL: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        };

        debug!("Opened MinIO session for endpoint {}", config.endpoint);

        Ok(Self {
            region,
            credentials,
            endpoint,
            signer: SigV4Signer::new(&config.access_key, &config.secret_key, &config.region),
            http_client,
        })
    }

    /// Handle on a bucket, addressed path-style (http://endpoint/bucket)
    fn bucket(&self, name: &str) -> Result<Box<Bucket>> {
        let mut bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(|e| AppError::Storage(format!("Failed to open bucket '{}': {}", name, e)))?;
        bucket.set_path_style();
        Ok(bucket)
    }

    fn bucket_url(&self, bucket: &str, query: Option<&str>) -> Result<Url> {
        let base = self.endpoint.as_str().trim_end_matches('/');
        let raw = match query {
            Some(q) => format!("{}/{}?{}", base, bucket, q),
            None => format!("{}/{}", base, bucket),
        };
        Url::parse(&raw).map_err(|e| AppError::Storage(format!("Invalid bucket URL: {}", e)))
    }

    /// Send a signed, body-less bucket request; returns status and body text
    async fn signed_request(&self, method: Method, url: Url) -> Result<(u16, String)> {
        let headers = self.signer.sign(method.as_str(), &url, b"")?;

        let response = self
            .http_client
            .request(method, url.clone())
            .header("Host", &headers.host)
            .header("x-amz-date", &headers.amz_date)
            .header("x-amz-content-sha256", &headers.content_sha256)
            .header("Authorization", &headers.authorization)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Request to '{}' failed: {}", url, e)))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok((status, body))
    }
}

#[async_trait]
impl StorageSession for MinIOSession {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let url = self.bucket_url(bucket, None)?;
        let (status, body) = self.signed_request(Method::HEAD, url).await?;
        match status {
            200..=299 => Ok(true),
            404 => Ok(false),
            _ => Err(status_error(status, &body, &format!("bucket '{}'", bucket))),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<BucketCreation> {
        let result = Bucket::create_with_path_style(
            bucket,
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await;

        match result {
            Ok(response) if response.success() => Ok(BucketCreation::Created),
            Ok(response) if is_already_exists(&response.response_text) => {
                Ok(BucketCreation::AlreadyExists)
            }
            Ok(response) => Err(status_error(
                response.response_code,
                &response.response_text,
                &format!("create bucket '{}'", bucket),
            )),
            Err(e) if is_already_exists(&e.to_string()) => Ok(BucketCreation::AlreadyExists),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to create bucket '{}': {}",
                bucket, e
            ))),
        }
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let response = self
            .bucket(bucket)?
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to upload '{}': {}", key, e)))?;

        ensure_success(
            response.status_code(),
            response.as_slice(),
            &format!("upload '{}'", key),
        )
    }

    async fn begin_multipart(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String> {
        let response = self
            .bucket(bucket)?
            .initiate_multipart_upload(key, content_type)
            .await
            .map_err(|e| {
                AppError::Storage(format!("Failed to start multipart upload '{}': {}", key, e))
            })?;
        Ok(response.upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Vec<u8>,
    ) -> Result<UploadedPart> {
        let part = self
            .bucket(bucket)?
            .put_multipart_chunk(data, key, part_number, upload_id, "application/octet-stream")
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "Failed to upload part {} of '{}': {}",
                    part_number, key, e
                ))
            })?;

        Ok(UploadedPart {
            part_number: part.part_number,
            etag: part.etag,
        })
    }

    async fn complete_multipart(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<()> {
        let parts = parts
            .into_iter()
            .map(|p| Part {
                part_number: p.part_number,
                etag: p.etag,
            })
            .collect();

        let response = self
            .bucket(bucket)?
            .complete_multipart_upload(key, upload_id, parts)
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "Failed to complete multipart upload '{}': {}",
                    key, e
                ))
            })?;

        ensure_success(
            response.status_code(),
            response.as_slice(),
            &format!("complete upload '{}'", key),
        )
    }

    async fn abort_multipart(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        self.bucket(bucket)?
            .abort_upload(key, upload_id)
            .await
            .map_err(|e| {
                AppError::Storage(format!("Failed to abort multipart upload '{}': {}", key, e))
            })
    }

    async fn stat_object(&self, bucket: &str, key: &str) -> Result<Option<ObjectMetadata>> {
        let (head, status) = match self.bucket(bucket)?.head_object(key).await {
            Ok(result) => result,
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("404") || error_str.contains("NoSuchKey") {
                    return Ok(None);
                }
                return Err(AppError::Storage(format!(
                    "Failed to stat '{}/{}': {}",
                    bucket, key, e
                )));
            }
        };

        match status {
            200..=299 => {}
            404 => return Ok(None),
            _ => return Err(status_error(status, "", &format!("object '{}/{}'", bucket, key))),
        }

        let metadata = head
            .metadata
            .unwrap_or_default()
            .into_iter()
            .map(|(k, v)| {
                let name = k
                    .strip_prefix(USER_METADATA_PREFIX)
                    .map(str::to_string)
                    .unwrap_or(k);
                (name, v)
            })
            .collect();

        Ok(Some(ObjectMetadata {
            object_name: key.to_string(),
            content_type: head.content_type,
            size: head.content_length.unwrap_or(0).max(0) as u64,
            last_modified: head.last_modified.as_deref().and_then(parse_timestamp),
            etag: head.e_tag.map(|t| t.trim_matches('"').to_string()),
            metadata,
        }))
    }

    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()> {
        let response = self
            .bucket(bucket)?
            .delete_object(key)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete '{}': {}", key, e)))?;

        ensure_success(
            response.status_code(),
            response.as_slice(),
            &format!("delete '{}/{}'", bucket, key),
        )
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> Result<Vec<ObjectEntry>> {
        let delimiter = if recursive { None } else { Some("/".to_string()) };
        let pages = self
            .bucket(bucket)?
            .list(prefix.to_string(), delimiter)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to list bucket '{}': {}", bucket, e)))?;

        let mut entries = Vec::new();
        for page in pages {
            for dir in page.common_prefixes.unwrap_or_default() {
                entries.push(ObjectEntry {
                    object_name: dir.prefix,
                    size: 0,
                    last_modified: None,
                    is_dir: true,
                });
            }
            for object in page.contents {
                entries.push(ObjectEntry {
                    is_dir: object.key.ends_with('/'),
                    last_modified: parse_timestamp(&object.last_modified),
                    size: object.size,
                    object_name: object.key,
                });
            }
        }
        entries.sort_by(|a, b| a.object_name.cmp(&b.object_name));

        Ok(entries)
    }

    async fn bucket_policy(&self, bucket: &str) -> Result<Option<String>> {
        let url = self.bucket_url(bucket, Some("policy"))?;
        let (status, body) = self.signed_request(Method::GET, url).await?;

        match (status, s3_error_code(&body)) {
            (200..=299, _) => Ok(Some(body)),
            (_, Some("NoSuchBucketPolicy")) => Ok(None),
            _ => Err(status_error(
                status,
                &body,
                &format!("policy of bucket '{}'", bucket),
            )),
        }
    }

    async fn presign_get(&self, bucket: &str, key: &str, expiry_secs: u32) -> Result<String> {
        self.bucket(bucket)?
            .presign_get(key, expiry_secs, None)
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "Failed to generate presigned URL for '{}': {}",
                    key, e
                ))
            })
    }
}

fn is_already_exists(message: &str) -> bool {
    message.contains("BucketAlreadyOwnedByYou")
        || message.contains("BucketAlreadyExists")
        || message.contains("already own it")
}

fn ensure_success(status: u16, body: &[u8], context: &str) -> Result<()> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(status_error(status, &String::from_utf8_lossy(body), context))
    }
}

/// Map a failed S3 response onto the error taxonomy
fn status_error(status: u16, body: &str, context: &str) -> AppError {
    match (status, s3_error_code(body)) {
        (_, Some("AccessDenied")) | (403, _) => {
            AppError::PermissionDenied(format!("Access denied to {}", context))
        }
        (_, Some(code @ ("NoSuchBucket" | "NoSuchKey"))) => {
            AppError::NotFound(format!("{}: {}", context, code))
        }
        (404, _) => AppError::NotFound(format!("{} does not exist", context)),
        (_, Some(code)) => AppError::Storage(format!("{} failed: HTTP {} {}", context, status, code)),
        (_, None) => AppError::Storage(format!("{} failed: HTTP {}", context, status)),
    }
}

/// S3 reports RFC 2822 dates in headers and RFC 3339 dates in listings
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|t| t.with_timezone(&Utc))
        .ok()
}
