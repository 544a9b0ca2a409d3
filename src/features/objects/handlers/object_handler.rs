use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use std::io::Cursor;
use std::sync::Arc;
use tracing::debug;
use validator::Validate;

use crate::core::error::AppError;
use crate::core::extractor::{AppJson, AppQuery};
use crate::features::objects::dtos::{
    BucketPolicyQuery, BucketPolicyResponseDto, DeleteObjectDto, DeleteObjectResponseDto,
    ListObjectsQuery, ObjectUrlQuery, ObjectUrlResponseDto, ResolveUrlQuery, UploadObjectDto,
    UploadObjectResponseDto,
};
use crate::modules::storage::{BucketInfo, BucketListing, ListOptions, ObjectMetadata, ObjectStore};
use crate::shared::types::ApiResponse;

/// Upload an object
///
/// Accepts multipart/form-data with:
/// - `file`: The file to upload (required)
/// - `prefix`: Directory prefix inside the bucket (optional)
/// - `name`: Object name (optional, defaults to the uploaded file name)
#[utoipa::path(
    post,
    path = "/api/objects/upload",
    tag = "objects",
    request_body(
        content = UploadObjectDto,
        content_type = "multipart/form-data",
        description = "File upload form with optional prefix and name fields",
    ),
    responses(
        (status = 201, description = "Object uploaded successfully", body = ApiResponse<UploadObjectResponseDto>),
        (status = 400, description = "Invalid file, name or prefix"),
        (status = 413, description = "File too large"),
        (status = 502, description = "Object store failure")
    )
)]
pub async fn upload_object(
    State(store): State<Arc<ObjectStore>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<UploadObjectResponseDto>>), AppError> {
    let mut file_data = None;
    let mut file_name: Option<String> = None;
    let mut prefix: Option<String> = None;
    let mut name: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        debug!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let data = field.bytes().await.map_err(|e| {
                    debug!("Failed to read file bytes: {}", e);
                    AppError::BadRequest(format!("Failed to read file data: {}", e))
                })?;
                file_data = Some(data);
            }
            "prefix" => {
                let text = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read prefix field: {}", e))
                })?;
                prefix = Some(text).filter(|p| !p.trim().is_empty());
            }
            "name" => {
                let text = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read name field: {}", e))
                })?;
                name = Some(text).filter(|n| !n.trim().is_empty());
            }
            _ => {
                debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let file_data =
        file_data.ok_or_else(|| AppError::BadRequest("File is required".to_string()))?;
    let name = name
        .or(file_name)
        .ok_or_else(|| AppError::BadRequest("Object name is required".to_string()))?;

    let size = file_data.len() as u64;
    let stored = store
        .upload(prefix.as_deref(), &name, Cursor::new(file_data), size)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(stored.into()), None)),
    ))
}

/// Delete an object by its URL
///
/// Deleting an object that does not exist succeeds.
#[utoipa::path(
    delete,
    path = "/api/objects",
    tag = "objects",
    request_body = DeleteObjectDto,
    responses(
        (status = 200, description = "Object deleted successfully", body = ApiResponse<DeleteObjectResponseDto>),
        (status = 400, description = "Invalid URL"),
        (status = 403, description = "Access denied by the object store")
    )
)]
pub async fn delete_object(
    State(store): State<Arc<ObjectStore>>,
    AppJson(dto): AppJson<DeleteObjectDto>,
) -> Result<Json<ApiResponse<DeleteObjectResponseDto>>, AppError> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let removed = store.delete_object(&dto.url).await?;

    Ok(Json(ApiResponse::success(
        Some(DeleteObjectResponseDto {
            deleted: true,
            bucket: removed.bucket,
            key: removed.key,
        }),
        Some("Object deleted successfully".to_string()),
    )))
}

/// List objects in the configured bucket
#[utoipa::path(
    get,
    path = "/api/objects",
    tag = "objects",
    params(ListObjectsQuery),
    responses(
        (status = 200, description = "Bucket listing", body = ApiResponse<BucketListing>),
        (status = 404, description = "Bucket does not exist")
    )
)]
pub async fn list_objects(
    State(store): State<Arc<ObjectStore>>,
    AppQuery(query): AppQuery<ListObjectsQuery>,
) -> Result<Json<ApiResponse<BucketListing>>, AppError> {
    let options = ListOptions {
        prefix: query.prefix,
        recursive: query.recursive,
    };

    match store.info_with(&options).await? {
        BucketInfo::Found(listing) => Ok(Json(ApiResponse::success(Some(listing), None))),
        BucketInfo::Missing { error } => Err(AppError::NotFound(error)),
    }
}

/// Metadata of the object a URL points at
#[utoipa::path(
    get,
    path = "/api/objects/info",
    tag = "objects",
    params(ObjectUrlQuery),
    responses(
        (status = 200, description = "Object metadata", body = ApiResponse<ObjectMetadata>),
        (status = 400, description = "URL cannot be parsed"),
        (status = 404, description = "Bucket or object does not exist")
    )
)]
pub async fn object_info(
    State(store): State<Arc<ObjectStore>>,
    AppQuery(query): AppQuery<ObjectUrlQuery>,
) -> Result<Json<ApiResponse<ObjectMetadata>>, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let metadata = store.object_info(&query.url).await?;
    Ok(Json(ApiResponse::success(Some(metadata), None)))
}

/// Resolve an access URL for an object
///
/// Public buckets get a plain URL, private or policy-less buckets a presigned one.
#[utoipa::path(
    get,
    path = "/api/objects/url",
    tag = "objects",
    params(ResolveUrlQuery),
    responses(
        (status = 200, description = "Access URL", body = ApiResponse<ObjectUrlResponseDto>),
        (status = 404, description = "Bucket or object does not exist")
    )
)]
pub async fn resolve_url(
    State(store): State<Arc<ObjectStore>>,
    AppQuery(query): AppQuery<ResolveUrlQuery>,
) -> Result<Json<ApiResponse<ObjectUrlResponseDto>>, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let url = match query.bucket.as_deref() {
        Some(bucket) => store.get_url_in(bucket, &query.name).await?,
        None => store.get_url(&query.name).await?,
    };

    Ok(Json(ApiResponse::success(
        Some(ObjectUrlResponseDto { url }),
        None,
    )))
}

/// Policy classification of a bucket
#[utoipa::path(
    get,
    path = "/api/buckets/policy",
    tag = "buckets",
    params(BucketPolicyQuery),
    responses(
        (status = 200, description = "Bucket policy", body = ApiResponse<BucketPolicyResponseDto>),
        (status = 403, description = "Access to the policy was denied"),
        (status = 404, description = "Bucket does not exist")
    )
)]
pub async fn bucket_policy(
    State(store): State<Arc<ObjectStore>>,
    AppQuery(query): AppQuery<BucketPolicyQuery>,
) -> Result<Json<ApiResponse<BucketPolicyResponseDto>>, AppError> {
    let bucket = query
        .bucket
        .unwrap_or_else(|| store.bucket_name().to_string());
    let policy = store.bucket_policy(&bucket).await?;

    Ok(Json(ApiResponse::success(
        Some(BucketPolicyResponseDto { bucket, policy }),
        None,
    )))
}
