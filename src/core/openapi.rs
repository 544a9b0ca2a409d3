use utoipa::{Modify, OpenApi};

use crate::features::objects::{dtos as objects_dtos, handlers as objects_handlers};
use crate::modules::storage::{BucketListing, BucketPolicy, ObjectEntry, ObjectMetadata};
use crate::shared::types::ApiResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        // Objects
        objects_handlers::upload_object,
        objects_handlers::delete_object,
        objects_handlers::list_objects,
        objects_handlers::object_info,
        objects_handlers::resolve_url,
        // Buckets
        objects_handlers::bucket_policy,
    ),
    components(
        schemas(
            // Storage
            BucketPolicy,
            ObjectEntry,
            ObjectMetadata,
            BucketListing,
            // Objects
            objects_dtos::UploadObjectDto,
            objects_dtos::UploadObjectResponseDto,
            objects_dtos::DeleteObjectDto,
            objects_dtos::DeleteObjectResponseDto,
            objects_dtos::ObjectUrlResponseDto,
            objects_dtos::BucketPolicyResponseDto,
            ApiResponse<objects_dtos::UploadObjectResponseDto>,
            ApiResponse<objects_dtos::DeleteObjectResponseDto>,
            ApiResponse<objects_dtos::ObjectUrlResponseDto>,
            ApiResponse<objects_dtos::BucketPolicyResponseDto>,
            ApiResponse<BucketListing>,
            ApiResponse<ObjectMetadata>,
        )
    ),
    tags(
        (name = "objects", description = "Object upload, lookup and deletion"),
        (name = "buckets", description = "Bucket access policy"),
    ),
    info(
        title = "MinIO Gateway API",
        version = "0.1.0",
        description = "HTTP surface over a MinIO/S3 bucket",
    )
)]
pub struct ApiDoc;

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
