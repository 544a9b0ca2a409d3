use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::features::objects::handlers;
use crate::modules::storage::ObjectStore;

/// Room for multipart boundaries and the text fields around the file
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Create routes for the objects feature
pub fn routes(store: Arc<ObjectStore>, max_upload_size: usize) -> Router {
    Router::new()
        .route(
            "/api/objects/upload",
            post(handlers::upload_object)
                .layer(DefaultBodyLimit::max(max_upload_size + MULTIPART_OVERHEAD)),
        )
        .route(
            "/api/objects",
            get(handlers::list_objects).delete(handlers::delete_object),
        )
        .route("/api/objects/info", get(handlers::object_info))
        .route("/api/objects/url", get(handlers::resolve_url))
        .route("/api/buckets/policy", get(handlers::bucket_policy))
        .with_state(store)
}
