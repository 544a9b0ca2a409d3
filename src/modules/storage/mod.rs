//! Storage module for object management
//!
//! Provides the object store façade over MinIO/S3-compatible storage: key
//! normalization, URL parsing, policy classification, and per-call sessions.

mod minio_client;
mod object_key;
mod object_store;
mod policy;
mod session;
mod sigv4;
mod url_parser;

pub use minio_client::{MinIOSession, MinIOSessionFactory};
pub use object_key::{normalize_prefix, ObjectKey};
pub use object_store::{BucketInfo, BucketListing, ListOptions, ObjectStore, StoredObject};
pub use policy::{strip_signature, BucketPolicy};
pub use session::{
    BucketCreation, ObjectEntry, ObjectMetadata, SessionFactory, StorageSession, UploadedPart,
};
pub use sigv4::{SigV4Signer, SignedHeaders};
pub use url_parser::{extract_bucket, extract_object_key, parse_object_url, ObjectRef};
