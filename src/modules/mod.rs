//! Modules layer - Infrastructure components for external integrations
//!
//! Contains the MinIO/S3 object storage adapter.

pub mod storage;
