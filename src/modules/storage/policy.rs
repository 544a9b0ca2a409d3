use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::core::error::{AppError, Result};

/// Access classification of a bucket, derived from its policy document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum BucketPolicy {
    /// Policy grants at least one statement; links are returned unsigned
    Public,
    /// Policy exists but grants nothing
    Private,
    /// No policy document is set on the bucket
    Unset,
}

impl BucketPolicy {
    /// Classify a raw policy document; `None` means the bucket has no policy
    pub fn classify(document: Option<&str>) -> Result<Self> {
        let Some(document) = document else {
            return Ok(BucketPolicy::Unset);
        };
        if document.trim().is_empty() {
            return Ok(BucketPolicy::Unset);
        }

        let policy: Value = serde_json::from_str(document)
            .map_err(|e| AppError::Storage(format!("Malformed bucket policy document: {}", e)))?;

        let has_statements = match policy.get("Statement") {
            Some(Value::Array(statements)) => !statements.is_empty(),
            // A lone statement object is legal policy syntax
            Some(Value::Object(_)) => true,
            _ => false,
        };

        Ok(if has_statements {
            BucketPolicy::Public
        } else {
            BucketPolicy::Private
        })
    }

    /// Whether links for this bucket may drop their signature
    pub fn allows_unsigned_links(self) -> bool {
        matches!(self, BucketPolicy::Public)
    }
}

/// Cut a presigned URL at its first `?X-` signing parameter
pub fn strip_signature(presigned_url: &str) -> &str {
    match presigned_url.find("?X-") {
        Some(idx) => &presigned_url[..idx],
        None => presigned_url,
    }
}
