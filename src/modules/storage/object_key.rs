//! Object key normalization
//!
//! Keys are built from an optional directory prefix and an object name. Both
//! halves are folded to forward slashes with no repeats, and the joined key
//! never starts or ends with a slash.

use std::fmt;

use crate::core::error::{AppError, Result};
use crate::shared::validation::REPEATED_SLASHES;

/// A validated, normalized object key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Build a key from an optional prefix and an object name
    ///
    /// # Errors
    /// `AppError::Validation` when the name is blank or the key contains a `..` segment
    pub fn new(prefix: Option<&str>, object_name: &str) -> Result<Self> {
        if object_name.trim().is_empty() {
            return Err(AppError::Validation(
                "Object name must not be empty".to_string(),
            ));
        }

        let prefix = normalize_prefix(prefix.unwrap_or(""));
        let name = normalize_prefix(object_name);
        if name.is_empty() {
            return Err(AppError::Validation(format!(
                "Object name '{}' does not name an object",
                object_name
            )));
        }

        let key = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };

        if key.split('/').any(|segment| segment == "..") {
            return Err(AppError::Validation(format!(
                "Illegal path '{}': parent directory segments are not allowed",
                key
            )));
        }

        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Fold backslashes, collapse slash runs and trim surrounding slashes
pub fn normalize_prefix(raw: &str) -> String {
    let forward = raw.replace('\\', "/");
    let collapsed = REPEATED_SLASHES.replace_all(&forward, "/");
    collapsed.trim_matches('/').to_string()
}
