//! Path-style object URL parsing
//!
//! `http://host:9000/{bucket}/{key...}` is the only layout handled. Query
//! strings (e.g. presign parameters) are ignored. Malformed input yields `None`.

use tracing::warn;
use url::{ParseError, Url};

/// Bucket and key recovered from an object URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

/// Parse a URL into its bucket and object key
pub fn parse_object_url(url: &str) -> Option<ObjectRef> {
    let segments = path_segments(url)?;
    if segments.len() < 2 {
        return None;
    }

    let bucket = segments[0].clone();
    let key = segments[1..].join("/");
    if bucket.is_empty() || key.is_empty() {
        return None;
    }

    Some(ObjectRef { bucket, key })
}

/// First path segment of the URL
pub fn extract_bucket(url: &str) -> Option<String> {
    path_segments(url)?
        .into_iter()
        .next()
        .filter(|bucket| !bucket.is_empty())
}

/// Path segments after the bucket, joined with `/`
pub fn extract_object_key(url: &str) -> Option<String> {
    parse_object_url(url).map(|object| object.key)
}

/// Decoded path segments, trailing empty segments dropped
fn path_segments(raw: &str) -> Option<Vec<String>> {
    let url = match Url::parse(raw.trim()) {
        Ok(url) => url,
        // Bare "bucket/key" paths are read relative to an arbitrary host
        Err(ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse("http://localhost/").ok()?;
            match base.join(raw.trim()) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Invalid object URL '{}': {}", raw, e);
                    return None;
                }
            }
        }
        Err(e) => {
            warn!("Invalid object URL '{}': {}", raw, e);
            return None;
        }
    };

    let Some(raw_segments) = url.path_segments() else {
        warn!("Object URL '{}' has no path", raw);
        return None;
    };

    let mut segments = Vec::new();
    for segment in raw_segments {
        match urlencoding::decode(segment) {
            Ok(decoded) => segments.push(decoded.into_owned()),
            Err(e) => {
                warn!("Object URL '{}' has an undecodable segment: {}", raw, e);
                return None;
            }
        }
    }

    while segments.last().is_some_and(|s| s.is_empty()) {
        segments.pop();
    }

    Some(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_bucket_and_key() {
        let url = "https://host/mybucket/dir/file.png";
        assert_eq!(extract_bucket(url).as_deref(), Some("mybucket"));
        assert_eq!(extract_object_key(url).as_deref(), Some("dir/file.png"));
    }

    #[test]
    fn test_ignores_presign_query() {
        let url = "http://localhost:9000/uploads/a/b.txt?X-Amz-Algorithm=AWS4-HMAC-SHA256&X-Amz-Signature=abc";
        assert_eq!(
            parse_object_url(url),
            Some(ObjectRef {
                bucket: "uploads".to_string(),
                key: "a/b.txt".to_string(),
            })
        );
    }

    #[test]
    fn test_decodes_percent_escapes() {
        let url = "http://localhost:9000/uploads/reports/q1%20summary.pdf";
        assert_eq!(
            extract_object_key(url).as_deref(),
            Some("reports/q1 summary.pdf")
        );
    }

    #[test]
    fn test_key_requires_two_segments() {
        assert_eq!(extract_bucket("http://host/onlybucket").as_deref(), Some("onlybucket"));
        assert_eq!(extract_object_key("http://host/onlybucket"), None);
        assert_eq!(extract_object_key("http://host/onlybucket/"), None);
        assert_eq!(parse_object_url("http://host/"), None);
        assert_eq!(extract_bucket("http://host/"), None);
    }

    #[test]
    fn test_relative_paths() {
        assert_eq!(
            parse_object_url("mybucket/dir/file.png"),
            Some(ObjectRef {
                bucket: "mybucket".to_string(),
                key: "dir/file.png".to_string(),
            })
        );
    }

    #[test]
    fn test_malformed_urls_yield_none() {
        assert_eq!(parse_object_url("http://[::1"), None);
        assert_eq!(extract_bucket("http://[::1"), None);
        assert_eq!(parse_object_url("mailto:someone@example.com"), None);
    }
}
