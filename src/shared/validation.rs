use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Runs of two or more forward slashes inside an object key
    pub static ref REPEATED_SLASHES: Regex = Regex::new(r"/{2,}").unwrap();

    /// S3 bucket naming rules: 3-63 chars, lowercase alphanumeric, dots and hyphens,
    /// starting and ending with a letter or digit
    /// - Valid: "uploads", "my-bucket", "logs.2024"
    /// - Invalid: "ab", "-bucket", "bucket-", "My_Bucket"
    pub static ref BUCKET_NAME_REGEX: Regex =
        Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").unwrap();

    /// `<Code>` element of an S3 XML error document
    pub static ref S3_ERROR_CODE_REGEX: Regex = Regex::new(r"<Code>([^<]+)</Code>").unwrap();
}

/// Extract the error code from an S3 XML error body, if there is one
pub fn s3_error_code(body: &str) -> Option<&str> {
    S3_ERROR_CODE_REGEX
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}
