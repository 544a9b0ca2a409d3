use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub swagger: SwaggerConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_upload_size: usize,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub title: String,
    pub version: String,
    pub description: String,
}

/// MinIO/S3 storage configuration for the object store façade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// MinIO/S3 endpoint URL
    pub endpoint: String,
    /// Access key for authentication
    pub access_key: String,
    /// Secret key for authentication
    pub secret_key: String,
    /// Default bucket for every operation that does not name one
    pub bucket: String,
    /// AWS region (for S3 compatibility)
    pub region: String,
    /// Presigned URL expiry time in seconds
    pub presigned_url_expiry_secs: u32,
    /// Size of each streamed upload part in bytes
    pub upload_part_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
            storage: StorageConfig::from_env()?,
        })
    }
}

impl AppConfig {
    const DEFAULT_MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024; // 100MB

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_upload_size = env::var("MAX_UPLOAD_SIZE")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_UPLOAD_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| "MAX_UPLOAD_SIZE must be a valid number".to_string())?;

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            max_upload_size,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "MinIO Gateway API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "Object storage façade over MinIO".to_string());

        Ok(Self {
            title,
            version,
            description,
        })
    }
}

impl StorageConfig {
    /// MinIO's own default for presigned GET links (7 days), also the SigV4 maximum
    pub const DEFAULT_PRESIGNED_URL_EXPIRY_SECS: u32 = 7 * 24 * 60 * 60;
    pub const DEFAULT_UPLOAD_PART_SIZE: usize = 20 * 1024 * 1024; // 20MB
    /// Smallest part S3 accepts for every part but the last
    pub const MIN_UPLOAD_PART_SIZE: usize = 5 * 1024 * 1024;

    pub fn from_env() -> Result<Self, String> {
        let endpoint =
            env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string());

        let access_key = env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());

        let secret_key = env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());

        let bucket = env::var("MINIO_BUCKET").unwrap_or_else(|_| "uploads".to_string());

        let region = env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        let presigned_url_expiry_secs = env::var("MINIO_PRESIGNED_URL_EXPIRY_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_PRESIGNED_URL_EXPIRY_SECS.to_string())
            .parse::<u32>()
            .map_err(|_| "MINIO_PRESIGNED_URL_EXPIRY_SECS must be a valid number".to_string())?;

        let upload_part_size = env::var("MINIO_UPLOAD_PART_SIZE")
            .unwrap_or_else(|_| Self::DEFAULT_UPLOAD_PART_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| "MINIO_UPLOAD_PART_SIZE must be a valid number".to_string())?;

        let config = Self {
            endpoint,
            access_key,
            secret_key,
            bucket,
            region,
            presigned_url_expiry_secs,
            upload_part_size,
        };
        config.validate()?;

        Ok(config)
    }

    /// Check the limits the S3 protocol imposes on these values
    pub fn validate(&self) -> Result<(), String> {
        if self.bucket.trim().is_empty() {
            return Err("MINIO_BUCKET must not be empty".to_string());
        }
        if self.presigned_url_expiry_secs == 0
            || self.presigned_url_expiry_secs > Self::DEFAULT_PRESIGNED_URL_EXPIRY_SECS
        {
            return Err(format!(
                "MINIO_PRESIGNED_URL_EXPIRY_SECS must be between 1 and {}",
                Self::DEFAULT_PRESIGNED_URL_EXPIRY_SECS
            ));
        }
        if self.upload_part_size < Self::MIN_UPLOAD_PART_SIZE {
            return Err(format!(
                "MINIO_UPLOAD_PART_SIZE must be at least {} bytes",
                Self::MIN_UPLOAD_PART_SIZE
            ));
        }
        Ok(())
    }

    /// Same configuration pointed at another endpoint
    pub fn with_endpoint(&self, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StorageConfig {
        StorageConfig {
            endpoint: "http://localhost:9000".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            bucket: "uploads".to_string(),
            region: "us-east-1".to_string(),
            presigned_url_expiry_secs: 3600,
            upload_part_size: StorageConfig::DEFAULT_UPLOAD_PART_SIZE,
        }
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_small_parts() {
        let config = StorageConfig {
            upload_part_size: 1024,
            ..sample()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_expiry_over_a_week() {
        let config = StorageConfig {
            presigned_url_expiry_secs: StorageConfig::DEFAULT_PRESIGNED_URL_EXPIRY_SECS + 1,
            ..sample()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_with_endpoint_leaves_original_untouched() {
        let original = sample();
        let moved = original.with_endpoint("https://s3.example.com");

        assert_eq!(original.endpoint, "http://localhost:9000");
        assert_eq!(moved.endpoint, "https://s3.example.com");
        assert_eq!(moved.bucket, original.bucket);
    }
}
