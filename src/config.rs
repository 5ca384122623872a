/*!
 * Configuration types for chute
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Result, UploadError};

/// One kibibyte
pub const KIB: usize = 1024;

/// One mebibyte
pub const MIB: usize = KIB * 1024;

/// Default number of attempts per part
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default maximum part size (5 MiB, the S3 minimum for non-final parts)
pub const DEFAULT_PART_SIZE: usize = 5 * MIB;

/// Region used when none is given. Services without regions, like
/// DigitalOcean Spaces, still need one for request signing.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Configuration for one multipart upload
///
/// Fully resolved before [`MultipartUpload::send`](crate::MultipartUpload::send);
/// it is never mutated while an upload runs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Custom endpoint (host or URL) for S3-compatible services
    pub endpoint: Option<String>,

    /// Region used for request signing
    pub region: String,

    /// Destination bucket
    pub bucket: String,

    /// Access key ID
    pub access_key: Option<String>,

    /// Secret access key
    pub secret_key: Option<String>,

    /// Session token for temporary credentials
    pub session_token: Option<String>,

    /// Path-style addressing (MinIO, LocalStack)
    pub force_path_style: bool,

    /// Attempts per part before the upload is aborted
    pub max_retries: u32,

    /// Maximum part size in bytes
    pub max_part_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_REGION.to_string(),
            bucket: String::new(),
            access_key: None,
            secret_key: None,
            session_token: None,
            force_path_style: false,
            max_retries: DEFAULT_MAX_RETRIES,
            max_part_size: DEFAULT_PART_SIZE,
        }
    }
}

// Secrets never reach logs
impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("UploadConfig")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("access_key", &self.access_key)
            .field("secret_key", &redact(&self.secret_key))
            .field("session_token", &redact(&self.session_token))
            .field("force_path_style", &self.force_path_style)
            .field("max_retries", &self.max_retries)
            .field("max_part_size", &self.max_part_size)
            .finish()
    }
}

impl UploadConfig {
    /// Start building a configuration
    pub fn builder() -> UploadConfigBuilder {
        UploadConfigBuilder::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            UploadError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            UploadError::Configuration(format!("cannot parse {}: {}", path.display(), e))
        })
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| UploadError::Configuration(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, contents).map_err(|e| {
            UploadError::Configuration(format!("cannot write {}: {}", path.display(), e))
        })
    }

    /// Check the fields required before any network call
    ///
    /// `key` is the destination object key passed to `send`.
    pub fn validate(&self, key: &str) -> Result<()> {
        let is_blank = |v: &Option<String>| v.as_deref().map_or(true, str::is_empty);

        let mut missing = Vec::new();
        if is_blank(&self.access_key) {
            missing.push("accessKey");
        }
        if is_blank(&self.secret_key) {
            missing.push("secretKey");
        }
        if self.bucket.is_empty() {
            missing.push("bucket");
        }
        if key.is_empty() {
            missing.push("key");
        }
        if !missing.is_empty() {
            return Err(UploadError::Configuration(format!(
                "missing {}",
                english_join(&missing)
            )));
        }

        if self.max_retries == 0 {
            return Err(UploadError::Configuration(
                "maxRetries must be at least 1".to_string(),
            ));
        }
        if self.max_part_size == 0 {
            return Err(UploadError::Configuration(
                "maxPartSize must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`UploadConfig`]
#[derive(Debug, Default)]
pub struct UploadConfigBuilder {
    config: UploadConfig,
}

impl UploadConfigBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.config.region = region.into();
        self
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.bucket = bucket.into();
        self
    }

    /// Set explicit credentials
    pub fn credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.config.access_key = Some(access_key.into());
        self.config.secret_key = Some(secret_key.into());
        self
    }

    pub fn session_token(mut self, token: impl Into<String>) -> Self {
        self.config.session_token = Some(token.into());
        self
    }

    pub fn force_path_style(mut self, force: bool) -> Self {
        self.config.force_path_style = force;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the maximum part size in bytes
    pub fn max_part_size(mut self, size: usize) -> Self {
        self.config.max_part_size = size;
        self
    }

    /// Finish the configuration; validation happens when the upload starts
    pub fn build(self) -> UploadConfig {
        self.config
    }
}

/// Join words with commas and "and", the way one would in English.
/// Lists of four or more get a comma before the "and".
///
/// ```
/// use chute::config::english_join;
///
/// assert_eq!(english_join(&["accessKey", "bucket"]), "accessKey and bucket");
/// assert_eq!(english_join(&["a", "b", "c"]), "a, b and c");
/// assert_eq!(english_join(&["a", "b", "c", "d"]), "a, b, c, and d");
/// ```
pub fn english_join<S: AsRef<str>>(words: &[S]) -> String {
    match words {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [init @ .., last] => {
            let head: Vec<&str> = init.iter().map(AsRef::as_ref).collect();
            let comma = if words.len() > 3 { "," } else { "" };
            format!("{}{} and {}", head.join(", "), comma, last.as_ref())
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    #[default]
    Warn,

    /// Info, warnings, and errors
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log file path (None = stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Shorthand for log_level = debug
    #[serde(default)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn complete_config() -> UploadConfig {
        UploadConfig::builder()
            .bucket("backups")
            .credentials("AKIA", "secret")
            .build()
    }

    #[test]
    fn test_defaults() {
        let config = UploadConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_part_size, 5 * 1024 * 1024);
        assert_eq!(config.region, "us-east-1");
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_validation_lists_missing_fields() {
        let config = UploadConfig {
            secret_key: Some("secret".to_string()),
            ..Default::default()
        };
        let err = config.validate("dump.rdb").unwrap_err();
        assert_eq!(err.to_string(), "missing accessKey and bucket");

        let err = UploadConfig::default().validate("").unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing accessKey, secretKey, bucket, and key"
        );
    }

    #[test]
    fn test_empty_credentials_count_as_missing() {
        let config = UploadConfig::builder()
            .bucket("backups")
            .credentials("", "secret")
            .build();
        let err = config.validate("k").unwrap_err();
        assert_eq!(err.to_string(), "missing accessKey");
    }

    #[test]
    fn test_validation_rejects_zero_limits() {
        let config = UploadConfig {
            max_retries: 0,
            ..complete_config()
        };
        assert!(matches!(
            config.validate("k"),
            Err(UploadError::Configuration(_))
        ));

        let config = UploadConfig {
            max_part_size: 0,
            ..complete_config()
        };
        assert!(config.validate("k").is_err());
        assert!(complete_config().validate("k").is_ok());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = complete_config();
        let printed = format!("{:?}", config);
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("\"secret\""));
    }

    #[test]
    fn test_english_join() {
        let empty: [&str; 0] = [];
        assert_eq!(english_join(&empty), "");
        assert_eq!(english_join(&["bucket"]), "bucket");
        assert_eq!(english_join(&["endpoint", "region"]), "endpoint and region");
        assert_eq!(
            english_join(&["accessKey", "secretKey", "bucket"]),
            "accessKey, secretKey and bucket"
        );
        assert_eq!(
            english_join(&["endpoint", "region", "bucket", "path"]),
            "endpoint, region, bucket, and path"
        );
    }

    #[test]
    fn test_config_file_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let config = UploadConfig::builder()
            .bucket("backups")
            .endpoint("nyc3.digitaloceanspaces.com")
            .max_part_size(8 * MIB)
            .build();

        config.to_file(file.path()).unwrap();
        let loaded = UploadConfig::from_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: UploadConfig = toml::from_str("bucket = \"backups\"\n").unwrap();
        assert_eq!(config.bucket, "backups");
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.region, DEFAULT_REGION);
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
    }
}
