/*!
 * Chute - streaming multipart uploads to S3-compatible object storage
 *
 * Reads an unbounded byte stream, cuts it into fixed-size parts, and uploads
 * them through a multipart session:
 * - Parts uploaded in order with bounded, immediate retry
 * - Content type sniffed from the first bytes of the stream
 * - Failed uploads aborted so no orphaned parts are left behind
 * - Progress, retries and the final outcome reported as an event stream
 */

pub mod backend;
pub mod cli_style;
pub mod config;
pub mod error;
pub mod logging;
pub mod upload;

// Re-export commonly used types
pub use backend::MultipartBackend;
pub use config::{UploadConfig, UploadConfigBuilder};
pub use error::{Result, UploadError};
pub use upload::{EventStream, MultipartUpload, UploadEvent, UploadSummary};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
