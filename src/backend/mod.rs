//! Multipart backend abstraction
//!
//! The upload core talks to object storage only through the
//! [`MultipartBackend`] trait. Two implementations ship with the crate:
//!
//! - [`S3Backend`]: AWS S3 and S3-compatible services via `aws-sdk-s3`
//!   (feature `s3-native`)
//! - [`MemoryBackend`]: an in-memory store with failure injection for tests
//!
//! # Example Implementation
//!
//! ```ignore
//! use chute::backend::{BackendResult, CompletedUpload, MultipartBackend, Part, UploadTarget};
//! use async_trait::async_trait;
//! use bytes::Bytes;
//!
//! struct MyBackend;
//!
//! #[async_trait]
//! impl MultipartBackend for MyBackend {
//!     async fn initiate(&self, bucket: &str, key: &str, content_type: &str) -> BackendResult<String> {
//!         // Implementation
//!     }
//!     // ... other methods
//! }
//! ```

pub mod error;
pub mod memory;

#[cfg(feature = "s3-native")]
mod s3;

pub use error::{BackendError, BackendResult};
pub use memory::{BackendCall, MemoryBackend, StoredObject};

#[cfg(feature = "s3-native")]
pub use s3::S3Backend;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Identity of one in-progress multipart upload on the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    /// Bucket holding the upload
    pub bucket: String,
    /// Destination object key
    pub key: String,
    /// Backend-assigned upload identifier
    pub upload_id: String,
}

/// A successfully uploaded part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Part number (1-based)
    pub part_number: i32,
    /// Integrity tag returned by the backend
    pub etag: String,
    /// Size of the part in bytes
    pub size: usize,
}

impl Part {
    /// Create a new part record
    pub fn new(part_number: i32, etag: String, size: usize) -> Self {
        Self {
            part_number,
            etag,
            size,
        }
    }
}

/// Result of closing a multipart upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedUpload {
    pub bucket: String,
    pub key: String,
    /// Object URL, when the backend reports one
    pub location: Option<String>,
    /// ETag of the assembled object
    pub etag: Option<String>,
}

/// Capability the upload core requires from an object store
///
/// Implementors must be `Send + Sync`; a single backend may serve many
/// concurrent uploads, each with its own [`UploadTarget`].
#[async_trait]
pub trait MultipartBackend: Send + Sync {
    /// Open a multipart upload and return its upload id
    async fn initiate(&self, bucket: &str, key: &str, content_type: &str) -> BackendResult<String>;

    /// Upload one part and return its ETag
    async fn upload_part(
        &self,
        target: &UploadTarget,
        part_number: i32,
        body: Bytes,
    ) -> BackendResult<String>;

    /// Close the upload from parts sorted by ascending part number
    async fn complete_upload(
        &self,
        target: &UploadTarget,
        parts: &[Part],
    ) -> BackendResult<CompletedUpload>;

    /// Discard the upload and every part uploaded so far
    async fn abort_upload(&self, target: &UploadTarget) -> BackendResult<()>;
}
