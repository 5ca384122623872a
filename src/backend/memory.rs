//! In-memory multipart backend for testing
//!
//! Stores uploads and assembled objects in memory, records every call, and
//! lets tests inject failures into any step of the protocol.

use super::error::{BackendError, BackendResult};
use super::{CompletedUpload, MultipartBackend, Part, UploadTarget};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::{BTreeMap, HashMap};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Initiate {
        bucket: String,
        key: String,
        content_type: String,
    },
    UploadPart {
        part_number: i32,
        size: usize,
    },
    Complete {
        part_numbers: Vec<i32>,
    },
    Abort {
        upload_id: String,
    },
}

/// An object assembled by a completed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    content_type: String,
    parts: BTreeMap<i32, (String, Bytes)>,
}

#[derive(Debug, Default)]
struct Failures {
    initiate: bool,
    /// Remaining failing attempts per part number
    parts: HashMap<i32, u32>,
    complete: bool,
    abort: bool,
}

#[derive(Debug, Default)]
struct Inner {
    next_upload_id: u64,
    uploads: HashMap<String, PendingUpload>,
    objects: HashMap<(String, String), StoredObject>,
    calls: Vec<BackendCall>,
    failures: Failures,
}

/// In-memory [`MultipartBackend`]
///
/// Clones share the same state, so a test can keep a handle while the
/// upload task owns another.
///
/// # Example
///
/// ```rust
/// use chute::backend::MemoryBackend;
///
/// let backend = MemoryBackend::new();
/// // First two attempts of part 2 fail, the third succeeds
/// backend.fail_part(2, 2);
/// assert!(backend.calls().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every `initiate` call fail
    pub fn fail_initiate(&self) {
        self.lock().failures.initiate = true;
    }

    /// Make the next `attempts` uploads of `part_number` fail
    pub fn fail_part(&self, part_number: i32, attempts: u32) {
        self.lock().failures.parts.insert(part_number, attempts);
    }

    /// Make every `complete_upload` call fail
    pub fn fail_complete(&self) {
        self.lock().failures.complete = true;
    }

    /// Make every `abort_upload` call fail
    pub fn fail_abort(&self) {
        self.lock().failures.abort = true;
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Number of uploads that were initiated but neither completed nor aborted
    pub fn pending_uploads(&self) -> usize {
        self.lock().uploads.len()
    }

    /// Fetch an assembled object
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }
}

fn etag_for(data: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    format!("\"{:016x}\"", hasher.finish())
}

fn no_such_upload(target: &UploadTarget) -> BackendError {
    BackendError::from_service(
        "NoSuchUpload",
        format!("upload {} does not exist", target.upload_id),
    )
}

#[async_trait]
impl MultipartBackend for MemoryBackend {
    async fn initiate(&self, bucket: &str, key: &str, content_type: &str) -> BackendResult<String> {
        let mut inner = self.lock();
        inner.calls.push(BackendCall::Initiate {
            bucket: bucket.to_string(),
            key: key.to_string(),
            content_type: content_type.to_string(),
        });

        if inner.failures.initiate {
            return Err(BackendError::Injected("initiate refused".to_string()));
        }

        inner.next_upload_id += 1;
        let upload_id = format!("upload-{}", inner.next_upload_id);
        inner.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        target: &UploadTarget,
        part_number: i32,
        body: Bytes,
    ) -> BackendResult<String> {
        let mut inner = self.lock();
        inner.calls.push(BackendCall::UploadPart {
            part_number,
            size: body.len(),
        });

        if let Some(remaining) = inner.failures.parts.get_mut(&part_number) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BackendError::Injected(format!(
                    "part {} rejected",
                    part_number
                )));
            }
        }

        let upload = inner
            .uploads
            .get_mut(&target.upload_id)
            .ok_or_else(|| no_such_upload(target))?;
        let etag = etag_for(&body);
        upload.parts.insert(part_number, (etag.clone(), body));
        Ok(etag)
    }

    async fn complete_upload(
        &self,
        target: &UploadTarget,
        parts: &[Part],
    ) -> BackendResult<CompletedUpload> {
        let mut inner = self.lock();
        inner.calls.push(BackendCall::Complete {
            part_numbers: parts.iter().map(|p| p.part_number).collect(),
        });

        if inner.failures.complete {
            return Err(BackendError::Injected("complete refused".to_string()));
        }
        if parts.is_empty() {
            return Err(BackendError::Service {
                code: "MalformedXML".to_string(),
                message: "at least one part is required".to_string(),
            });
        }
        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(BackendError::Service {
                code: "InvalidPartOrder".to_string(),
                message: "parts must be listed in ascending order".to_string(),
            });
        }

        let upload = inner
            .uploads
            .get(&target.upload_id)
            .ok_or_else(|| no_such_upload(target))?;

        let mut data = BytesMut::new();
        for part in parts {
            match upload.parts.get(&part.part_number) {
                Some((etag, body)) if *etag == part.etag => data.extend_from_slice(body),
                _ => {
                    return Err(BackendError::Service {
                        code: "InvalidPart".to_string(),
                        message: format!("part {} was not uploaded", part.part_number),
                    })
                }
            }
        }

        let Some(upload) = inner.uploads.remove(&target.upload_id) else {
            return Err(no_such_upload(target));
        };
        let data = data.freeze();
        let etag = etag_for(&data);
        inner.objects.insert(
            (upload.bucket.clone(), upload.key.clone()),
            StoredObject {
                data,
                content_type: upload.content_type,
            },
        );

        Ok(CompletedUpload {
            location: Some(format!("memory://{}/{}", upload.bucket, upload.key)),
            bucket: upload.bucket,
            key: upload.key,
            etag: Some(etag),
        })
    }

    async fn abort_upload(&self, target: &UploadTarget) -> BackendResult<()> {
        let mut inner = self.lock();
        inner.calls.push(BackendCall::Abort {
            upload_id: target.upload_id.clone(),
        });

        if inner.failures.abort {
            return Err(BackendError::Injected("abort refused".to_string()));
        }

        inner
            .uploads
            .remove(&target.upload_id)
            .map(|_| ())
            .ok_or_else(|| no_such_upload(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(upload_id: String) -> UploadTarget {
        UploadTarget {
            bucket: "bucket".to_string(),
            key: "key".to_string(),
            upload_id,
        }
    }

    #[tokio::test]
    async fn test_parts_assemble_in_order() {
        let backend = MemoryBackend::new();
        let id = backend
            .initiate("bucket", "key", "text/plain")
            .await
            .unwrap();
        let target = target(id);

        let e1 = backend
            .upload_part(&target, 1, Bytes::from_static(b"hello "))
            .await
            .unwrap();
        let e2 = backend
            .upload_part(&target, 2, Bytes::from_static(b"world"))
            .await
            .unwrap();

        let parts = vec![Part::new(1, e1, 6), Part::new(2, e2, 5)];
        let done = backend.complete_upload(&target, &parts).await.unwrap();
        assert_eq!(done.key, "key");

        let object = backend.object("bucket", "key").unwrap();
        assert_eq!(&object.data[..], b"hello world");
        assert_eq!(object.content_type, "text/plain");
        assert_eq!(backend.pending_uploads(), 0);
    }

    #[tokio::test]
    async fn test_complete_rejects_unordered_parts() {
        let backend = MemoryBackend::new();
        let target = target(backend.initiate("bucket", "key", "x").await.unwrap());
        let e1 = backend
            .upload_part(&target, 1, Bytes::from_static(b"a"))
            .await
            .unwrap();
        let e2 = backend
            .upload_part(&target, 2, Bytes::from_static(b"b"))
            .await
            .unwrap();

        let parts = vec![Part::new(2, e2, 1), Part::new(1, e1, 1)];
        let err = backend.complete_upload(&target, &parts).await.unwrap_err();
        assert!(matches!(err, BackendError::Service { ref code, .. } if code == "InvalidPartOrder"));
    }

    #[tokio::test]
    async fn test_part_failure_injection_is_consumed() {
        let backend = MemoryBackend::new();
        let target = target(backend.initiate("bucket", "key", "x").await.unwrap());
        backend.fail_part(1, 2);

        for _ in 0..2 {
            assert!(backend
                .upload_part(&target, 1, Bytes::from_static(b"a"))
                .await
                .is_err());
        }
        assert!(backend
            .upload_part(&target, 1, Bytes::from_static(b"a"))
            .await
            .is_ok());
        assert_eq!(backend.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_abort_without_parts() {
        let backend = MemoryBackend::new();
        let target = target(backend.initiate("bucket", "key", "x").await.unwrap());
        assert_eq!(backend.pending_uploads(), 1);

        backend.abort_upload(&target).await.unwrap();
        assert_eq!(backend.pending_uploads(), 0);
        assert!(matches!(
            backend.abort_upload(&target).await,
            Err(BackendError::NotFound { .. })
        ));
    }
}
