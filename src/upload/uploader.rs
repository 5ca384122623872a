//! Single-part upload with bounded, immediate retry

use super::event::{EventSender, UploadEvent};
use super::session::Session;
use crate::backend::{MultipartBackend, Part};
use crate::error::UploadError;
use bytes::Bytes;
use tracing::{debug, error, warn};

/// Uploads one chunk as a numbered part
///
/// Makes up to `max_retries` attempts. Every failed attempt but the last
/// emits a `Retry` event and retries right away; there is no backoff.
pub(crate) struct PartUploader<'a> {
    backend: &'a dyn MultipartBackend,
    events: &'a EventSender,
    max_retries: u32,
}

impl<'a> PartUploader<'a> {
    pub(crate) fn new(
        backend: &'a dyn MultipartBackend,
        events: &'a EventSender,
        max_retries: u32,
    ) -> Self {
        Self {
            backend,
            events,
            max_retries,
        }
    }

    pub(crate) async fn upload_part(
        &self,
        session: &Session,
        chunk: Bytes,
        part_number: i32,
    ) -> Result<Part, UploadError> {
        let size = chunk.len();
        let mut attempt = 1;

        loop {
            // Bytes clones share the buffer
            match self
                .backend
                .upload_part(session.target(), part_number, chunk.clone())
                .await
            {
                Ok(etag) => {
                    debug!(part_number, attempt, size, "part uploaded");
                    return Ok(Part::new(part_number, etag, size));
                }
                Err(e) if attempt >= self.max_retries => {
                    error!(part_number, attempts = attempt, error = %e, "part upload failed");
                    return Err(UploadError::PartUpload {
                        part_number,
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(
                        part_number,
                        attempt,
                        max_retries = self.max_retries,
                        retryable = e.is_retryable(),
                        error = %e,
                        "retrying part"
                    );
                    self.events
                        .emit(UploadEvent::Retry {
                            part_number,
                            retry_number: attempt,
                            max_retries: self.max_retries,
                        })
                        .await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendCall, BackendError, MemoryBackend};
    use crate::upload::event::channel;

    async fn open_session(backend: &MemoryBackend) -> Session {
        let upload_id = backend
            .initiate("bucket", "key", "application/octet-stream")
            .await
            .unwrap();
        Session::new(crate::backend::UploadTarget {
            bucket: "bucket".to_string(),
            key: "key".to_string(),
            upload_id,
        })
    }

    fn part_attempts(backend: &MemoryBackend) -> usize {
        backend
            .calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::UploadPart { .. }))
            .count()
    }

    #[tokio::test]
    async fn test_success_emits_nothing() {
        let backend = MemoryBackend::new();
        let session = open_session(&backend).await;
        let (tx, mut events) = channel();

        let part = PartUploader::new(&backend, &tx, 3)
            .upload_part(&session, Bytes::from_static(b"abc"), 1)
            .await
            .unwrap();
        assert_eq!(part.part_number, 1);
        assert_eq!(part.size, 3);

        drop(tx);
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let backend = MemoryBackend::new();
        let session = open_session(&backend).await;
        backend.fail_part(1, 2);
        let (tx, mut events) = channel();

        PartUploader::new(&backend, &tx, 3)
            .upload_part(&session, Bytes::from_static(b"abc"), 1)
            .await
            .unwrap();
        drop(tx);

        let mut retries = Vec::new();
        while let Some(event) = events.recv().await {
            retries.push(event);
        }
        assert_eq!(
            retries,
            vec![
                UploadEvent::Retry {
                    part_number: 1,
                    retry_number: 1,
                    max_retries: 3
                },
                UploadEvent::Retry {
                    part_number: 1,
                    retry_number: 2,
                    max_retries: 3
                },
            ]
        );
        assert_eq!(part_attempts(&backend), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_cause() {
        let backend = MemoryBackend::new();
        let session = open_session(&backend).await;
        backend.fail_part(1, 10);
        let (tx, _events) = channel();

        let err = PartUploader::new(&backend, &tx, 3)
            .upload_part(&session, Bytes::from_static(b"abc"), 1)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            UploadError::PartUpload {
                part_number: 1,
                attempts: 3,
                source: BackendError::Injected("part 1 rejected".to_string()),
            }
        );
        assert_eq!(part_attempts(&backend), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_never_retries() {
        let backend = MemoryBackend::new();
        let session = open_session(&backend).await;
        backend.fail_part(1, 1);
        let (tx, mut events) = channel();

        let result = PartUploader::new(&backend, &tx, 1)
            .upload_part(&session, Bytes::from_static(b"x"), 1)
            .await;
        assert!(result.is_err());

        drop(tx);
        assert!(events.recv().await.is_none());
    }
}
