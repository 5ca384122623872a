//! Upload orchestration state machine
//!
//! Drives the chunker, part uploader, session and finalizer on a background
//! task and reports everything through the event channel.

use super::chunker::Chunker;
use super::event::{channel, EventSender, EventStream, UploadEvent, UploadSummary};
use super::finalizer::Finalizer;
use super::session::{Session, UploadState};
use super::sniff::detect_content_type;
use super::uploader::PartUploader;
use crate::backend::{CompletedUpload, MultipartBackend, UploadTarget};
use crate::config::UploadConfig;
use crate::error::UploadError;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, error, info, info_span, Instrument};

/// Multipart uploads to one backend with one configuration
///
/// Each call to [`send`](Self::send) runs an independent upload with its own
/// remote session and part counter.
///
/// # Example
///
/// ```no_run
/// use chute::backend::MemoryBackend;
/// use chute::{MultipartUpload, UploadConfig, UploadEvent};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let config = UploadConfig::builder()
///         .bucket("my-fave-bucket")
///         .credentials("ACCESS", "SECRET")
///         .build();
///
///     let upload = MultipartUpload::new(config, Arc::new(MemoryBackend::new()));
///     let file = tokio::fs::File::open("big-redis-dump.rdb").await.unwrap();
///
///     let mut events = upload.send(file, "backups/dump.rdb");
///     while let Some(event) = events.recv().await {
///         match event {
///             UploadEvent::Complete { .. } => println!("It worked!"),
///             UploadEvent::Error(e) => println!("Rats, it didn't work: {}", e),
///             _ => {}
///         }
///     }
/// }
/// ```
#[derive(Clone)]
pub struct MultipartUpload {
    config: Arc<UploadConfig>,
    backend: Arc<dyn MultipartBackend>,
}

impl MultipartUpload {
    pub fn new(config: UploadConfig, backend: Arc<dyn MultipartBackend>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
        }
    }

    /// Upload through an S3 client built from `config`
    #[cfg(feature = "s3-native")]
    pub async fn s3(config: UploadConfig) -> Self {
        let backend = crate::backend::S3Backend::connect(&config).await;
        Self::new(config, Arc::new(backend))
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Start uploading `reader` to `key` on a background task
    ///
    /// Must be called from within a Tokio runtime. The returned stream yields
    /// informational events followed by exactly one `Complete` or `Error`.
    pub fn send<R>(&self, reader: R, key: impl Into<String>) -> EventStream
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let key = key.into();
        let span = info_span!("upload", bucket = %self.config.bucket, key = %key);
        let (tx, events) = channel();

        let orchestrator = Orchestrator {
            config: Arc::clone(&self.config),
            backend: Arc::clone(&self.backend),
            key,
            state: UploadState::Uninitialized,
            target: None,
        };
        tokio::spawn(orchestrator.run(reader, tx).instrument(span));

        events
    }

    /// Upload and wait for the outcome, discarding informational events
    pub async fn upload<R>(&self, reader: R, key: impl Into<String>) -> Result<UploadSummary, UploadError>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.send(reader, key).wait().await
    }
}

struct Orchestrator {
    config: Arc<UploadConfig>,
    backend: Arc<dyn MultipartBackend>,
    key: String,
    state: UploadState,
    /// Remote session, once initiated
    target: Option<UploadTarget>,
}

impl Orchestrator {
    async fn run<R>(mut self, reader: R, events: EventSender)
    where
        R: AsyncRead + Unpin,
    {
        let outcome = AssertUnwindSafe(self.drive(reader, &events))
            .catch_unwind()
            .await;

        let terminal = match outcome {
            Ok(Ok((total_bytes, result))) => UploadEvent::Complete {
                total_bytes,
                result,
            },
            Ok(Err(e)) => {
                error!(error = %e, "upload failed");
                UploadEvent::Error(e)
            }
            Err(panic) => {
                let e = self.recover(panic).await;
                error!(error = %e, "upload task panicked");
                UploadEvent::Error(e)
            }
        };
        debug_assert!(self.state.is_terminal());
        events.finish(terminal).await;
    }

    fn transition(&mut self, next: UploadState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    /// Turn a panic in the driver into a terminal error
    ///
    /// A session still uploading parts is aborted. One that was completing or
    /// already aborting is left alone.
    async fn recover(&mut self, panic: Box<dyn Any + Send>) -> UploadError {
        let cause = UploadError::TaskFailed(format!("panicked: {}", panic_message(&*panic)));

        let target = match (self.state, self.target.take()) {
            (UploadState::Active, Some(target)) => target,
            _ => return self.fail(cause),
        };

        self.transition(UploadState::Aborting);
        let aborted = AssertUnwindSafe(self.backend.abort_upload(&target))
            .catch_unwind()
            .await;

        let reported = match aborted {
            Ok(Ok(())) => cause,
            Ok(Err(abort)) => UploadError::Aborted {
                cause: Box::new(cause),
                abort,
            },
            Err(_) => UploadError::TaskFailed(format!(
                "{}; abort of upload {} also panicked",
                cause, target.upload_id
            )),
        };
        self.fail(reported)
    }

    fn fail(&mut self, cause: UploadError) -> UploadError {
        self.transition(UploadState::Failed);
        cause
    }

    async fn drive<R>(
        &mut self,
        reader: R,
        events: &EventSender,
    ) -> Result<(u64, CompletedUpload), UploadError>
    where
        R: AsyncRead + Unpin,
    {
        if let Err(e) = self.config.validate(&self.key) {
            return Err(self.fail(e));
        }

        let backend = Arc::clone(&self.backend);
        let uploader = PartUploader::new(backend.as_ref(), events, self.config.max_retries);
        let finalizer = Finalizer::new(backend.as_ref());
        let mut chunker = Chunker::new(reader, self.config.max_part_size);

        // The session is opened lazily so the content type comes from real bytes
        let mut chunk = match chunker.next_chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return Err(self.fail(UploadError::EmptyInput)),
            Err(e) => return Err(self.fail(UploadError::StreamRead(e.to_string()))),
        };
        let mut session = self.open_session(&chunk).await?;

        loop {
            let part_number = session.next_part_number();
            let bytes = chunk.len();

            match uploader.upload_part(&session, chunk, part_number).await {
                Ok(part) => session.record(part),
                Err(cause) => return Err(self.abort(&finalizer, &session, cause).await),
            }
            self.transition(UploadState::Active);
            events
                .emit(UploadEvent::Progress { part_number, bytes })
                .await;

            chunk = match chunker.next_chunk().await {
                Ok(Some(next)) => next,
                Ok(None) => break,
                Err(e) => {
                    let cause = UploadError::StreamRead(e.to_string());
                    return Err(self.abort(&finalizer, &session, cause).await);
                }
            };
        }

        self.transition(UploadState::Completing);
        match finalizer.complete(&session).await {
            Ok(result) => {
                self.transition(UploadState::Done);
                Ok((session.total_bytes(), result))
            }
            // Parts are already stored server-side; abort is not attempted
            Err(e) => Err(self.fail(UploadError::Completion(e))),
        }
    }

    async fn open_session(&mut self, first_chunk: &[u8]) -> Result<Session, UploadError> {
        let content_type = detect_content_type(first_chunk, &self.key);

        let upload_id = match self
            .backend
            .initiate(&self.config.bucket, &self.key, &content_type)
            .await
        {
            Ok(upload_id) => upload_id,
            Err(e) => return Err(self.fail(UploadError::Initiate(e))),
        };

        info!(%upload_id, %content_type, "multipart upload initiated");
        self.transition(UploadState::Active);

        let target = UploadTarget {
            bucket: self.config.bucket.clone(),
            key: self.key.clone(),
            upload_id,
        };
        self.target = Some(target.clone());
        Ok(Session::new(target))
    }

    async fn abort(
        &mut self,
        finalizer: &Finalizer<'_>,
        session: &Session,
        cause: UploadError,
    ) -> UploadError {
        self.transition(UploadState::Aborting);

        let reported = match finalizer.abort(session).await {
            Ok(()) => cause,
            Err(abort) => {
                error!(error = %abort, "abort failed; the multipart upload may be left dangling");
                UploadError::Aborted {
                    cause: Box::new(cause),
                    abort,
                }
            }
        };

        self.fail(reported)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
