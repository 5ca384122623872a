//! Upload events and the channel that carries them
//!
//! A single background producer sends informational events (`Progress`,
//! `Retry`) followed by exactly one terminal event (`Complete` or `Error`).
//! [`EventSender::finish`] consumes the sender, so nothing can be sent after
//! the terminal event.

use crate::backend::CompletedUpload;
use crate::error::UploadError;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::debug;

/// Capacity of the event channel between the upload task and the caller
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Activity that occurred during an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// A part was uploaded and recorded
    Progress { part_number: i32, bytes: usize },

    /// An attempt for a part failed and the part is being retried
    Retry {
        part_number: i32,
        retry_number: u32,
        max_retries: u32,
    },

    /// The upload completed; no further events follow
    Complete {
        total_bytes: u64,
        result: CompletedUpload,
    },

    /// The upload failed; no further events follow
    Error(UploadError),
}

impl UploadEvent {
    /// Whether this event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadEvent::Complete { .. } | UploadEvent::Error(_))
    }
}

/// Outcome of a successful upload as returned by [`EventStream::wait`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub total_bytes: u64,
    pub parts: usize,
    pub retries: usize,
    pub result: CompletedUpload,
}

/// Producer half, owned by the upload task
#[derive(Debug)]
pub(crate) struct EventSender {
    tx: mpsc::Sender<UploadEvent>,
}

impl EventSender {
    /// Send an informational event
    ///
    /// A caller that dropped its stream is not an error; the upload keeps
    /// running to its terminal state.
    pub(crate) async fn emit(&self, event: UploadEvent) {
        debug_assert!(!event.is_terminal());
        if self.tx.send(event).await.is_err() {
            debug!("event stream dropped by caller");
        }
    }

    /// Send the terminal event and close the channel
    pub(crate) async fn finish(self, event: UploadEvent) {
        debug_assert!(event.is_terminal());
        if self.tx.send(event).await.is_err() {
            debug!("event stream dropped before terminal event");
        }
    }
}

/// Consumer half returned by [`MultipartUpload::send`](crate::MultipartUpload::send)
///
/// # Example
///
/// ```no_run
/// # use chute::{EventStream, UploadEvent};
/// # async fn listen(mut events: EventStream) {
/// while let Some(event) = events.recv().await {
///     match event {
///         UploadEvent::Progress { part_number, bytes } => {
///             println!("uploaded part #{} ({} bytes)", part_number, bytes)
///         }
///         UploadEvent::Retry { part_number, retry_number, max_retries } => {
///             println!("retrying part #{} (try {} of {})", part_number, retry_number, max_retries)
///         }
///         UploadEvent::Complete { total_bytes, .. } => println!("done, {} bytes", total_bytes),
///         UploadEvent::Error(e) => println!("failed: {}", e),
///     }
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<UploadEvent>,
}

pub(crate) fn channel() -> (EventSender, EventStream) {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    (EventSender { tx }, EventStream { rx })
}

impl EventStream {
    /// Receive the next event; `None` once the terminal event was delivered
    pub async fn recv(&mut self) -> Option<UploadEvent> {
        self.rx.recv().await
    }

    /// Drain the stream and return the outcome
    pub async fn wait(mut self) -> Result<UploadSummary, UploadError> {
        let mut parts = 0;
        let mut retries = 0;

        while let Some(event) = self.rx.recv().await {
            match event {
                UploadEvent::Progress { .. } => parts += 1,
                UploadEvent::Retry { .. } => retries += 1,
                UploadEvent::Complete {
                    total_bytes,
                    result,
                } => {
                    return Ok(UploadSummary {
                        total_bytes,
                        parts,
                        retries,
                        result,
                    })
                }
                UploadEvent::Error(e) => return Err(e),
            }
        }

        // The task panicked before reporting
        Err(UploadError::TaskFailed(
            "ended without a terminal event".to_string(),
        ))
    }
}

impl Stream for EventStream {
    type Item = UploadEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
