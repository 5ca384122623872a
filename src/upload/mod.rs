//! Streaming multipart upload core
//!
//! A reader is cut into parts by the [`Chunker`], each part is uploaded with
//! bounded retry, and the remote session is completed at end of input or
//! aborted on failure. Callers observe the whole run through an
//! [`EventStream`].

mod chunker;
mod event;
mod finalizer;
mod orchestrator;
mod session;
mod sniff;
mod uploader;

pub use chunker::Chunker;
pub use event::{EventStream, UploadEvent, UploadSummary, EVENT_CHANNEL_CAPACITY};
pub use orchestrator::MultipartUpload;
pub use session::{Session, UploadState};
pub use sniff::{detect_content_type, SNIFF_LEN};
