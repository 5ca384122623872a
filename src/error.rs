/*!
 * Error types for chute
 */

use thiserror::Error;

use crate::backend::BackendError;

pub type Result<T> = std::result::Result<T, UploadError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Terminal failure of an upload
///
/// Every failure path of an upload ends in exactly one of these, delivered as
/// [`UploadEvent::Error`](crate::UploadEvent::Error).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// A required field is missing or a limit is invalid
    #[error("{0}")]
    Configuration(String),

    /// The input source failed mid-read
    #[error("stream read error: {0}")]
    StreamRead(String),

    /// The remote multipart session could not be opened
    #[error("could not initiate upload: {0}")]
    Initiate(#[source] BackendError),

    /// A part exhausted all of its attempts
    #[error("part {part_number} failed after {attempts} attempts: {source}")]
    PartUpload {
        part_number: i32,
        attempts: u32,
        #[source]
        source: BackendError,
    },

    /// The final commit call failed
    #[error("could not complete upload: {0}")]
    Completion(#[source] BackendError),

    /// Cleanup failed after an upstream failure; the remote session may
    /// still exist
    #[error("upload error: {cause}, as well as an error aborting the upload: {abort}")]
    Aborted {
        cause: Box<UploadError>,
        abort: BackendError,
    },

    /// The source produced no bytes, so no object was created
    #[error("input stream was empty; nothing was uploaded")]
    EmptyInput,

    /// The upload task stopped without reporting an outcome
    #[error("upload task failed: {0}")]
    TaskFailed(String),
}

impl UploadError {
    /// The failure that started it all, looking through a failed abort
    pub fn root_cause(&self) -> &UploadError {
        match self {
            UploadError::Aborted { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Whether a remote multipart session may have been left behind
    pub fn may_leave_dangling_session(&self) -> bool {
        matches!(self, UploadError::Aborted { .. })
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            UploadError::Configuration(_) => EXIT_USAGE,
            _ => EXIT_FAILED,
        }
    }
}
