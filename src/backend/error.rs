//! Error types for multipart backends
//!
//! Every backend call returns a [`BackendError`] on failure. The type is
//! `Clone` so it can be carried inside upload events.

use thiserror::Error;

/// Result type alias for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised by a [`MultipartBackend`](super::MultipartBackend)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Service error with a specific error code
    #[error("service error ({code}): {message}")]
    Service { code: String, message: String },

    /// Network or transport failure
    #[error("network error: {0}")]
    Network(String),

    /// Bucket, key or upload id does not exist
    #[error("not found ({code}): {message}")]
    NotFound { code: String, message: String },

    /// Access denied
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The backend answered but the response was unusable (e.g. no upload id)
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Unclassified SDK error
    #[error("SDK error: {0}")]
    Sdk(String),

    /// Failure injected by the in-memory backend
    #[error("injected failure: {0}")]
    Injected(String),
}

impl BackendError {
    /// Check if this error is likely transient
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Network(_) => true,
            BackendError::Service { code, .. } => is_retryable_code(code),
            BackendError::Injected(_) => true,
            BackendError::NotFound { .. }
            | BackendError::AccessDenied(_)
            | BackendError::InvalidResponse(_)
            | BackendError::Sdk(_) => false,
        }
    }

    /// Classify a service error by its S3 error code
    pub fn from_service(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        let message = message.into();
        if code == "AccessDenied" {
            BackendError::AccessDenied(message)
        } else if matches!(code.as_str(), "NoSuchBucket" | "NoSuchKey" | "NoSuchUpload") {
            BackendError::NotFound { code, message }
        } else {
            BackendError::Service { code, message }
        }
    }
}

/// Check if an S3 error code is retryable
pub(crate) fn is_retryable_code(code: &str) -> bool {
    matches!(
        code,
        "RequestTimeout" | "ServiceUnavailable" | "InternalError" | "SlowDown"
    )
}

#[cfg(feature = "s3-native")]
impl<E, R> From<aws_sdk_s3::error::SdkError<E, R>> for BackendError
where
    E: aws_sdk_s3::error::ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    fn from(error: aws_sdk_s3::error::SdkError<E, R>) -> Self {
        use aws_sdk_s3::error::SdkError;

        match error {
            SdkError::DispatchFailure(e) => {
                BackendError::Network(format!("dispatch failure: {:?}", e))
            }
            SdkError::TimeoutError(_) => BackendError::Network("request timed out".to_string()),
            SdkError::ResponseError(e) => BackendError::Network(format!("response error: {:?}", e)),
            SdkError::ServiceError(e) => {
                let err = e.err();
                BackendError::from_service(
                    err.code().unwrap_or("Unknown"),
                    err.message().unwrap_or_default(),
                )
            }
            other => BackendError::Sdk(format!("{:?}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(BackendError::Network("connection reset".to_string()).is_retryable());
        assert!(BackendError::Service {
            code: "SlowDown".to_string(),
            message: "reduce your request rate".to_string(),
        }
        .is_retryable());
        assert!(!BackendError::AccessDenied("nope".to_string()).is_retryable());
        assert!(!BackendError::from_service("NoSuchUpload", "gone").is_retryable());
    }

    #[test]
    fn test_error_display_formats() {
        let err = BackendError::Service {
            code: "InternalError".to_string(),
            message: "try again".to_string(),
        };
        assert_eq!(err.to_string(), "service error (InternalError): try again");

        let err = BackendError::from_service("NoSuchUpload", "upload abc does not exist");
        assert_eq!(err.to_string(), "not found (NoSuchUpload): upload abc does not exist");
    }

    #[test]
    fn test_service_codes_are_classified() {
        assert!(matches!(
            BackendError::from_service("NoSuchBucket", "no bucket"),
            BackendError::NotFound { ref code, .. } if code == "NoSuchBucket"
        ));
        assert_eq!(
            BackendError::from_service("AccessDenied", "denied"),
            BackendError::AccessDenied("denied".to_string())
        );
        assert!(matches!(
            BackendError::from_service("SlowDown", "later"),
            BackendError::Service { .. }
        ));
    }
}
