//! Completion and abort of the remote session

use super::session::Session;
use crate::backend::{BackendResult, CompletedUpload, MultipartBackend};
use tracing::{info, warn};

pub(crate) struct Finalizer<'a> {
    backend: &'a dyn MultipartBackend,
}

impl<'a> Finalizer<'a> {
    pub(crate) fn new(backend: &'a dyn MultipartBackend) -> Self {
        Self { backend }
    }

    /// Commit the session from its ordered part list
    pub(crate) async fn complete(&self, session: &Session) -> BackendResult<CompletedUpload> {
        let result = self
            .backend
            .complete_upload(session.target(), session.parts())
            .await?;
        info!(
            upload_id = session.upload_id(),
            parts = session.parts().len(),
            bytes = session.total_bytes(),
            "multipart upload completed"
        );
        Ok(result)
    }

    /// Discard the session and its parts; valid with zero parts uploaded
    pub(crate) async fn abort(&self, session: &Session) -> BackendResult<()> {
        warn!(
            upload_id = session.upload_id(),
            parts = session.parts().len(),
            "aborting multipart upload"
        );
        self.backend.abort_upload(session.target()).await
    }
}
