//! Dependencies shared by every upload worker.
//!
//! The queue only sees the seam traits; the API client and the object-store
//! uploader are plugged in here, tests plug in stubs.

use std::sync::Arc;

use seasonpass_core::{FileValidator, ObjectUploader, PresignedUrlClient, UploadConfig};

use crate::session::SessionManager;

#[derive(Clone)]
pub struct UploadContext {
    pub presigner: Arc<dyn PresignedUrlClient>,
    pub uploader: Arc<dyn ObjectUploader>,
    pub validator: FileValidator,
    pub sessions: Arc<SessionManager>,
    /// When set, a task without a live session fails before the presign call.
    pub presign_requires_auth: bool,
}

impl UploadContext {
    pub fn new(
        config: &UploadConfig,
        presigner: Arc<dyn PresignedUrlClient>,
        uploader: Arc<dyn ObjectUploader>,
        sessions: Arc<SessionManager>,
    ) -> Self {
        Self {
            presigner,
            uploader,
            validator: FileValidator::from_config(config),
            sessions,
            presign_requires_auth: config.presign_requires_auth,
        }
    }
}
