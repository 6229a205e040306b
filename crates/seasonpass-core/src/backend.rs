//! Backend seam traits.
//!
//! The upload engine talks to the outside world only through these traits.
//! `seasonpass-api-client` implements the backend-facing ones,
//! `seasonpass-storage` implements [`ObjectUploader`]; tests substitute
//! in-memory stubs.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{AuthorizationError, BackendError, PresignError, TransferError};
use crate::models::{FormKind, LocalFile, UploadAuthorization, UploadCategory, UploadTarget};

/// Progress callback: `(bytes_sent, bytes_total)`.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Exchanges a bot-check verification token for an upload authorization.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn authorize(
        &self,
        verification_token: &str,
    ) -> Result<UploadAuthorization, AuthorizationError>;
}

/// Parameters of a single write-URL request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignRequest<'a> {
    pub registration_id: &'a str,
    pub category: UploadCategory,
    pub file_name: &'a str,
    pub content_type: &'a str,
    /// Free-text plate number; encoded by the implementation.
    pub plate_number: Option<&'a str>,
    pub document_type: Option<&'a str>,
}

/// Issues a write URL and storage key for one file. Never moves bytes.
#[async_trait]
pub trait PresignedUrlClient: Send + Sync {
    async fn get_upload_target(
        &self,
        request: &PresignRequest<'_>,
        bearer: Option<&str>,
    ) -> Result<UploadTarget, PresignError>;
}

/// Pushes a file's bytes to a pre-signed URL. Does not retry.
#[async_trait]
pub trait ObjectUploader: Send + Sync {
    async fn upload(
        &self,
        write_url: &str,
        file: &LocalFile,
        on_progress: ProgressFn,
    ) -> Result<(), TransferError>;
}

/// Creation and finalization of registration records.
#[async_trait]
pub trait RegistrationBackend: Send + Sync {
    /// Create the record from form values; returns the registration identity.
    async fn create_registration(
        &self,
        kind: FormKind,
        body: &serde_json::Value,
    ) -> Result<String, BackendError>;

    /// Commit the record with the collected storage keys. Returns the id the
    /// backend echoes back, when it sends one.
    async fn finalize_registration(
        &self,
        kind: FormKind,
        body: &serde_json::Value,
    ) -> Result<Option<String>, BackendError>;
}
