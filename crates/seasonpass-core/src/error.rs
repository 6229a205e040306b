//! Error types module
//!
//! Per-file failures (`ValidationError`, `AuthorizationError`, `PresignError`,
//! `TransferError`) are folded into [`UploadError`] and captured inside an
//! `UploadResult`; they never cross the queue boundary. Only
//! [`RegistrationError`] is surfaced to the user by the orchestrator.

use serde::{Deserialize, Serialize};

use crate::models::UploadCategory;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected failures such as bad user input
    Debug,
    /// Recoverable issues such as a single failed transfer
    Warn,
    /// Failures that end a submission attempt
    Error,
}

/// Metadata describing how an error should be presented and logged.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "TRANSFER_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether resubmitting the same data may succeed
    fn is_recoverable(&self) -> bool;

    /// User-facing message
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// A field-level rejection reported by the backend validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Failure talking to the registration backend or the object store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Validation failed: {}", format_fields(.fields))]
    Validation { fields: Vec<FieldError> },

    #[error("Backend reported failure: {0}")]
    Unsuccessful(String),

    #[error("Invalid response: {0}")]
    Decode(String),
}

fn format_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| format!("{}: {}", f.field, f.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl BackendError {
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            BackendError::Validation { .. } => Some(400),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }
}

/// Client-side rejection of a file or form field. Advisory only: the backend
/// re-validates everything.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{name}: File size exceeds {max_mb}MB limit")]
    FileTooLarge { name: String, size: u64, max_mb: u64 },

    #[error("{name}: File type not allowed. Allowed types: {allowed}")]
    TypeNotAllowed { name: String, allowed: String },

    #[error("{name}: File type not recognized. Allowed: {allowed}")]
    TypeNotRecognized { name: String, allowed: String },

    #[error("At most {max} file(s) may be attached as {}", .category.label())]
    TooManyFiles { category: UploadCategory, max: usize },

    #[error("At most {max} plate number(s) may be registered")]
    TooManyPlateRows { max: usize },

    #[error("Plate row {row} does not exist")]
    UnknownPlateRow { row: usize },

    #[error("{} is not accepted by this form", .category.label())]
    CategoryNotAccepted { category: UploadCategory },
}

/// Missing, expired or rejected upload authorization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthorizationError {
    #[error("Please complete the security verification.")]
    Missing,

    #[error("Upload authorization has expired; please verify again.")]
    Expired,

    #[error("Upload authorization rejected: {0}")]
    Rejected(String),

    #[error("Failed to obtain upload authorization: {0}")]
    Backend(#[from] BackendError),
}

/// Failure to obtain a write URL for a file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresignError {
    #[error("Failed to get upload URL: {0}")]
    Backend(#[from] BackendError),

    #[error("Upload URL response was incomplete: {0}")]
    InvalidTarget(String),
}

/// Failure pushing bytes to the object store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("Failed to read file: {0}")]
    Io(String),

    #[error("Upload to storage failed: {0}")]
    Backend(#[from] BackendError),
}

/// Everything that can go wrong with a single file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error(transparent)]
    Presign(#[from] PresignError),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("Upload aborted: {0}")]
    Aborted(String),
}

/// Failure of a whole submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Registration is not enabled for this location")]
    RegistrationDisabled,

    #[error("{0}")]
    NotAuthorized(AuthorizationError),

    #[error("Missing required documents: {}", .0.join("; "))]
    MissingDocuments(Vec<String>),

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Failed to create registration: {0}")]
    Create(BackendError),

    #[error("{} file(s) failed to upload: {}", .failed.len(), .failed.join(", "))]
    UploadsFailed { failed: Vec<String> },

    #[error("Not all files were successfully uploaded ({actual} of {expected} results)")]
    ResultCountMismatch { expected: usize, actual: usize },

    #[error("{0} not found in successful uploads")]
    MissingStorageKey(String),

    #[error("Failed to finalize registration {registration_id}: {source}")]
    Finalize {
        registration_id: String,
        source: BackendError,
    },
}

/// Static metadata for each variant: (error_code, recoverable, log_level).
fn registration_error_static_metadata(err: &RegistrationError) -> (&'static str, bool, LogLevel) {
    match err {
        RegistrationError::RegistrationDisabled => ("REGISTRATION_DISABLED", false, LogLevel::Debug),
        RegistrationError::NotAuthorized(_) => ("NOT_AUTHORIZED", true, LogLevel::Debug),
        RegistrationError::MissingDocuments(_) => ("MISSING_DOCUMENTS", false, LogLevel::Debug),
        RegistrationError::Validation(_) => ("VALIDATION_ERROR", false, LogLevel::Debug),
        RegistrationError::Create(_) => ("CREATE_ERROR", true, LogLevel::Error),
        RegistrationError::UploadsFailed { .. } => ("UPLOADS_FAILED", true, LogLevel::Warn),
        RegistrationError::ResultCountMismatch { .. } => {
            ("RESULT_COUNT_MISMATCH", true, LogLevel::Error)
        }
        RegistrationError::MissingStorageKey(_) => ("MISSING_STORAGE_KEY", true, LogLevel::Error),
        RegistrationError::Finalize { .. } => ("FINALIZE_ERROR", true, LogLevel::Error),
    }
}

impl ErrorMetadata for RegistrationError {
    fn error_code(&self) -> &'static str {
        registration_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        registration_error_static_metadata(self).1
    }

    fn client_message(&self) -> String {
        match self {
            RegistrationError::Create(source @ BackendError::Validation { .. })
            | RegistrationError::Finalize {
                source: source @ BackendError::Validation { .. },
                ..
            } => source.to_string(),
            RegistrationError::Create(_) => {
                "Failed to create registration. Please try again.".to_string()
            }
            RegistrationError::Finalize { .. } => {
                "Files were uploaded but the registration could not be finalized. Please submit again."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        registration_error_static_metadata(self).2
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        match self {
            UploadError::Validation(_) => "VALIDATION_ERROR",
            UploadError::Authorization(_) => "AUTHORIZATION_ERROR",
            UploadError::Presign(_) => "PRESIGN_ERROR",
            UploadError::Transfer(_) => "TRANSFER_ERROR",
            UploadError::Aborted(_) => "UPLOAD_ABORTED",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, UploadError::Validation(_))
    }

    fn client_message(&self) -> String {
        self.to_string()
    }

    fn log_level(&self) -> LogLevel {
        match self {
            UploadError::Validation(_) | UploadError::Authorization(_) => LogLevel::Debug,
            UploadError::Presign(_) | UploadError::Transfer(_) => LogLevel::Warn,
            UploadError::Aborted(_) => LogLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploads_failed_lists_file_names() {
        let err = RegistrationError::UploadsFailed {
            failed: vec!["spa.pdf".into(), "bill.png".into()],
        };
        assert_eq!(err.to_string(), "2 file(s) failed to upload: spa.pdf, bill.png");
        assert_eq!(err.error_code(), "UPLOADS_FAILED");
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn backend_validation_message_joins_fields() {
        let err = BackendError::Validation {
            fields: vec![
                FieldError {
                    field: "ContactEmail".into(),
                    message: "Invalid email format".into(),
                },
                FieldError {
                    field: "ResidentName".into(),
                    message: "Too short".into(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "Validation failed: ContactEmail: Invalid email format, ResidentName: Too short"
        );
        let reg = RegistrationError::Create(err);
        assert!(reg.client_message().starts_with("Validation failed: ContactEmail"));
    }

    #[test]
    fn create_failures_hide_transport_detail() {
        let err = RegistrationError::Create(BackendError::Network("connection refused".into()));
        assert_eq!(
            err.client_message(),
            "Failed to create registration. Please try again."
        );
        assert!(err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn unauthorized_statuses_are_detected() {
        let err = BackendError::Status {
            status: 401,
            message: "invalid token".into(),
        };
        assert!(err.is_unauthorized());
        assert!(!BackendError::Network("x".into()).is_unauthorized());
    }

    #[test]
    fn upload_error_metadata() {
        let err: UploadError = TransferError::Backend(BackendError::Status {
            status: 403,
            message: "SignatureDoesNotMatch".into(),
        })
        .into();
        assert_eq!(err.error_code(), "TRANSFER_ERROR");
        assert!(err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Warn);

        let err: UploadError = ValidationError::FileTooLarge {
            name: "big.pdf".into(),
            size: 1,
            max_mb: 1,
        }
        .into();
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "big.pdf: File size exceeds 1MB limit");
    }
}
