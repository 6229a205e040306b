//! Seasonpass Core Library
//!
//! Domain models, error taxonomy, configuration and file validation shared by
//! every seasonpass crate. The traits in [`backend`] are the seams between the
//! upload engine and the network: the API client and the storage crate
//! implement them, the worker and registration crates consume them.

pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod validation;

pub use backend::{
    CredentialProvider, ObjectUploader, PresignRequest, PresignedUrlClient, ProgressFn,
    RegistrationBackend,
};
pub use config::{EndpointPaths, UploadConfig};
pub use error::{
    AuthorizationError, BackendError, ErrorMetadata, FieldError, LogLevel, PresignError,
    RegistrationError, TransferError, UploadError, ValidationError,
};
pub use validation::FileValidator;
