//! Object-store transfer for seasonpass uploads.
//!
//! Files are never proxied through the registration backend: the backend
//! hands out a pre-signed write URL and this crate PUTs the bytes straight to
//! the object store, reporting progress as chunks leave the process.

pub mod http;

pub use http::HttpObjectUploader;
pub use seasonpass_core::{ObjectUploader, ProgressFn, TransferError};
