//! Registration drafts and the create -> upload -> finalize orchestrator.
//!
//! The three registration flows (resident, company, generic upload) share one
//! engine; [`forms`] holds what differs between them.

pub mod draft;
pub mod forms;
pub mod orchestrator;

pub use draft::{FormFields, RegistrationDraft};
pub use orchestrator::{RegistrationOrchestrator, SubmissionOutcome, SubmissionState};
