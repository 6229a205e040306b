//! Submission orchestrator
//!
//! Sequences one submission attempt: gate -> session -> local checks ->
//! create -> upload all -> finalize. Finalize only runs when every upload of
//! the attempt succeeded. Files uploaded by an earlier attempt stay done and
//! are not sent again.

use std::sync::Arc;

use seasonpass_core::models::{FormKind, LocationSettings, TaskId, UploadTask};
use seasonpass_core::{ErrorMetadata, LogLevel, RegistrationBackend, RegistrationError};
use seasonpass_worker::{ConcurrentUploadQueue, UploadEventSender};

use crate::draft::RegistrationDraft;
use crate::forms;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub kind: FormKind,
    pub registration_id: String,
    /// Id echoed by the finalize call, when the backend sends one.
    pub finalized_id: Option<String>,
    /// Files transferred during this attempt.
    pub uploaded: usize,
    /// Files already done from an earlier attempt.
    pub reused: usize,
}

pub struct RegistrationOrchestrator {
    backend: Arc<dyn RegistrationBackend>,
    queue: ConcurrentUploadQueue,
    registration_enabled: bool,
    events: Option<UploadEventSender>,
    state: SubmissionState,
}

impl RegistrationOrchestrator {
    pub fn new(backend: Arc<dyn RegistrationBackend>, queue: ConcurrentUploadQueue) -> Self {
        Self {
            backend,
            queue,
            registration_enabled: true,
            events: None,
            state: SubmissionState::Idle,
        }
    }

    /// Apply the parking location's registration gate.
    pub fn with_location_settings(mut self, settings: LocationSettings) -> Self {
        self.registration_enabled = settings.enable_registration;
        self
    }

    pub fn with_events(mut self, events: UploadEventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn queue(&self) -> &ConcurrentUploadQueue {
        &self.queue
    }

    /// Run one submission attempt. The draft is cleared on success; on failure
    /// it keeps the form values and every per-file status recorded so far.
    #[tracing::instrument(skip_all, fields(kind = %draft.kind()))]
    pub async fn submit(
        &mut self,
        draft: &mut RegistrationDraft,
    ) -> Result<SubmissionOutcome, RegistrationError> {
        self.state = SubmissionState::Submitting;

        let result = self.run_attempt(draft).await;

        match &result {
            Ok(outcome) => {
                self.state = SubmissionState::Succeeded;
                tracing::info!(
                    registration_id = %outcome.registration_id,
                    uploaded = outcome.uploaded,
                    reused = outcome.reused,
                    "Registration submitted"
                );
            }
            Err(e) => {
                self.state = SubmissionState::Failed;
                match e.log_level() {
                    LogLevel::Debug => {
                        tracing::debug!(error = %e, error_code = e.error_code(), "Submission rejected")
                    }
                    LogLevel::Warn => {
                        tracing::warn!(error = %e, error_code = e.error_code(), "Submission failed")
                    }
                    LogLevel::Error => {
                        tracing::error!(error = %e, error_code = e.error_code(), "Submission failed")
                    }
                }
            }
        }

        result
    }

    async fn run_attempt(
        &self,
        draft: &mut RegistrationDraft,
    ) -> Result<SubmissionOutcome, RegistrationError> {
        if !self.registration_enabled {
            return Err(RegistrationError::RegistrationDisabled);
        }

        let sessions = &self.queue.context().sessions;
        if let Err(e) = sessions.bearer().await {
            return Err(RegistrationError::NotAuthorized(e));
        }

        let missing = draft.missing_requirements();
        if !missing.is_empty() {
            return Err(RegistrationError::MissingDocuments(missing));
        }

        let mut problems = forms::validate_fields(draft.fields());
        let validator = &self.queue.context().validator;
        problems.extend(
            draft
                .files()
                .iter()
                .filter(|t| t.is_submittable())
                .filter_map(|t| t.file.as_ref())
                .filter_map(|f| validator.validate(f).err())
                .map(|e| e.to_string()),
        );
        if !problems.is_empty() {
            return Err(RegistrationError::Validation(problems));
        }

        let kind = draft.kind();
        let body = forms::create_body(draft.fields()).map_err(RegistrationError::Create)?;
        let registration_id = self
            .backend
            .create_registration(kind, &body)
            .await
            .map_err(RegistrationError::Create)?;

        let tasks = draft.upload_tasks();
        let submitted: Vec<TaskId> = tasks
            .iter()
            .filter(|t| t.is_submittable())
            .map(|t| t.id)
            .collect();
        let reused = tasks.len() - submitted.len();

        let results = self
            .queue
            .run(&registration_id, tasks, self.events.clone())
            .await;
        draft.apply_results(&results);

        let mut failed: Vec<String> = results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.file_name.clone())
            .collect();
        if !failed.is_empty() {
            failed.sort();
            return Err(RegistrationError::UploadsFailed { failed });
        }

        let all_reported = submitted
            .iter()
            .all(|id| results.iter().any(|r| r.task_id == *id));
        if results.len() != submitted.len() || !all_reported {
            return Err(RegistrationError::ResultCountMismatch {
                expected: submitted.len(),
                actual: results.len(),
            });
        }

        let finalized_id = match forms::finalize_body(draft, &registration_id)? {
            Some(body) => self
                .backend
                .finalize_registration(kind, &body)
                .await
                .map_err(|source| RegistrationError::Finalize {
                    registration_id: registration_id.clone(),
                    source,
                })?,
            None => None,
        };

        draft.clear();

        Ok(SubmissionOutcome {
            kind,
            registration_id,
            finalized_id,
            uploaded: submitted.len(),
            reused,
        })
    }
}

/// Names of files whose last attempt failed, for display.
pub fn failed_files(draft: &RegistrationDraft) -> Vec<&str> {
    draft
        .files()
        .iter()
        .filter(|t| matches!(t.status, seasonpass_core::models::FileStatus::Failed { .. }))
        .map(UploadTask::file_name)
        .collect()
}
