use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use seasonpass_core::models::{LocalFile, UploadCategory};
use seasonpass_core::UploadConfig;
use seasonpass_registration::{FormFields, RegistrationDraft};
use seasonpass_worker::UploadEvent;

/// A draft described on disk: form values plus the files for each slot.
#[derive(Debug, Deserialize)]
pub struct Manifest {
    pub form: FormFields,
    #[serde(default)]
    pub files: Vec<ManifestFile>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestFile {
    pub category: UploadCategory,
    /// Plate row index for plate documents.
    #[serde(default)]
    pub row: Option<usize>,
    pub path: PathBuf,
}

impl Manifest {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid manifest: {}", path.display()))
    }

    /// Build a draft, resolving file paths relative to `base_dir`.
    pub async fn into_draft(self, config: &UploadConfig, base_dir: &Path) -> Result<RegistrationDraft> {
        let mut draft = RegistrationDraft::new(self.form, config);
        for entry in self.files {
            let path = if entry.path.is_absolute() {
                entry.path
            } else {
                base_dir.join(entry.path)
            };
            let file = LocalFile::from_path(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            draft
                .add_file(entry.category, entry.row, file)
                .with_context(|| format!("Cannot attach {}", path.display()))?;
        }
        Ok(draft)
    }
}

/// One log line per upload event.
pub fn log_upload_event(event: &UploadEvent) {
    match event {
        UploadEvent::Started { task_id, file_name } => {
            tracing::info!(task_id = %task_id, file_name = %file_name, "Uploading")
        }
        UploadEvent::Progress { task_id, percent } if *percent % 25 == 0 => {
            tracing::info!(task_id = %task_id, percent = *percent, "Upload progress")
        }
        UploadEvent::Progress { task_id, percent } => {
            tracing::debug!(task_id = %task_id, percent = *percent, "Upload progress")
        }
        UploadEvent::Finished { task_id, success } => {
            tracing::info!(task_id = %task_id, success = *success, "Upload finished")
        }
    }
}

/// Initialize tracing for the CLI. `SEASONPASS_LOG_FORMAT=json` switches to
/// JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("SEASONPASS_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
