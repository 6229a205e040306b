//! seasonpass: command-line driver for the registration upload engine.
//!
//! Reads `SEASONPASS_*` variables (and `.env`) for the backend location and
//! upload limits.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use seasonpass_api_client::ApiClient;
use seasonpass_cli::{init_tracing, log_upload_event, Manifest};
use seasonpass_core::models::LocalFile;
use seasonpass_core::{ErrorMetadata, FileValidator, UploadConfig};
use seasonpass_registration::RegistrationOrchestrator;
use seasonpass_storage::HttpObjectUploader;
use seasonpass_worker::{ConcurrentUploadQueue, SessionManager, UploadContext};

#[derive(Parser)]
#[command(name = "seasonpass", about = "Season pass registration uploads")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective configuration (local settings overlaid with GET /config)
    Config,
    /// Check whether registration is open for a parking location
    Settings {
        #[arg(long)]
        location: String,
    },
    /// Run the client-side file checks
    Validate {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Get a read link for a stored object
    DownloadUrl { key: String },
    /// Create, upload and finalize a registration described by a JSON manifest
    Submit {
        #[arg(long)]
        manifest: PathBuf,
        /// Bot-check token exchanged for the upload authorization
        #[arg(long)]
        turnstile_token: String,
        /// Parking location whose registration gate applies
        #[arg(long)]
        location: Option<String>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

/// Local configuration with the backend's tunables applied. A backend that
/// does not serve them leaves the local values in place.
async fn effective_config(client: &ApiClient, mut config: UploadConfig) -> UploadConfig {
    match client.fetch_remote_config().await {
        Ok(remote) => config.apply_remote(&remote),
        Err(e) => tracing::warn!(error = %e, "Remote config unavailable, using local settings"),
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    run(cli).await
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = UploadConfig::from_env().context("Invalid SEASONPASS_* configuration")?;
    let client = ApiClient::new(&config).context("Failed to create API client")?;

    match cli.command {
        Commands::Config => {
            let config = effective_config(&client, config).await;
            print_json(&serde_json::json!({
                "apiBase": config.api_base,
                "parkingApiBase": config.parking_api_base,
                "turnstileSiteKey": config.turnstile_site_key,
                "maxFileSizeMb": config.max_file_size_mb,
                "allowedTypePrefixes": config.allowed_type_prefixes,
                "allowedExtensions": config.allowed_extensions,
                "concurrentUploads": config.concurrent_uploads,
                "maxGeneralFiles": config.max_general_files,
                "maxPlateRows": config.max_plate_rows,
                "presignRequiresAuth": config.presign_requires_auth,
            }))?;
        }
        Commands::Settings { location } => {
            let settings = client.location_settings(&location).await;
            print_json(&settings)?;
        }
        Commands::Validate { files } => {
            let config = effective_config(&client, config).await;
            let validator = FileValidator::from_config(&config);
            let mut report = Vec::with_capacity(files.len());
            for path in files {
                let verdict = match LocalFile::from_path(&path).await {
                    Ok(file) => match validator.validate(&file) {
                        Ok(()) => serde_json::json!({
                            "file": path,
                            "accepted": true,
                            "contentType": file.content_type_or_default(),
                            "size": file.size,
                        }),
                        Err(e) => serde_json::json!({
                            "file": path,
                            "accepted": false,
                            "reason": e.to_string(),
                        }),
                    },
                    Err(e) => serde_json::json!({
                        "file": path,
                        "accepted": false,
                        "reason": e.to_string(),
                    }),
                };
                report.push(verdict);
            }
            print_json(&report)?;
        }
        Commands::DownloadUrl { key } => {
            let link = client.download_url(&key).await?;
            print_json(&link)?;
        }
        Commands::Submit {
            manifest,
            turnstile_token,
            location,
        } => {
            let config = effective_config(&client, config).await;
            let client = Arc::new(client);

            let sessions = Arc::new(SessionManager::new(client.clone()));
            sessions
                .verify(&turnstile_token)
                .await
                .context("Security verification failed")?;

            let uploader = HttpObjectUploader::new(config.request_timeout())?;
            let context = UploadContext::new(&config, client.clone(), Arc::new(uploader), sessions);
            let queue = ConcurrentUploadQueue::new(context, config.concurrent_uploads);

            let (events_tx, mut events_rx) = mpsc::unbounded_channel();
            let logger = tokio::spawn(async move {
                while let Some(event) = events_rx.recv().await {
                    log_upload_event(&event);
                }
            });

            let mut orchestrator =
                RegistrationOrchestrator::new(client.clone(), queue).with_events(events_tx);
            if let Some(location) = location {
                let settings = client.location_settings(&location).await;
                orchestrator = orchestrator.with_location_settings(settings);
            }

            let base_dir = manifest
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let mut draft = Manifest::from_path(&manifest)?
                .into_draft(&config, &base_dir)
                .await?;

            let result = orchestrator.submit(&mut draft).await;
            drop(orchestrator);
            let _ = logger.await;

            match result {
                Ok(outcome) => print_json(&serde_json::json!({
                    "kind": outcome.kind,
                    "registrationId": outcome.registration_id,
                    "finalizedId": outcome.finalized_id,
                    "uploaded": outcome.uploaded,
                    "reused": outcome.reused,
                }))?,
                Err(e) => {
                    print_json(&serde_json::json!({
                        "error": e.error_code(),
                        "message": e.client_message(),
                        "retryable": e.is_recoverable(),
                    }))?;
                    return Err(anyhow::anyhow!(e));
                }
            }
        }
    }

    Ok(())
}
