//! Configuration module
//!
//! [`UploadConfig`] is the explicit configuration object handed to the API
//! client, the upload queue and the orchestrator. It starts from local defaults
//! or the environment and can be overlaid with the tunables the backend serves
//! at `GET /config`.

use std::env;
use std::time::Duration;

use crate::models::RemoteConfig;

// Defaults matching what the registration backend serves
const MAX_FILE_SIZE_MB: u64 = 100;
const CONCURRENT_UPLOADS: usize = 2;
const MAX_GENERAL_FILES: usize = 2;
const MAX_PLATE_ROWS: usize = 5;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_API_BASE: &str = "http://localhost:8080";

/// Backend paths, relative to `api_base`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointPaths {
    pub config: String,
    pub upload_token: String,
    pub presigned: String,
    pub presigned_download: String,
    pub location_settings: String,
    pub resident_create: String,
    pub resident_finalize: String,
    pub company_create: String,
    pub company_finalize: String,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            config: "/config".to_string(),
            upload_token: "/upload-token".to_string(),
            presigned: "/presigned".to_string(),
            presigned_download: "/presigned/download".to_string(),
            location_settings: "/api/public/parking-locations/settings".to_string(),
            resident_create: "/registers/resident".to_string(),
            resident_finalize: "/registers/resident/finalize".to_string(),
            company_create: "/registers/company".to_string(),
            company_finalize: "/registers/company/finalize".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub api_base: String,
    /// Base URL of the parking service that serves location settings.
    pub parking_api_base: String,
    pub turnstile_site_key: Option<String>,
    pub max_file_size_mb: u64,
    /// Accepted MIME type prefixes, e.g. `image/`.
    pub allowed_type_prefixes: Vec<String>,
    /// Extensions (with leading dot) accepted when the content type is absent
    /// or not in the prefix list.
    pub allowed_extensions: Vec<String>,
    pub concurrent_uploads: usize,
    pub max_general_files: usize,
    pub max_plate_rows: usize,
    /// Whether the presign endpoint requires the upload bearer token.
    pub presign_requires_auth: bool,
    pub request_timeout_secs: u64,
    pub endpoints: EndpointPaths,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            parking_api_base: DEFAULT_API_BASE.to_string(),
            turnstile_site_key: None,
            max_file_size_mb: MAX_FILE_SIZE_MB,
            allowed_type_prefixes: vec!["image/".to_string(), "application/pdf".to_string()],
            allowed_extensions: vec![
                ".jpg".to_string(),
                ".jpeg".to_string(),
                ".png".to_string(),
                ".pdf".to_string(),
            ],
            concurrent_uploads: CONCURRENT_UPLOADS,
            max_general_files: MAX_GENERAL_FILES,
            max_plate_rows: MAX_PLATE_ROWS,
            presign_requires_auth: true,
            request_timeout_secs: REQUEST_TIMEOUT_SECS,
            endpoints: EndpointPaths::default(),
        }
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn normalize_extension(ext: String) -> String {
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

fn env_number<T: std::str::FromStr>(key: &str, default: T) -> Result<T, anyhow::Error> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number", key)),
        _ => Ok(default),
    }
}

impl UploadConfig {
    /// Load configuration from `SEASONPASS_*` environment variables, reading a
    /// `.env` file first when one is present.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let api_base = env::var("SEASONPASS_API_BASE")
            .or_else(|_| env::var("API_BASE"))
            .unwrap_or(defaults.api_base);
        let parking_api_base =
            env::var("SEASONPASS_PARKING_API_BASE").unwrap_or_else(|_| api_base.clone());

        let allowed_type_prefixes = env::var("SEASONPASS_ALLOWED_TYPE_PREFIXES")
            .map(|raw| parse_list(&raw))
            .unwrap_or(defaults.allowed_type_prefixes);
        let allowed_extensions = env::var("SEASONPASS_ALLOWED_EXTENSIONS")
            .map(|raw| parse_list(&raw).into_iter().map(normalize_extension).collect())
            .unwrap_or(defaults.allowed_extensions);

        let presign_requires_auth = env::var("SEASONPASS_PRESIGN_REQUIRES_AUTH")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(defaults.presign_requires_auth);

        let config = Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            parking_api_base: parking_api_base.trim_end_matches('/').to_string(),
            turnstile_site_key: env::var("SEASONPASS_TURNSTILE_SITE_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            max_file_size_mb: env_number("SEASONPASS_MAX_FILE_SIZE_MB", defaults.max_file_size_mb)?,
            allowed_type_prefixes,
            allowed_extensions,
            concurrent_uploads: env_number(
                "SEASONPASS_CONCURRENT_UPLOADS",
                defaults.concurrent_uploads,
            )?,
            max_general_files: env_number(
                "SEASONPASS_MAX_GENERAL_FILES",
                defaults.max_general_files,
            )?,
            max_plate_rows: env_number("SEASONPASS_MAX_PLATE_ROWS", defaults.max_plate_rows)?,
            presign_requires_auth,
            request_timeout_secs: env_number(
                "SEASONPASS_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            endpoints: defaults.endpoints,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "SEASONPASS_API_BASE must be an http(s) URL, got {:?}",
                self.api_base
            ));
        }

        if self.max_file_size_mb == 0 {
            return Err(anyhow::anyhow!("SEASONPASS_MAX_FILE_SIZE_MB must be greater than 0"));
        }

        if self.max_file_size_mb.checked_mul(1024 * 1024).is_none() {
            return Err(anyhow::anyhow!(
                "SEASONPASS_MAX_FILE_SIZE_MB is too large: {}",
                self.max_file_size_mb
            ));
        }

        if self.concurrent_uploads == 0 {
            return Err(anyhow::anyhow!("SEASONPASS_CONCURRENT_UPLOADS must be greater than 0"));
        }

        if self.allowed_type_prefixes.is_empty() && self.allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!(
                "At least one allowed content type prefix or extension must be configured"
            ));
        }

        Ok(())
    }

    /// Overlay backend-served tunables. Zero values are ignored.
    pub fn apply_remote(&mut self, remote: &RemoteConfig) {
        if let Some(n) = remote.max_general_files.filter(|n| *n > 0) {
            self.max_general_files = n as usize;
        }
        if let Some(n) = remote.max_plate_numbers.filter(|n| *n > 0) {
            self.max_plate_rows = n as usize;
        }
        if let Some(n) = remote.concurrent_uploads.filter(|n| *n > 0) {
            self.concurrent_uploads = n as usize;
        }
        if let Some(n) = remote.max_file_size_mb.filter(|n| *n > 0) {
            self.max_file_size_mb = u64::from(n);
        }
        if let Some(types) = remote.allowed_types.as_ref().filter(|t| !t.is_empty()) {
            self.allowed_type_prefixes = types.iter().map(|t| t.trim().to_lowercase()).collect();
        }

        tracing::debug!(
            max_general_files = self.max_general_files,
            max_plate_rows = self.max_plate_rows,
            concurrent_uploads = self.concurrent_uploads,
            max_file_size_mb = self.max_file_size_mb,
            "Applied remote upload configuration"
        );
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
