//! Domain methods for the registration API client.
//!
//! Response types are re-exported from `seasonpass_core::models`. The seam
//! traits the upload engine depends on are implemented at the bottom of this
//! file.

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use seasonpass_core::models::{
    CreatedRegistration, DownloadLink, FinalizedRegistration, FormKind, LocationSettings,
    RemoteConfig, UploadAuthorization, UploadTarget, UploadTokenData, UploadTokenRequest,
};
use seasonpass_core::{
    AuthorizationError, BackendError, CredentialProvider, PresignError, PresignRequest,
    PresignedUrlClient, RegistrationBackend,
};

use crate::{encode_query, unwrap_data, ApiClient};

// Values above these are absolute timestamps rather than lifetimes.
const EPOCH_SECONDS_THRESHOLD: i64 = 1_000_000_000;
const EPOCH_MILLIS_THRESHOLD: i64 = 1_000_000_000_000;

/// Turn the backend's `expiresIn` into a lifetime. Most builds send seconds,
/// some send an absolute epoch timestamp (seconds or milliseconds).
pub fn normalize_expires_in(raw: i64, now_epoch_secs: i64) -> Duration {
    let secs = if raw >= EPOCH_MILLIS_THRESHOLD {
        raw / 1000 - now_epoch_secs
    } else if raw >= EPOCH_SECONDS_THRESHOLD {
        raw - now_epoch_secs
    } else {
        raw
    };
    Duration::from_secs(secs.max(0) as u64)
}

fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl ApiClient {
    /// Fetch the tunables served at `GET /config`.
    pub async fn fetch_remote_config(&self) -> Result<RemoteConfig, BackendError> {
        let url = self.build_url(&self.endpoints().config);
        let value = self.get_value(&url, None).await?;
        unwrap_data(value)
    }

    /// Whether registration is open for a parking location. Any failure closes
    /// the gate.
    pub async fn location_settings(&self, location_id: &str) -> LocationSettings {
        let url = format!(
            "{}?{}",
            self.build_parking_url(&self.endpoints().location_settings),
            encode_query(&[("id", location_id)])
        );

        let result = match self.get_value(&url, None).await {
            Ok(value) => unwrap_data::<LocationSettings>(value),
            Err(e) => Err(e),
        };

        match result {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(
                    location_id = %location_id,
                    error = %e,
                    "Failed to load location settings, registration disabled"
                );
                LocationSettings::default()
            }
        }
    }

    /// Exchange a bot-check token for an upload bearer token.
    #[tracing::instrument(skip_all)]
    pub async fn request_upload_token(
        &self,
        turnstile_token: &str,
    ) -> Result<UploadAuthorization, AuthorizationError> {
        if turnstile_token.trim().is_empty() {
            return Err(AuthorizationError::Missing);
        }

        let body = UploadTokenRequest { turnstile_token };
        let value = self
            .post_value(&self.endpoints().upload_token, &body)
            .await
            .map_err(|e| match e {
                e if e.is_unauthorized() || e.status() == Some(400) => {
                    AuthorizationError::Rejected(e.to_string())
                }
                e => AuthorizationError::Backend(e),
            })?;

        let data: UploadTokenData = unwrap_data(value).map_err(|e| match e {
            BackendError::Unsuccessful(message) => AuthorizationError::Rejected(message),
            other => AuthorizationError::Backend(other),
        })?;

        if data.upload_token.is_empty() {
            return Err(AuthorizationError::Rejected(
                "no upload token in response".to_string(),
            ));
        }

        let expires_in = normalize_expires_in(data.expires_in, now_epoch_secs());
        if expires_in.is_zero() {
            return Err(AuthorizationError::Expired);
        }

        tracing::debug!(expires_in_secs = expires_in.as_secs(), "Upload token issued");

        Ok(UploadAuthorization {
            token: data.upload_token,
            expires_in,
        })
    }

    /// Request a write URL and storage key for one file.
    pub async fn presigned_target(
        &self,
        request: &PresignRequest<'_>,
        bearer: Option<&str>,
    ) -> Result<UploadTarget, PresignError> {
        let mut params = vec![
            ("registerId", request.registration_id),
            ("fileType", request.category.file_type()),
            ("fileName", request.file_name),
            ("contentType", request.content_type),
        ];
        if let Some(plate) = request.plate_number {
            params.push(("plateNumber", plate));
        }
        if let Some(document_type) = request.document_type {
            params.push(("documentType", document_type));
        }

        let url = format!(
            "{}?{}",
            self.build_url(&self.endpoints().presigned),
            encode_query(&params)
        );

        let value = self.get_value(&url, bearer).await?;
        let target: UploadTarget = unwrap_data(value)?;

        if target.url.is_empty() || target.key.is_empty() {
            return Err(PresignError::InvalidTarget(format!(
                "missing url or key for {}",
                request.file_name
            )));
        }

        Ok(target)
    }

    /// Create a registration record; returns its identity.
    #[tracing::instrument(skip_all, fields(kind = %kind))]
    pub async fn create_registration(
        &self,
        kind: FormKind,
        body: &serde_json::Value,
    ) -> Result<String, BackendError> {
        let path = match kind {
            FormKind::Resident => &self.endpoints().resident_create,
            // The generic upload form registers through the company endpoint.
            FormKind::Company | FormKind::Upload => &self.endpoints().company_create,
        };

        let value = self.post_value(path, body).await?;
        let created: CreatedRegistration = unwrap_data(value)?;
        let id = created.into_id().ok_or_else(|| {
            BackendError::Decode("registration response carried no identifier".to_string())
        })?;

        tracing::info!(kind = %kind, registration_id = %id, "Registration created");
        Ok(id)
    }

    /// Commit a registration with its storage keys.
    #[tracing::instrument(skip_all, fields(kind = %kind))]
    pub async fn finalize_registration(
        &self,
        kind: FormKind,
        body: &serde_json::Value,
    ) -> Result<Option<String>, BackendError> {
        let path = match kind {
            FormKind::Resident => &self.endpoints().resident_finalize,
            FormKind::Company => &self.endpoints().company_finalize,
            FormKind::Upload => {
                return Err(BackendError::Unsuccessful(
                    "the upload form has no finalize step".to_string(),
                ))
            }
        };

        let value = self.post_value(path, body).await?;
        if value.is_null() {
            return Ok(None);
        }
        let finalized: FinalizedRegistration = unwrap_data(value)?;
        Ok(finalized.id)
    }

    /// Time-limited read link for a stored object.
    pub async fn download_url(&self, key: &str) -> Result<DownloadLink, BackendError> {
        let url = format!(
            "{}?{}",
            self.build_url(&self.endpoints().presigned_download),
            encode_query(&[("key", key)])
        );
        let value = self.get_value(&url, None).await?;
        unwrap_data(value)
    }
}

#[async_trait]
impl CredentialProvider for ApiClient {
    async fn authorize(
        &self,
        verification_token: &str,
    ) -> Result<UploadAuthorization, AuthorizationError> {
        self.request_upload_token(verification_token).await
    }
}

#[async_trait]
impl PresignedUrlClient for ApiClient {
    async fn get_upload_target(
        &self,
        request: &PresignRequest<'_>,
        bearer: Option<&str>,
    ) -> Result<UploadTarget, PresignError> {
        self.presigned_target(request, bearer).await
    }
}

#[async_trait]
impl RegistrationBackend for ApiClient {
    async fn create_registration(
        &self,
        kind: FormKind,
        body: &serde_json::Value,
    ) -> Result<String, BackendError> {
        ApiClient::create_registration(self, kind, body).await
    }

    async fn finalize_registration(
        &self,
        kind: FormKind,
        body: &serde_json::Value,
    ) -> Result<Option<String>, BackendError> {
        ApiClient::finalize_registration(self, kind, body).await
    }
}
