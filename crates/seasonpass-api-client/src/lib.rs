//! HTTP client for the seasonpass registration backend.
//!
//! Provides a minimal client with generic GET/POST helpers that unwrap the
//! backend's `{success, message, data, errors}` envelope, and domain methods
//! (config, upload token, presigned targets, create, finalize) in [`api`].
//! The client implements the seam traits from `seasonpass_core::backend`.

pub mod api;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use seasonpass_core::models::ApiEnvelope;
use seasonpass_core::{BackendError, EndpointPaths, FieldError, UploadConfig};

/// HTTP client for the registration backend.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    parking_base_url: String,
    endpoints: EndpointPaths,
}

impl ApiClient {
    pub fn new(config: &UploadConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(client, config))
    }

    /// Build around an existing reqwest client (shared connection pool).
    pub fn with_client(client: Client, config: &UploadConfig) -> Self {
        Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            parking_base_url: config.parking_api_base.trim_end_matches('/').to_string(),
            endpoints: config.endpoints.clone(),
        }
    }

    pub fn endpoints(&self) -> &EndpointPaths {
        &self.endpoints
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn build_parking_url(&self, path: &str) -> String {
        format!("{}{}", self.parking_base_url, path)
    }

    fn apply_bearer(request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        match bearer {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// GET `url` (already carrying its query string) and return the JSON body.
    pub async fn get_value(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<serde_json::Value, BackendError> {
        let request = Self::apply_bearer(self.client.get(url), bearer);
        let response = request.send().await.map_err(transport_error)?;
        read_json(response).await
    }

    /// POST a JSON body and return the JSON response.
    pub async fn post_value<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<serde_json::Value, BackendError> {
        let url = self.build_url(path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }
}

/// Map a reqwest failure onto the shared transport error path.
pub fn transport_error(err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(err.to_string())
    } else if err.is_decode() {
        BackendError::Decode(err.to_string())
    } else {
        BackendError::Network(err.to_string())
    }
}

async fn read_json(response: Response) -> Result<serde_json::Value, BackendError> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        return Err(error_from_body(status.as_u16(), &text));
    }

    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }

    serde_json::from_str(&text)
        .map_err(|e| BackendError::Decode(format!("Failed to parse response as JSON: {}", e)))
}

#[derive(serde::Deserialize)]
struct FieldErrorList {
    #[serde(default)]
    errors: Vec<FieldError>,
}

/// Turn a non-2xx body into a `BackendError`, surfacing validator field errors
/// (`errors.errors[]`) when the backend sent them.
pub(crate) fn error_from_body(status: u16, text: &str) -> BackendError {
    let envelope: Option<ApiEnvelope<serde_json::Value>> = serde_json::from_str(text).ok();

    if let Some(envelope) = envelope {
        if let Some(fields) = envelope
            .errors
            .clone()
            .and_then(|errors| serde_json::from_value::<FieldErrorList>(errors).ok())
            .map(|list| list.errors)
            .filter(|fields| !fields.is_empty())
        {
            return BackendError::Validation { fields };
        }

        let message = match envelope.errors {
            Some(serde_json::Value::String(detail)) if !envelope.message.is_empty() => {
                format!("{}: {}", envelope.message, detail)
            }
            Some(serde_json::Value::String(detail)) => detail,
            _ if !envelope.message.is_empty() => envelope.message,
            _ => text.to_string(),
        };
        return BackendError::Status { status, message };
    }

    let message = if text.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        text.to_string()
    };
    BackendError::Status { status, message }
}

/// Extract the payload from either an enveloped (`{data: ...}`) or bare body.
pub(crate) fn unwrap_data<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, BackendError> {
    if let Some(false) = value.get("success").and_then(|s| s.as_bool()) {
        let message = value
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("request was not successful")
            .to_string();
        return Err(BackendError::Unsuccessful(message));
    }

    let payload = match value {
        serde_json::Value::Object(mut map) if map.get("data").is_some_and(|d| d.is_object()) => {
            map.remove("data").unwrap_or(serde_json::Value::Null)
        }
        other => other,
    };

    serde_json::from_value(payload).map_err(|e| BackendError::Decode(e.to_string()))
}

/// Encode query parameters, percent-encoding every value.
pub(crate) fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

// Re-export commonly used types.
pub use api::normalize_expires_in;
pub use seasonpass_core::models::{DownloadLink, LocationSettings, RemoteConfig, UploadTarget};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_query_escapes_free_text() {
        assert_eq!(
            encode_query(&[("plateNumber", "WXY 1234"), ("fileName", "a&b.pdf")]),
            "plateNumber=WXY%201234&fileName=a%26b.pdf"
        );
    }

    #[test]
    fn error_body_with_field_errors_becomes_validation() {
        let body = r#"{"success":false,"message":"Validation failed","errors":{"message":"validate failed","errors":[{"field":"ContactEmail","message":"Invalid email format"}]}}"#;
        match error_from_body(400, body) {
            BackendError::Validation { fields } => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "ContactEmail");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn error_body_with_detail_string() {
        let body = r#"{"success":false,"message":"Failed to generate signed URL","errors":"invalid fileType: x"}"#;
        assert_eq!(
            error_from_body(500, body),
            BackendError::Status {
                status: 500,
                message: "Failed to generate signed URL: invalid fileType: x".into(),
            }
        );
    }

    #[test]
    fn error_body_plain_text() {
        assert_eq!(
            error_from_body(502, "Bad Gateway"),
            BackendError::Status {
                status: 502,
                message: "Bad Gateway".into(),
            }
        );
        assert_eq!(
            error_from_body(502, ""),
            BackendError::Status {
                status: 502,
                message: "Unknown error".into(),
            }
        );
    }

    #[test]
    fn unwrap_data_handles_both_shapes() {
        let enveloped = serde_json::json!({"success": true, "data": {"url": "u", "key": "k"}});
        let target: UploadTarget = unwrap_data(enveloped).unwrap();
        assert_eq!(target.key, "k");

        let bare = serde_json::json!({"url": "u2", "key": "k2"});
        let target: UploadTarget = unwrap_data(bare).unwrap();
        assert_eq!(target.url, "u2");

        let failed = serde_json::json!({"success": false, "message": "nope"});
        assert_eq!(
            unwrap_data::<UploadTarget>(failed).unwrap_err(),
            BackendError::Unsuccessful("nope".into())
        );
    }
}
