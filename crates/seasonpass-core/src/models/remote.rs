//! Wire types returned by the registration backend.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Standard backend envelope: `{success, message, data, errors}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

/// Tunables served by `GET /config`. Every field is optional; missing fields
/// keep the local default. The backend sends numbers as strings, so both
/// encodings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub max_general_files: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub max_plate_numbers: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub concurrent_uploads: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32", alias = "maxFileSizeMb")]
    pub max_file_size_mb: Option<u32>,
    #[serde(default)]
    pub allowed_types: Option<Vec<String>>,
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(u64),
        Text(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Number(n)) => u32::try_from(n)
            .map(Some)
            .map_err(|_| de::Error::custom(format!("value out of range: {}", n))),
        Some(NumberOrString::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberOrString::Text(s)) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected a number, got {:?}", s))),
    }
}

/// Response of the parking-location settings endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationSettings {
    #[serde(default)]
    pub enable_registration: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTokenRequest<'a> {
    pub turnstile_token: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTokenData {
    pub upload_token: String,
    pub expires_in: i64,
}

/// Write URL and storage key issued for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadTarget {
    pub url: String,
    pub key: String,
}

/// Time-limited read link for a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLink {
    pub download_url: String,
    pub key: String,
}

/// Identity returned by the creation endpoints. The resident endpoint names it
/// `registerID`, the company endpoint `employerID`, older builds plain `id`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatedRegistration {
    #[serde(rename = "registerID")]
    pub register_id: Option<String>,
    #[serde(rename = "employerID")]
    pub employer_id: Option<String>,
    pub id: Option<String>,
}

impl CreatedRegistration {
    pub fn into_id(self) -> Option<String> {
        self.register_id
            .or(self.employer_id)
            .or(self.id)
            .filter(|id| !id.is_empty())
    }
}
