use std::time::Duration;
use tokio::time::Instant;

/// Short-lived bearer credential issued in exchange for a verification token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadAuthorization {
    pub token: String,
    pub expires_in: Duration,
}

/// Live upload session: the verification token it was created from, the
/// authorization it yielded and when that authorization stops being valid.
///
/// Expiry uses the tokio clock so paused-time tests can advance it.
#[derive(Debug, Clone)]
pub struct UploadSession {
    verification_token: String,
    authorization: UploadAuthorization,
    expires_at: Instant,
}

impl UploadSession {
    pub fn start(verification_token: impl Into<String>, authorization: UploadAuthorization) -> Self {
        let expires_at = Instant::now() + authorization.expires_in;
        Self {
            verification_token: verification_token.into(),
            authorization,
            expires_at,
        }
    }

    pub fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }

    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn bearer(&self) -> &str {
        &self.authorization.token
    }

    pub fn verification_token(&self) -> &str {
        &self.verification_token
    }
}
