//! Upload session manager
//!
//! Holds at most one live [`UploadSession`]. A fresh verification replaces the
//! current session; uploads already in flight keep the bearer they read, later
//! tasks read the new one.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use seasonpass_core::models::UploadSession;
use seasonpass_core::{AuthorizationError, CredentialProvider};

pub struct SessionManager {
    provider: Arc<dyn CredentialProvider>,
    current: RwLock<Option<UploadSession>>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn CredentialProvider>) -> Self {
        Self {
            provider,
            current: RwLock::new(None),
        }
    }

    /// Exchange a verification token and install the resulting session.
    ///
    /// The previous session is dropped before the exchange, so a failed
    /// verification leaves no session behind.
    pub async fn verify(&self, verification_token: &str) -> Result<(), AuthorizationError> {
        self.invalidate().await;

        let authorization = self.provider.authorize(verification_token).await?;
        let session = UploadSession::start(verification_token, authorization);

        tracing::info!(
            expires_in_secs = session.remaining().as_secs(),
            "Upload session established"
        );

        *self.current.write().await = Some(session);
        Ok(())
    }

    pub async fn invalidate(&self) {
        if self.current.write().await.take().is_some() {
            tracing::debug!("Upload session invalidated");
        }
    }

    pub async fn is_live(&self) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(UploadSession::is_live)
    }

    /// Current bearer token, or why there is none.
    pub async fn bearer(&self) -> Result<String, AuthorizationError> {
        match self.current.read().await.as_ref() {
            None => Err(AuthorizationError::Missing),
            Some(session) if !session.is_live() => Err(AuthorizationError::Expired),
            Some(session) => Ok(session.bearer().to_string()),
        }
    }

    /// Lifetime left on the live session.
    pub async fn remaining(&self) -> Option<Duration> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|s| s.is_live())
            .map(UploadSession::remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use seasonpass_core::models::UploadAuthorization;

    struct FixedProvider {
        lifetime: Duration,
    }

    #[async_trait]
    impl CredentialProvider for FixedProvider {
        async fn authorize(
            &self,
            verification_token: &str,
        ) -> Result<UploadAuthorization, AuthorizationError> {
            if verification_token == "bad" {
                return Err(AuthorizationError::Rejected("challenge failed".into()));
            }
            Ok(UploadAuthorization {
                token: format!("jwt-{}", verification_token),
                expires_in: self.lifetime,
            })
        }
    }

    fn manager(lifetime: Duration) -> SessionManager {
        SessionManager::new(Arc::new(FixedProvider { lifetime }))
    }

    #[tokio::test]
    async fn no_session_means_missing() {
        let sessions = manager(Duration::from_secs(60));
        assert!(!sessions.is_live().await);
        assert_eq!(sessions.bearer().await, Err(AuthorizationError::Missing));
        assert_eq!(sessions.remaining().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn verified_session_expires() {
        let sessions = manager(Duration::from_secs(60));
        sessions.verify("cf-1").await.unwrap();
        assert!(sessions.is_live().await);
        assert_eq!(sessions.bearer().await.unwrap(), "jwt-cf-1");

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!sessions.is_live().await);
        assert_eq!(sessions.bearer().await, Err(AuthorizationError::Expired));
    }

    #[tokio::test]
    async fn reverification_replaces_and_failure_clears() {
        let sessions = manager(Duration::from_secs(60));
        sessions.verify("cf-1").await.unwrap();
        sessions.verify("cf-2").await.unwrap();
        assert_eq!(sessions.bearer().await.unwrap(), "jwt-cf-2");

        assert!(sessions.verify("bad").await.is_err());
        assert_eq!(sessions.bearer().await, Err(AuthorizationError::Missing));
    }

    #[tokio::test]
    async fn invalidate_drops_session() {
        let sessions = manager(Duration::from_secs(60));
        sessions.verify("cf-1").await.unwrap();
        sessions.invalidate().await;
        assert!(!sessions.is_live().await);
    }
}
