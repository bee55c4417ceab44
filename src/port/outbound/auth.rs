//! Bearer token supply.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::AuthError;
use crate::infrastructure::config::AuthToken;

/// Supplies a currently valid bearer token.
///
/// Implementations own expiry checks and refresh; the core never decodes a
/// token. Returning `None` is a fatal auth condition for the current run.
#[async_trait]
pub trait AuthTokenProvider: Send + Sync {
    async fn valid_token(&self) -> Option<AuthToken>;
}

/// The one place transports ask for a token.
///
/// An installed provider is authoritative. Without one, the token pushed
/// through the config (`auth_token`) is used.
pub struct Credentials {
    provider: Option<Arc<dyn AuthTokenProvider>>,
    pushed: RwLock<Option<AuthToken>>,
}

impl Credentials {
    /// `provider` wins over `pushed` when both are present.
    pub fn new(provider: Option<Arc<dyn AuthTokenProvider>>, pushed: Option<AuthToken>) -> Self {
        Self {
            provider,
            pushed: RwLock::new(pushed),
        }
    }

    /// Replace the token pushed through the config.
    pub fn set_pushed(&self, token: Option<AuthToken>) {
        *self.pushed.write() = token;
    }

    #[must_use]
    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Resolve a well-formed token or fail with an [`AuthError`].
    pub async fn bearer(&self) -> Result<AuthToken, AuthError> {
        let token = match &self.provider {
            Some(provider) => provider.valid_token().await,
            None => {
                let pushed = self.pushed.read();
                pushed.clone()
            }
        };
        match token {
            None => Err(AuthError::Unavailable),
            Some(token) if !token.is_well_formed() => Err(AuthError::Malformed),
            Some(token) => Ok(token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    #[async_trait]
    impl AuthTokenProvider for Fixed {
        async fn valid_token(&self) -> Option<AuthToken> {
            self.0.map(AuthToken::new)
        }
    }

    #[tokio::test]
    async fn provider_is_authoritative() {
        let credentials = Credentials::new(Some(Arc::new(Fixed(None))), Some(AuthToken::new("pushed")));
        assert_eq!(credentials.bearer().await, Err(AuthError::Unavailable));

        let credentials = Credentials::new(Some(Arc::new(Fixed(Some("fresh")))), None);
        assert_eq!(credentials.bearer().await.unwrap().expose(), "fresh");
    }

    #[tokio::test]
    async fn pushed_token_used_without_provider() {
        let credentials = Credentials::new(None, None);
        assert_eq!(credentials.bearer().await, Err(AuthError::Unavailable));

        credentials.set_pushed(Some(AuthToken::new("abc.def.ghi")));
        assert_eq!(credentials.bearer().await.unwrap().expose(), "abc.def.ghi");
    }

    #[tokio::test]
    async fn malformed_token_is_rejected() {
        let credentials = Credentials::new(Some(Arc::new(Fixed(Some("")))), None);
        assert_eq!(credentials.bearer().await, Err(AuthError::Malformed));
    }
}
