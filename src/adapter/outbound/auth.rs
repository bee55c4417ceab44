//! Token providers for hosts that manage refresh elsewhere.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::infrastructure::config::AuthToken;
use crate::port::outbound::AuthTokenProvider;

/// Hands out whatever token was last stored.
///
/// Suited to the runner binary and to hosts that refresh tokens on their own
/// schedule and call [`StaticTokenProvider::replace`].
#[derive(Debug, Default)]
pub struct StaticTokenProvider {
    token: RwLock<Option<AuthToken>>,
}

impl StaticTokenProvider {
    #[must_use]
    pub fn new(token: Option<AuthToken>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    /// Read the token from an environment variable; unset or blank means no token.
    #[must_use]
    pub fn from_env(var: &str) -> Self {
        let token = std::env::var(var)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(AuthToken::new);
        Self::new(token)
    }

    /// Swap the stored token; `None` makes the next start or poll fail auth.
    pub fn replace(&self, token: Option<AuthToken>) {
        *self.token.write() = token;
    }
}

#[async_trait]
impl AuthTokenProvider for StaticTokenProvider {
    async fn valid_token(&self) -> Option<AuthToken> {
        self.token.read().clone()
    }
}
