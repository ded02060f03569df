// # Static Session
//
// A session token obtained out of band (for instance by a companion login
// tool) and used as-is. It is never refreshed: once the router expires it,
// every call fails with a transport error until a new token is supplied.

use async_trait::async_trait;
use fbxconf_core::traits::SessionProvider;
use fbxconf_core::{Error, Result};

/// Session provider over a fixed, pre-obtained token
///
/// # Security
///
/// The Debug implementation does not expose the token.
#[derive(Clone)]
pub struct StaticSession {
    /// ⚠️ NEVER log this value
    token: String,
}

impl StaticSession {
    /// Wrap a session token
    ///
    /// # Errors
    ///
    /// `Error::Config` if the token is empty.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::config("Freebox session token cannot be empty"));
        }
        Ok(Self { token })
    }
}

impl std::fmt::Debug for StaticSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticSession")
            .field("token", &"<REDACTED>")
            .finish()
    }
}

#[async_trait]
impl SessionProvider for StaticSession {
    async fn session_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}
