// # Session Provider Trait
//
// Authentication is a capability handed to router clients when they are
// built. The reconciler never sees it. Obtaining, storing and refreshing the
// token (the Freebox challenge/response login) is the provider's business.

use async_trait::async_trait;

/// Source of an authenticated session token
///
/// Implementations must be thread-safe. A router client asks for the token
/// on every request, so a provider that refreshes expired sessions can do so
/// transparently.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The token to present to the router
    ///
    /// # Errors
    ///
    /// `Error::Transport` if no valid session can be produced.
    async fn session_token(&self) -> Result<String, crate::Error>;
}
