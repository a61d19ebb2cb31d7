//! Identity provider capability.
//!
//! The session manager never speaks OAuth on the wire; it drives an
//! implementation of [`IdentityProvider`] supplied by the host (an SDK
//! binding, a webview bridge, or a test double).

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{AuthorizeRequest, LogoutRequest, TokenBundle, UserProfile};

/// Operations the session manager needs from an identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Start the redirect-based login. Completion is observed through a later
    /// call to [`parse_callback`](Self::parse_callback).
    async fn authorize(&self, request: &AuthorizeRequest) -> Result<(), ProviderError>;

    /// Parse the post-redirect callback URL.
    ///
    /// Returns `Ok(None)` when the URL carries no authentication payload at
    /// all, and `Err` when it carries a provider error.
    async fn parse_callback(&self, callback_url: &str)
    -> Result<Option<TokenBundle>, ProviderError>;

    /// Silently re-check the provider-side session and mint fresh tokens.
    async fn check_session(&self, request: &AuthorizeRequest) -> Result<TokenBundle, ProviderError>;

    /// Fetch the user profile for `access_token`.
    async fn fetch_user_info(&self, access_token: &str) -> Result<UserProfile, ProviderError>;

    /// Redirect to the provider's logout endpoint.
    async fn logout(&self, request: &LogoutRequest) -> Result<(), ProviderError>;
}
