//! Value types exchanged with the identity provider and navigation layers.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Token bundle
// ---------------------------------------------------------------------------

/// Tokens returned by a successful login or silent renewal.
///
/// Transient: consumed immediately by
/// [`SessionManager::set_session`](crate::SessionManager::set_session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
    /// Signed identity token (opaque to this crate).
    pub id_token: String,

    /// Access token for API calls.
    pub access_token: String,

    /// Lifetime of the tokens in seconds, relative to receipt.
    pub expires_in: i64,

    /// Space-separated scopes actually granted, if the provider reported them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenBundle {
    /// Whether both tokens are present.
    pub fn is_complete(&self) -> bool {
        !self.id_token.is_empty() && !self.access_token.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// User profile returned by the provider's user-info endpoint.
///
/// Standard OIDC claims are typed; anything else lands in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Subject identifier.
    pub sub: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,

    /// Provider-specific claims.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Navigation location
// ---------------------------------------------------------------------------

/// A navigation target inside the host application.
///
/// Persisted as JSON before redirecting to the provider, restored after the
/// callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Path component, always starting with `/`.
    pub pathname: String,

    /// Query string including the leading `?`, or empty.
    #[serde(default)]
    pub search: String,

    /// Fragment including the leading `#`, or empty.
    #[serde(default)]
    pub hash: String,

    /// Opaque router state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<serde_json::Value>,
}

impl Location {
    /// The application root, `/`.
    pub fn root() -> Self {
        Self::from_path("/")
    }

    /// Parse a path such as `/courses?page=2#top`.
    pub fn from_path(path: &str) -> Self {
        let (rest, hash) = match path.find('#') {
            Some(idx) => (&path[..idx], &path[idx..]),
            None => (path, ""),
        };
        let (pathname, search) = match rest.find('?') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        let pathname = if pathname.is_empty() {
            "/".to_string()
        } else if pathname.starts_with('/') {
            pathname.to_string()
        } else {
            format!("/{pathname}")
        };

        Self {
            pathname,
            search: search.to_string(),
            hash: hash.to_string(),
            state: None,
        }
    }

    /// Attach router state.
    pub fn with_state(mut self, state: serde_json::Value) -> Self {
        self.state = Some(state);
        self
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.pathname, self.search, self.hash)
    }
}

// ---------------------------------------------------------------------------
// Provider requests
// ---------------------------------------------------------------------------

/// Parameters for a redirect-based authorization request (and for silent
/// session checks, which reuse them).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    pub redirect_uri: String,
    /// Typically `token id_token`.
    pub response_type: String,
    /// Space-separated requested scopes.
    pub scope: String,
}

/// Parameters for the provider's logout redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub client_id: String,
    pub return_to: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
