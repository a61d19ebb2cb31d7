//! Error types for the session crate.
//!
//! Every public operation surfaces failures through [`SessionError`]. Errors
//! reported by the identity provider itself are carried verbatim as
//! [`ProviderError`] so callers can show the provider's own code and
//! description.

use serde::{Deserialize, Serialize};

/// Error reported by the identity provider (callback parsing, silent session
/// check, user-info fetch, redirects).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{}{}", .error, description_suffix(.error_description))]
pub struct ProviderError {
    /// Machine-readable error code, e.g. `login_required`.
    pub error: String,

    /// Optional human-readable explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl ProviderError {
    /// Create a provider error with a code and no description.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_description: None,
        }
    }

    /// Attach a human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }

    /// The callback URL carried no parseable authentication payload.
    pub fn missing_callback() -> Self {
        Self::new("invalid_callback")
            .with_description("no authentication result found in the callback")
    }

    /// The callback parsed, but the bundle lacks the access or identity token.
    pub fn incomplete_tokens() -> Self {
        Self::new("invalid_token_response")
            .with_description("authentication result is missing the access or identity token")
    }
}

fn description_suffix(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" - {d}"))
        .unwrap_or_default()
}

/// Unified error type for the authlease session manager.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No access token is held; the caller must start a login.
    #[error("not authenticated: no access token found")]
    Unauthenticated,

    /// The session was replaced or cleared while a renewal was in flight;
    /// the renewed tokens were discarded.
    #[error("renewal superseded: the session changed while it was in flight")]
    RenewalSuperseded,

    /// The identity provider rejected or failed a request.
    #[error("identity provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The persisted return location could not be deserialized.
    #[error("malformed return location: {reason}")]
    MalformedReturnLocation {
        /// Why deserialization failed.
        reason: String,
    },

    /// The persistent key-value store failed.
    #[error("storage error: {reason}")]
    Storage {
        /// Details from the storage backend.
        reason: String,
    },

    /// Configuration is missing or malformed.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The TOML configuration could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// URL parsing error.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// I/O error (e.g. reading a config file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for SessionError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage {
            reason: err.to_string(),
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, SessionError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_display_with_description() {
        let err = ProviderError::new("login_required").with_description("Login required");
        assert_eq!(err.to_string(), "login_required - Login required");
    }

    #[test]
    fn provider_error_display_code_only() {
        let err = ProviderError::new("access_denied");
        assert_eq!(err.to_string(), "access_denied");
    }

    #[test]
    fn provider_error_deserializes_oauth_shape() {
        let err: ProviderError =
            serde_json::from_str(r#"{"error":"consent_required","error_description":"ask"}"#)
                .unwrap();
        assert_eq!(err.error, "consent_required");
        assert_eq!(err.error_description.as_deref(), Some("ask"));
    }

    #[test]
    fn error_display_unauthenticated() {
        assert_eq!(
            SessionError::Unauthenticated.to_string(),
            "not authenticated: no access token found"
        );
    }

    #[test]
    fn error_display_renewal_superseded() {
        assert_eq!(
            SessionError::RenewalSuperseded.to_string(),
            "renewal superseded: the session changed while it was in flight"
        );
    }

    #[test]
    fn error_display_provider() {
        let err = SessionError::from(ProviderError::new("timeout"));
        assert_eq!(err.to_string(), "identity provider error: timeout");
    }

    #[test]
    fn error_display_malformed_return_location() {
        let err = SessionError::MalformedReturnLocation {
            reason: "expected value".to_string(),
        };
        assert_eq!(err.to_string(), "malformed return location: expected value");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SessionError>();
    }
}
