//! Session manager configuration.
//!
//! A [`SessionConfig`] can be built in code, parsed from TOML, or read from
//! `AUTHLEASE_*` environment variables (a `.env` file is loaded first when
//! present).

use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SessionError};
use crate::types::{AuthorizeRequest, LogoutRequest};

/// Scopes requested when the configuration does not name any.
pub const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "email", "read:courses"];

/// Response type asking for both an identity token and an access token.
pub const DEFAULT_RESPONSE_TYPE: &str = "token id_token";

/// Store key under which the pre-login location is kept.
pub const DEFAULT_RETURN_LOCATION_KEY: &str = "redirect_on_login";

/// Prefix for environment variable configuration.
const ENV_PREFIX: &str = "AUTHLEASE_";

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
}

fn default_response_type() -> String {
    DEFAULT_RESPONSE_TYPE.to_string()
}

fn default_return_location_key() -> String {
    DEFAULT_RETURN_LOCATION_KEY.to_string()
}

/// Configuration supplied at [`SessionManager`](crate::SessionManager)
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Identity provider domain, e.g. `tenant.eu.auth0.com`.
    pub domain: String,

    /// OAuth client identifier.
    pub client_id: String,

    /// API audience the access token is minted for.
    #[serde(default)]
    pub audience: Option<String>,

    /// Where the provider redirects back after login.
    pub redirect_uri: Url,

    /// Where the provider redirects after logout.
    pub logout_return_to: Url,

    /// Scopes requested at login; also the fallback granted set.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    #[serde(default = "default_response_type")]
    pub response_type: String,

    /// Key-value store key for the pre-login return location.
    #[serde(default = "default_return_location_key")]
    pub return_location_key: String,

    /// Seconds before expiry at which silent renewal fires.
    #[serde(default)]
    pub renewal_leeway_secs: u64,

    /// Drop the cached profile after each successful silent renewal.
    #[serde(default)]
    pub refresh_profile_on_renewal: bool,
}

impl SessionConfig {
    /// Build a configuration with default scopes and policies.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::UrlParse`] if either URL is invalid, or
    /// [`SessionError::InvalidConfig`] if validation fails.
    pub fn new(
        domain: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: &str,
        logout_return_to: &str,
    ) -> Result<Self> {
        let config = Self {
            domain: domain.into(),
            client_id: client_id.into(),
            audience: None,
            redirect_uri: Url::parse(redirect_uri)?,
            logout_return_to: Url::parse(logout_return_to)?,
            scopes: default_scopes(),
            response_type: default_response_type(),
            return_location_key: default_return_location_key(),
            renewal_leeway_secs: 0,
            refresh_profile_on_renewal: false,
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the API audience.
    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Replace the requested scope set.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading session config");
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Read configuration from `AUTHLEASE_*` environment variables, loading a
    /// `.env` file first if one exists.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    ///
    /// Recognised names (after the `AUTHLEASE_` prefix): `DOMAIN`,
    /// `CLIENT_ID`, `AUDIENCE`, `REDIRECT_URI`, `LOGOUT_RETURN_TO`, `SCOPES`
    /// (space-separated), `RETURN_LOCATION_KEY`, `RENEWAL_LEEWAY_SECS`,
    /// `REFRESH_PROFILE_ON_RENEWAL`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty());
        let require = |name: &str| {
            get(name).ok_or_else(|| SessionError::InvalidConfig {
                reason: format!("missing {ENV_PREFIX}{name}"),
            })
        };

        let mut config = Self::new(
            require("DOMAIN")?,
            require("CLIENT_ID")?,
            &require("REDIRECT_URI")?,
            &require("LOGOUT_RETURN_TO")?,
        )?;

        config.audience = get("AUDIENCE");
        if let Some(scopes) = get("SCOPES") {
            config.scopes = scopes.split_whitespace().map(String::from).collect();
        }
        if let Some(key) = get("RETURN_LOCATION_KEY") {
            config.return_location_key = key;
        }
        if let Some(raw) = get("RENEWAL_LEEWAY_SECS") {
            config.renewal_leeway_secs =
                raw.parse().map_err(|_| SessionError::InvalidConfig {
                    reason: format!("{ENV_PREFIX}RENEWAL_LEEWAY_SECS is not a number: {raw}"),
                })?;
        }
        if let Some(raw) = get("REFRESH_PROFILE_ON_RENEWAL") {
            config.refresh_profile_on_renewal = matches!(raw.as_str(), "1" | "true" | "yes");
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the provider would reject.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] describing the first problem.
    pub fn validate(&self) -> Result<()> {
        if self.domain.trim().is_empty() {
            return Err(SessionError::InvalidConfig {
                reason: "domain must not be empty".to_string(),
            });
        }
        if self.client_id.trim().is_empty() {
            return Err(SessionError::InvalidConfig {
                reason: "client_id must not be empty".to_string(),
            });
        }
        if self.return_location_key.is_empty() {
            return Err(SessionError::InvalidConfig {
                reason: "return_location_key must not be empty".to_string(),
            });
        }
        if let Some(bad) = self
            .scopes
            .iter()
            .find(|s| s.is_empty() || s.contains(char::is_whitespace))
        {
            return Err(SessionError::InvalidConfig {
                reason: format!("invalid scope entry: {bad:?}"),
            });
        }

        let parts: Vec<&str> = self.response_type.split_whitespace().collect();
        if !parts.contains(&"token") || !parts.contains(&"id_token") {
            return Err(SessionError::InvalidConfig {
                reason: format!(
                    "response_type must request both token and id_token, got {:?}",
                    self.response_type
                ),
            });
        }

        Ok(())
    }

    /// Requested scopes joined the way the provider expects them.
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }

    /// Parameters for the login redirect and silent session checks.
    pub fn authorize_request(&self) -> AuthorizeRequest {
        AuthorizeRequest {
            client_id: self.client_id.clone(),
            audience: self.audience.clone(),
            redirect_uri: self.redirect_uri.to_string(),
            response_type: self.response_type.clone(),
            scope: self.scope_string(),
        }
    }

    /// Parameters for the logout redirect.
    pub fn logout_request(&self) -> LogoutRequest {
        LogoutRequest {
            client_id: self.client_id.clone(),
            return_to: self.logout_return_to.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn sample() -> SessionConfig {
        SessionConfig::new(
            "tenant.auth0.com",
            "client-123",
            "http://localhost:3000/callback",
            "http://localhost:3000",
        )
        .unwrap()
    }

    #[test]
    fn new_applies_defaults() {
        let config = sample();
        assert_eq!(config.scope_string(), "openid profile email read:courses");
        assert_eq!(config.response_type, "token id_token");
        assert_eq!(config.return_location_key, "redirect_on_login");
        assert_eq!(config.renewal_leeway_secs, 0);
        assert!(!config.refresh_profile_on_renewal);
    }

    #[test]
    fn new_rejects_bad_url() {
        let result = SessionConfig::new("d", "c", "not a url", "http://localhost");
        assert!(matches!(result, Err(SessionError::UrlParse(_))));
    }

    #[test]
    fn validate_rejects_empty_client_id() {
        let mut config = sample();
        config.client_id = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(SessionError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn validate_rejects_scope_with_whitespace() {
        let config = sample().with_scopes(["openid", "read courses"]);
        assert!(matches!(
            config.validate(),
            Err(SessionError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn validate_rejects_code_response_type() {
        let mut config = sample();
        config.response_type = "code".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_toml_with_defaults() {
        let config = SessionConfig::from_toml_str(
            r#"
            domain = "tenant.auth0.com"
            client_id = "abc"
            audience = "http://localhost:3001"
            redirect_uri = "http://localhost:3000/callback"
            logout_return_to = "http://localhost:3000"
            renewal_leeway_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.audience.as_deref(), Some("http://localhost:3001"));
        assert_eq!(config.scopes.len(), 4);
        assert_eq!(config.renewal_leeway_secs, 30);
    }

    #[test]
    fn from_toml_missing_field_fails() {
        let result = SessionConfig::from_toml_str(r#"domain = "x""#);
        assert!(matches!(result, Err(SessionError::ConfigParse(_))));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        std::fs::write(
            &path,
            r#"
            domain = "tenant.auth0.com"
            client_id = "abc"
            redirect_uri = "http://localhost:3000/callback"
            logout_return_to = "http://localhost:3000"
            scopes = ["openid", "read:courses"]
            "#,
        )
        .unwrap();

        let config = SessionConfig::load(&path).unwrap();
        assert_eq!(config.scope_string(), "openid read:courses");
    }

    #[test]
    fn from_lookup_reads_prefixed_vars() {
        let vars: HashMap<&str, &str> = [
            ("AUTHLEASE_DOMAIN", "tenant.auth0.com"),
            ("AUTHLEASE_CLIENT_ID", "abc"),
            ("AUTHLEASE_REDIRECT_URI", "http://localhost:3000/callback"),
            ("AUTHLEASE_LOGOUT_RETURN_TO", "http://localhost:3000"),
            ("AUTHLEASE_SCOPES", "openid email"),
            ("AUTHLEASE_RENEWAL_LEEWAY_SECS", "15"),
            ("AUTHLEASE_REFRESH_PROFILE_ON_RENEWAL", "true"),
        ]
        .into_iter()
        .collect();

        let config = SessionConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.scopes, vec!["openid", "email"]);
        assert_eq!(config.renewal_leeway_secs, 15);
        assert!(config.refresh_profile_on_renewal);
        assert!(config.audience.is_none());
    }

    #[test]
    fn from_lookup_reports_missing_var() {
        let err = SessionConfig::from_lookup(|_| None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: missing AUTHLEASE_DOMAIN"
        );
    }

    #[test]
    fn authorize_request_carries_scopes_and_audience() {
        let request = sample().with_audience("api").authorize_request();
        assert_eq!(request.client_id, "client-123");
        assert_eq!(request.audience.as_deref(), Some("api"));
        assert_eq!(request.redirect_uri, "http://localhost:3000/callback");
        assert_eq!(request.scope, "openid profile email read:courses");
    }

    #[test]
    fn logout_request_uses_return_url() {
        let request = sample().logout_request();
        assert_eq!(request.return_to, "http://localhost:3000/");
    }
}
