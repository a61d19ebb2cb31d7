//! In-memory session state.
//!
//! The identity token, access token and expiry instant are held together in
//! a single [`SessionTokens`] value, so either all three are present or none
//! are. Granted scopes are stored separately because they may be empty even
//! while the tokens are present.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use crate::types::TokenBundle;

/// Token lifetimes are clamped to this many seconds (ten years).
const MAX_TOKEN_LIFETIME_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Split a space-delimited scope string into a set.
pub fn parse_scopes(scope: &str) -> BTreeSet<String> {
    scope.split_whitespace().map(String::from).collect()
}

/// Tokens currently held by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub id_token: String,
    pub access_token: String,
    /// Instant after which the tokens are no longer valid.
    pub expires_at: DateTime<Utc>,
}

/// The session record owned by a [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    tokens: Option<SessionTokens>,
    granted_scopes: BTreeSet<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session with the contents of `bundle`, received at `now`.
    ///
    /// Granted scopes come from the bundle's scope string; when that is
    /// absent or blank they fall back to `requested_scopes`.
    ///
    /// Returns the new expiry instant.
    pub fn establish(
        &mut self,
        bundle: &TokenBundle,
        requested_scopes: &[String],
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let lifetime = bundle.expires_in.clamp(0, MAX_TOKEN_LIFETIME_SECS);
        let expires_at = now + Duration::seconds(lifetime);

        let granted_scopes = match bundle.scope.as_deref() {
            Some(scope) if !scope.trim().is_empty() => parse_scopes(scope),
            _ => requested_scopes.iter().cloned().collect(),
        };

        *self = Self {
            tokens: Some(SessionTokens {
                id_token: bundle.id_token.clone(),
                access_token: bundle.access_token.clone(),
                expires_at,
            }),
            granted_scopes,
        };

        expires_at
    }

    /// Drop tokens and scopes.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// True iff an expiry is recorded and lies strictly after `now`.
    pub fn is_authenticated(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|expires_at| now < expires_at)
    }

    /// True iff every entry of `required` was granted.
    pub fn has_scopes<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required
            .iter()
            .all(|scope| self.granted_scopes.contains(scope.as_ref()))
    }

    pub fn tokens(&self) -> Option<&SessionTokens> {
        self.tokens.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access_token.as_str())
    }

    pub fn id_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.id_token.as_str())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.tokens.as_ref().map(|t| t.expires_at)
    }

    pub fn granted_scopes(&self) -> &BTreeSet<String> {
        &self.granted_scopes
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn requested() -> Vec<String> {
        ["openid", "profile", "email", "read:courses"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn bundle(scope: Option<&str>) -> TokenBundle {
        TokenBundle {
            id_token: "I".to_string(),
            access_token: "A".to_string(),
            expires_in: 3600,
            scope: scope.map(String::from),
        }
    }

    #[test]
    fn empty_state_is_unauthenticated() {
        let state = SessionState::new();
        assert!(!state.is_authenticated(Utc::now()));
        assert!(state.access_token().is_none());
        assert!(state.id_token().is_none());
        assert!(state.expires_at().is_none());
    }

    #[test]
    fn establish_sets_all_fields_together() {
        let now = Utc::now();
        let mut state = SessionState::new();
        let expires_at = state.establish(&bundle(Some("openid read:courses")), &requested(), now);

        assert_eq!(expires_at, now + Duration::seconds(3600));
        assert_eq!(state.access_token(), Some("A"));
        assert_eq!(state.id_token(), Some("I"));
        assert_eq!(state.expires_at(), Some(expires_at));
        assert_eq!(state.granted_scopes().len(), 2);
    }

    #[test]
    fn expiry_is_strict() {
        let now = Utc::now();
        let mut state = SessionState::new();
        let expires_at = state.establish(&bundle(None), &requested(), now);

        assert!(state.is_authenticated(now));
        assert!(state.is_authenticated(expires_at - Duration::milliseconds(1)));
        assert!(!state.is_authenticated(expires_at));
        assert!(!state.is_authenticated(expires_at + Duration::seconds(1)));
    }

    #[test]
    fn negative_lifetime_is_already_expired() {
        let now = Utc::now();
        let mut state = SessionState::new();
        let mut expired = bundle(None);
        expired.expires_in = -30;
        assert_eq!(state.establish(&expired, &requested(), now), now);
        assert!(!state.is_authenticated(now));
    }

    #[test]
    fn missing_scope_falls_back_to_requested() {
        let mut state = SessionState::new();
        state.establish(&bundle(None), &requested(), Utc::now());
        assert!(state.has_scopes(&["read:courses", "email"]));
    }

    #[test]
    fn blank_scope_falls_back_to_requested() {
        let mut state = SessionState::new();
        state.establish(&bundle(Some("  ")), &requested(), Utc::now());
        assert_eq!(state.granted_scopes().len(), 4);
    }

    #[test]
    fn no_scope_and_nothing_requested_is_empty() {
        let mut state = SessionState::new();
        state.establish(&bundle(None), &[], Utc::now());
        assert!(state.granted_scopes().is_empty());
        assert!(state.has_scopes::<&str>(&[]));
        assert!(!state.has_scopes(&["openid"]));
    }

    #[test]
    fn has_scopes_is_subset_check() {
        let mut state = SessionState::new();
        state.establish(&bundle(Some("openid read:courses")), &requested(), Utc::now());

        assert!(state.has_scopes::<&str>(&[]));
        assert!(state.has_scopes(&["read:courses"]));
        assert!(state.has_scopes(&["openid", "read:courses"]));
        assert!(!state.has_scopes(&["write:courses"]));
        assert!(!state.has_scopes(&["read:courses", "write:courses"]));
    }

    #[test]
    fn has_scopes_on_empty_state() {
        let state = SessionState::new();
        assert!(state.has_scopes::<String>(&[]));
        assert!(!state.has_scopes(&["openid"]));
    }

    #[test]
    fn clear_resets_everything() {
        let mut state = SessionState::new();
        state.establish(&bundle(None), &requested(), Utc::now());
        state.clear();
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn parse_scopes_collapses_whitespace() {
        let scopes = parse_scopes(" openid  profile\tprofile ");
        assert_eq!(scopes.len(), 2);
        assert!(scopes.contains("openid"));
    }
}
