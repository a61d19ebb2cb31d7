//! The session lifecycle manager.
//!
//! [`SessionManager`] owns the in-memory [`SessionState`], drives the
//! identity provider through login, callback, silent renewal and logout, and
//! keeps exactly one renewal timer armed against the current expiry.
//!
//! # Lifecycle
//!
//! ```text
//! login() ──redirect──▶ provider ──redirect──▶ handle_authentication()
//!                                                   │
//!                                                   ▼
//!                      ┌──────────────────── set_session()
//!                      │                            │
//!                      ▼                            ▼
//!                   renew() ◀──timer fires── schedule_renewal()
//! ```
//!
//! State mutations happen under a std mutex that is never held across an
//! `.await`, so every reader observes either the old session or the new one.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{ProviderError, Result, SessionError};
use crate::navigation::Navigator;
use crate::provider::IdentityProvider;
use crate::renewal::RenewalTimer;
use crate::report::{ErrorReporter, TracingReporter};
use crate::state::SessionState;
use crate::store::KeyValueStore;
use crate::sync::MutexExt;
use crate::types::{Location, TokenBundle, UserProfile};

/// Upper bound on the configured renewal leeway (one day).
const MAX_LEEWAY_SECS: u64 = 24 * 60 * 60;

/// Result of [`SessionManager::handle_authentication`].
///
/// Failures are already reported and navigated away from; the value is
/// informational.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// A session was established and the user was sent to `location`.
    Authenticated { location: Location },
    /// The callback failed; the user was sent to the application root.
    Failed { error: ProviderError },
}

impl CallbackOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Assembles a [`SessionManager`] from its collaborators.
pub struct SessionManagerBuilder {
    config: SessionConfig,
    provider: Arc<dyn IdentityProvider>,
    navigator: Arc<dyn Navigator>,
    store: Arc<dyn KeyValueStore>,
    reporter: Arc<dyn ErrorReporter>,
    clock: Arc<dyn Clock>,
}

impl SessionManagerBuilder {
    /// Replace the default [`TracingReporter`].
    pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Replace the default [`SystemClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> SessionManager {
        SessionManager {
            inner: Arc::new(Inner {
                config: self.config,
                provider: self.provider,
                navigator: self.navigator,
                store: self.store,
                reporter: self.reporter,
                clock: self.clock,
                state: Mutex::new(SessionState::new()),
                renewal: Mutex::new(RenewalTimer::default()),
                profile: tokio::sync::Mutex::new(None),
                epoch: AtomicU64::new(0),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Client-side authentication session manager.
///
/// Cheap to clone; clones share the same session. Renewal timers hold only a
/// weak reference, so dropping the last clone stops renewal.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: SessionConfig,
    provider: Arc<dyn IdentityProvider>,
    navigator: Arc<dyn Navigator>,
    store: Arc<dyn KeyValueStore>,
    reporter: Arc<dyn ErrorReporter>,
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
    renewal: Mutex<RenewalTimer>,
    /// Cached user profile. Held across the user-info fetch so concurrent
    /// callers share one request.
    profile: tokio::sync::Mutex<Option<UserProfile>>,
    /// Bumped under the state lock whenever the session is replaced or
    /// cleared; in-flight renewals started under an older epoch are
    /// discarded.
    epoch: AtomicU64,
}

impl SessionManager {
    /// Start building a manager with the default reporter and clock.
    pub fn builder(
        config: SessionConfig,
        provider: Arc<dyn IdentityProvider>,
        navigator: Arc<dyn Navigator>,
        store: Arc<dyn KeyValueStore>,
    ) -> SessionManagerBuilder {
        SessionManagerBuilder {
            config,
            provider,
            navigator,
            store,
            reporter: Arc::new(TracingReporter),
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a manager with the default reporter and clock.
    pub fn new(
        config: SessionConfig,
        provider: Arc<dyn IdentityProvider>,
        navigator: Arc<dyn Navigator>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self::builder(config, provider, navigator, store).build()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Remember where the user is and redirect to the provider's login.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the return location cannot be
    /// persisted, or [`SessionError::Provider`] if the redirect fails.
    pub async fn login(&self) -> Result<()> {
        let inner = &self.inner;
        let location = inner.navigator.current_location();
        let serialized = serde_json::to_string(&location)?;
        inner
            .store
            .set(&inner.config.return_location_key, &serialized)?;

        info!(return_to = %location, "redirecting to identity provider");
        inner
            .provider
            .authorize(&inner.config.authorize_request())
            .await?;
        Ok(())
    }

    /// Complete a login from the provider's redirect back to the app.
    ///
    /// On success the session is established and the user is sent to the
    /// location saved by [`login`](Self::login) (or `/`). On failure the
    /// user is sent to `/` and the error is reported. Either way the saved
    /// return location is cleared.
    pub async fn handle_authentication(&self, callback_url: &str) -> CallbackOutcome {
        let inner = &self.inner;

        let outcome = match inner.provider.parse_callback(callback_url).await {
            Ok(Some(bundle)) if bundle.is_complete() => {
                inner.set_session(&bundle);
                let location = inner.stored_return_location();
                info!(location = %location, "login completed");
                inner.navigator.push(location.clone());
                CallbackOutcome::Authenticated { location }
            }
            Ok(Some(_)) => inner.fail_callback(ProviderError::incomplete_tokens()),
            Ok(None) => inner.fail_callback(ProviderError::missing_callback()),
            Err(error) => inner.fail_callback(error),
        };

        if let Err(e) = inner.store.remove(&inner.config.return_location_key) {
            inner
                .reporter
                .record_diagnostic("clearing return location", &e);
        }

        outcome
    }

    /// Establish a session from `bundle` and re-arm renewal.
    pub fn set_session(&self, bundle: &TokenBundle) {
        self.inner.set_session(bundle);
    }

    /// Arm the renewal timer against the current expiry, replacing any
    /// outstanding one. Does nothing without a live session.
    pub fn schedule_renewal(&self) {
        self.inner.schedule_renewal();
    }

    /// Silently renew the session with the provider.
    ///
    /// Success re-establishes the session (and therefore re-arms renewal).
    /// Failure is recorded as a diagnostic and not re-armed; the session
    /// lapses at its current expiry. If the session is replaced or cleared
    /// while the provider call is in flight, its result is discarded and
    /// [`SessionError::RenewalSuperseded`] is returned.
    pub async fn renew(&self) -> Result<TokenBundle> {
        self.inner.renew().await
    }

    /// True iff a session exists and has not yet expired.
    pub fn is_authenticated(&self) -> bool {
        let now = self.inner.clock.now();
        self.inner.state.lock_or_recover().is_authenticated(now)
    }

    /// True iff every scope in `required` was granted. An empty list is
    /// always satisfied.
    pub fn has_scopes<S: AsRef<str>>(&self, required: &[S]) -> bool {
        self.inner.state.lock_or_recover().has_scopes(required)
    }

    /// The current access token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unauthenticated`] when no token is held.
    pub fn access_token(&self) -> Result<String> {
        self.inner.access_token()
    }

    /// The current identity token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unauthenticated`] when no token is held.
    pub fn id_token(&self) -> Result<String> {
        self.inner
            .state
            .lock_or_recover()
            .id_token()
            .map(String::from)
            .ok_or(SessionError::Unauthenticated)
    }

    /// The user's profile, fetched once and then served from cache.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Unauthenticated`] without a session, or
    /// [`SessionError::Provider`] if the fetch fails (nothing is cached).
    pub async fn profile(&self) -> Result<UserProfile> {
        self.inner.profile().await
    }

    /// Clear the session, cancel renewal and redirect to the provider's
    /// logout.
    pub async fn logout(&self) -> Result<()> {
        let inner = &self.inner;
        inner.clear_session();
        inner.profile.lock().await.take();

        info!("logging out");
        inner
            .provider
            .logout(&inner.config.logout_request())
            .await?;
        Ok(())
    }

    /// Drop tokens, scopes and any pending renewal without contacting the
    /// provider.
    pub fn clear_session(&self) {
        self.inner.clear_session();
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock_or_recover().expires_at()
    }

    pub fn granted_scopes(&self) -> BTreeSet<String> {
        self.inner.state.lock_or_recover().granted_scopes().clone()
    }

    /// When the armed renewal timer will fire, if one is armed.
    pub fn renewal_due_at(&self) -> Option<DateTime<Utc>> {
        self.inner.renewal.lock_or_recover().due_at()
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

impl Inner {
    fn set_session(self: &Arc<Self>, bundle: &TokenBundle) {
        let mut state = self.state.lock_or_recover();
        self.establish(&mut state, bundle);
    }

    /// Replace the session held in `state`. Callers hold the state lock.
    fn establish(self: &Arc<Self>, state: &mut SessionState, bundle: &TokenBundle) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let now = self.clock.now();
        let expires_at = state.establish(bundle, &self.config.scopes, now);

        info!(
            expires_at = %expires_at,
            scopes = state.granted_scopes().len(),
            "session established"
        );

        // Re-armed while the state lock is held so no reader sees the new
        // expiry paired with the old timer.
        self.arm_renewal(expires_at);
    }

    fn schedule_renewal(self: &Arc<Self>) {
        let state = self.state.lock_or_recover();
        match state.expires_at() {
            Some(expires_at) => self.arm_renewal(expires_at),
            None => debug!("no session, renewal not scheduled"),
        }
    }

    fn arm_renewal(self: &Arc<Self>, expires_at: DateTime<Utc>) {
        let mut timer = self.renewal.lock_or_recover();
        let generation = timer.supersede();

        let now = self.clock.now();
        let leeway = Duration::seconds(self.config.renewal_leeway_secs.min(MAX_LEEWAY_SECS) as i64);
        let due_at = match expires_at.checked_sub_signed(leeway) {
            Some(early) if early > now => early,
            _ => expires_at,
        };

        let delay = match (due_at - now).to_std() {
            Ok(delay) if !delay.is_zero() => delay,
            _ => {
                debug!(expires_at = %expires_at, "session already expired, renewal not scheduled");
                return;
            }
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("no tokio runtime available, renewal not scheduled");
                return;
            }
        };

        let weak = Arc::downgrade(self);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;

            let Some(inner) = weak.upgrade() else {
                return;
            };
            let claimed = inner.renewal.lock_or_recover().claim(generation);
            if !claimed {
                debug!(generation, "superseded renewal timer fired, ignoring");
                return;
            }

            debug!(generation, "renewal timer fired");
            // Failures are already reported inside renew().
            let _ = inner.renew().await;
        });

        timer.install(generation, due_at, handle);
        debug!(
            generation,
            due_at = %due_at,
            delay_secs = delay.as_secs(),
            "renewal scheduled"
        );
    }

    async fn renew(self: &Arc<Self>) -> Result<TokenBundle> {
        let epoch = self.epoch.load(Ordering::SeqCst);
        let request = self.config.authorize_request();

        let bundle = match self.provider.check_session(&request).await {
            Ok(bundle) if bundle.is_complete() => bundle,
            Ok(_) => return Err(self.fail_renewal(ProviderError::incomplete_tokens())),
            Err(error) => return Err(self.fail_renewal(error)),
        };

        {
            let mut state = self.state.lock_or_recover();
            if self.epoch.load(Ordering::SeqCst) != epoch {
                debug!("session changed while renewal was in flight, discarding tokens");
                return Err(SessionError::RenewalSuperseded);
            }
            self.establish(&mut state, &bundle);
        }

        if self.config.refresh_profile_on_renewal {
            self.profile.lock().await.take();
            debug!("cached profile dropped after renewal");
        }

        info!("session renewed");
        Ok(bundle)
    }

    fn fail_renewal(&self, error: ProviderError) -> SessionError {
        warn!(error = %error, "silent renewal failed, session will lapse at expiry");
        let err = SessionError::Provider(error);
        self.reporter.record_diagnostic("silent renewal", &err);
        err
    }

    fn fail_callback(&self, error: ProviderError) -> CallbackOutcome {
        self.navigator.push(Location::root());
        self.reporter.notify_user(&format!(
            "Error: {}. Check the logs for further details.",
            error.error
        ));
        self.reporter
            .record_diagnostic("login callback", &SessionError::Provider(error.clone()));
        CallbackOutcome::Failed { error }
    }

    /// The location saved before the login redirect, or `/`.
    fn stored_return_location(&self) -> Location {
        let raw = match self.store.get(&self.config.return_location_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Location::root(),
            Err(e) => {
                self.reporter.record_diagnostic("reading return location", &e);
                return Location::root();
            }
        };

        match serde_json::from_str::<Location>(&raw) {
            Ok(location) => location,
            Err(e) => {
                let err = SessionError::MalformedReturnLocation {
                    reason: e.to_string(),
                };
                self.reporter
                    .record_diagnostic("reading return location", &err);
                Location::root()
            }
        }
    }

    fn access_token(&self) -> Result<String> {
        self.state
            .lock_or_recover()
            .access_token()
            .map(String::from)
            .ok_or(SessionError::Unauthenticated)
    }

    async fn profile(&self) -> Result<UserProfile> {
        let mut cached = self.profile.lock().await;
        if let Some(profile) = cached.as_ref() {
            return Ok(profile.clone());
        }

        let access_token = self.access_token()?;
        match self.provider.fetch_user_info(&access_token).await {
            Ok(profile) => {
                debug!(sub = %profile.sub, "profile cached");
                *cached = Some(profile.clone());
                Ok(profile)
            }
            Err(error) => {
                let err = SessionError::Provider(error);
                self.reporter.record_diagnostic("profile fetch", &err);
                Err(err)
            }
        }
    }

    fn clear_session(&self) {
        let mut state = self.state.lock_or_recover();
        state.clear();
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.renewal.lock_or_recover().supersede();
        debug!("session cleared");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.renewal
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .supersede();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
