//! Client-side authentication session lifecycle.
//!
//! This crate tracks the identity and access tokens obtained through a
//! redirect-based OAuth 2.0 / OIDC implicit flow and manages them for the
//! life of the running application:
//!
//! - **Login and callback**: remember where the user was, redirect to the
//!   provider, and restore that location once tokens come back.
//! - **Session state**: tokens, expiry instant and granted scopes, updated
//!   as one unit.
//! - **Silent renewal**: a single self-rearming timer that re-checks the
//!   provider session when the tokens expire.
//! - **Authorization checks**: granted scopes versus required scopes.
//! - **Profile cache**: the user-info response, fetched at most once.
//!
//! The wire protocol is not implemented here. The host supplies an
//! [`IdentityProvider`], a [`Navigator`] and a [`KeyValueStore`].
//!
//! # Architecture
//!
//! ```text
//! SessionManager
//! ├── SessionState     (tokens, expiry, scopes)
//! ├── RenewalTimer     (generation-guarded tokio task)
//! ├── IdentityProvider (authorize / parse_callback / check_session / user info / logout)
//! ├── Navigator        (current location, push)
//! ├── KeyValueStore    (return location across the redirect)
//! └── ErrorReporter    (user notices + operator diagnostics)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use authlease_session::{
//!     IdentityProvider, MemoryNavigator, SessionConfig, SessionManager, SqliteStore,
//! };
//!
//! # async fn example(provider: Arc<dyn IdentityProvider>) -> authlease_session::Result<()> {
//! let config = SessionConfig::new(
//!     "tenant.auth0.com",
//!     "my-client-id",
//!     "http://localhost:3000/callback",
//!     "http://localhost:3000",
//! )?;
//!
//! let manager = SessionManager::new(
//!     config,
//!     provider,
//!     Arc::new(MemoryNavigator::default()),
//!     Arc::new(SqliteStore::open("data/session.db")?),
//! );
//!
//! manager.login().await?;
//! // ... after the provider redirects back:
//! manager
//!     .handle_authentication("http://localhost:3000/callback#access_token=...")
//!     .await;
//!
//! if manager.is_authenticated() && manager.has_scopes(&["read:courses"]) {
//!     let token = manager.access_token()?;
//!     println!("bearer {token}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod navigation;
pub mod provider;
pub mod report;
pub mod state;
pub mod store;
pub mod types;

mod renewal;
mod sync;

// Re-export key types at the crate root for convenience.
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SessionConfig;
pub use error::{ProviderError, Result, SessionError};
pub use manager::{CallbackOutcome, SessionManager, SessionManagerBuilder};
pub use navigation::{MemoryNavigator, Navigator};
pub use provider::IdentityProvider;
pub use report::{ErrorReporter, TracingReporter};
pub use state::{SessionState, SessionTokens, parse_scopes};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};
pub use types::{AuthorizeRequest, Location, LogoutRequest, TokenBundle, UserProfile};
