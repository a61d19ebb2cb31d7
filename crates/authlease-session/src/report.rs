//! Error reporting split between the user and the operator.

use crate::error::SessionError;

/// Receives failures that the session manager handles rather than returns.
pub trait ErrorReporter: Send + Sync {
    /// Show a short message to the user (e.g. a toast or banner).
    fn notify_user(&self, message: &str);

    /// Record full diagnostic detail for operators.
    fn record_diagnostic(&self, context: &str, error: &SessionError);
}

/// Reports everything through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn notify_user(&self, message: &str) {
        tracing::warn!(target: "authlease::user", notice = message, "user notification");
    }

    fn record_diagnostic(&self, context: &str, error: &SessionError) {
        tracing::error!(context = context, error = %error, "session error");
    }
}
