//! Bookkeeping for the single outstanding renewal timer.
//!
//! Every arm bumps a generation counter and aborts the previous task. A task
//! that wakes up must [`claim`](RenewalTimer::claim) its generation before
//! acting; a stale generation means it was superseded and must do nothing.

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub(crate) struct RenewalTimer {
    generation: u64,
    handle: Option<JoinHandle<()>>,
    due_at: Option<DateTime<Utc>>,
}

impl RenewalTimer {
    /// Invalidate any outstanding timer and return the next generation.
    pub(crate) fn supersede(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.due_at = None;
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation
    }

    /// Record the task armed for `generation`.
    pub(crate) fn install(&mut self, generation: u64, due_at: DateTime<Utc>, handle: JoinHandle<()>) {
        if generation != self.generation {
            handle.abort();
            return;
        }
        self.handle = Some(handle);
        self.due_at = Some(due_at);
    }

    /// Called by a firing task. Returns `true` if `generation` is still
    /// current, detaching the task so a re-arm from inside the renewal does
    /// not abort it.
    pub(crate) fn claim(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.handle = None;
        self.due_at = None;
        true
    }

    pub(crate) fn due_at(&self) -> Option<DateTime<Utc>> {
        self.due_at
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
