//! Host navigation capability.

use std::sync::Mutex;

use crate::sync::MutexExt;
use crate::types::Location;

/// Reads and changes where the user is inside the host application.
pub trait Navigator: Send + Sync {
    /// The location the user is currently at.
    fn current_location(&self) -> Location;

    /// Navigate to `location`.
    fn push(&self, location: Location);
}

/// In-memory history stack. The last entry is the current location.
#[derive(Debug)]
pub struct MemoryNavigator {
    history: Mutex<Vec<Location>>,
}

impl MemoryNavigator {
    /// Start with a single entry at `initial`.
    pub fn new(initial: Location) -> Self {
        Self {
            history: Mutex::new(vec![initial]),
        }
    }

    /// Every location visited so far, oldest first.
    pub fn history(&self) -> Vec<Location> {
        self.history.lock_or_recover().clone()
    }
}

impl Default for MemoryNavigator {
    fn default() -> Self {
        Self::new(Location::root())
    }
}

impl Navigator for MemoryNavigator {
    fn current_location(&self) -> Location {
        self.history
            .lock_or_recover()
            .last()
            .cloned()
            .unwrap_or_default()
    }

    fn push(&self, location: Location) {
        tracing::debug!(location = %location, "navigating");
        self.history.lock_or_recover().push(location);
    }
}
