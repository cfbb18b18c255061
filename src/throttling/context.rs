//! Shared dependencies of every throttler.

use std::sync::Arc;

use crate::throttling::clock::{Clock, SystemClock};
use crate::throttling::store::{MemoryThrottleStore, ThrottleStore};

pub const DEFAULT_KEY_PREFIX: &str = "throttle";

/// Store, clock and switches, built once at startup and handed to throttlers.
#[derive(Clone)]
pub struct ThrottleContext {
    pub store: Arc<dyn ThrottleStore>,
    pub clock: Arc<dyn Clock>,
    pub enabled: bool,
    pub key_prefix: String,
}

impl ThrottleContext {
    pub fn new(store: Arc<dyn ThrottleStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            enabled: true,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// In-memory store on a given clock.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(MemoryThrottleStore::with_clock(clock.clone()));
        Self::new(store, clock)
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

impl Default for ThrottleContext {
    fn default() -> Self {
        Self::in_memory(Arc::new(SystemClock))
    }
}
