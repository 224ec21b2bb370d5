//! Configuration for the booking flows.

use std::env;
use std::time::Duration;

/// Booking configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingConfig {
    /// Upper bound on every store call, transaction steps included.
    ///
    /// Default: 5 seconds
    pub store_timeout: Duration,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
        }
    }
}

impl BookingConfig {
    /// Create configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `STORE_TIMEOUT_MS`; missing or unparsable values keep the default.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env::var("STORE_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.store_timeout = Duration::from_millis(ms);
        }
        config
    }

    /// Set the persistence deadline.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}
