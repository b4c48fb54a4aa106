//! Lock manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the lock manager.
///
/// Every timing tunable is injected here per manager instance; there are no
/// process-wide mutable knobs. Tests shrink the intervals, production code
/// keeps the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Period between refresh writes (milliseconds).
    ///
    /// Default: 300000ms (5 minutes).
    pub refresh_interval_ms: u64,

    /// Maximum tolerated age of the held record before the operation is
    /// cancelled (milliseconds).
    ///
    /// Default: 900000ms (15 minutes, 3x the refresh interval).
    pub refreshability_timeout_ms: u64,

    /// Age beyond which a foreign lock record is declared stale
    /// (milliseconds).
    ///
    /// Default: 1800000ms (30 minutes).
    pub stale_age_ms: u64,

    /// First backoff sleep when acquisition hits a conflict (milliseconds).
    ///
    /// Default: 1000ms (1 second).
    pub backoff_initial_ms: u64,

    /// Upper bound on a single backoff sleep (milliseconds).
    ///
    /// Default: 5000ms (5 seconds).
    pub backoff_cap_ms: u64,

    /// Attempts per backend operation on the scan, placement, and release
    /// paths, including the first. Refresh writes never retry internally;
    /// the refresh loop itself is the retry mechanism.
    ///
    /// Default: 3.
    pub backend_attempts: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 300_000,
            refreshability_timeout_ms: 900_000,
            stale_age_ms: 1_800_000,
            backoff_initial_ms: 1_000,
            backoff_cap_ms: 5_000,
            backend_attempts: 3,
        }
    }
}

impl LockConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the refresh interval.
    #[must_use]
    pub const fn with_refresh_interval_ms(mut self, ms: u64) -> Self {
        self.refresh_interval_ms = ms;
        self
    }

    /// Builder: set the refreshability timeout.
    #[must_use]
    pub const fn with_refreshability_timeout_ms(mut self, ms: u64) -> Self {
        self.refreshability_timeout_ms = ms;
        self
    }

    /// Builder: set the stale age.
    #[must_use]
    pub const fn with_stale_age_ms(mut self, ms: u64) -> Self {
        self.stale_age_ms = ms;
        self
    }

    /// Builder: set the initial backoff sleep.
    #[must_use]
    pub const fn with_backoff_initial_ms(mut self, ms: u64) -> Self {
        self.backoff_initial_ms = ms;
        self
    }

    /// Builder: set the backoff cap.
    #[must_use]
    pub const fn with_backoff_cap_ms(mut self, ms: u64) -> Self {
        self.backoff_cap_ms = ms;
        self
    }

    /// Get the refresh interval as a Duration.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Get the refreshability timeout as a Duration.
    #[must_use]
    pub const fn refreshability_timeout(&self) -> Duration {
        Duration::from_millis(self.refreshability_timeout_ms)
    }

    /// Get the stale age as a Duration.
    #[must_use]
    pub const fn stale_age(&self) -> Duration {
        Duration::from_millis(self.stale_age_ms)
    }

    /// Get the initial backoff sleep as a Duration.
    #[must_use]
    pub const fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    /// Get the backoff cap as a Duration.
    #[must_use]
    pub const fn backoff_cap(&self) -> Duration {
        Duration::from_millis(self.backoff_cap_ms)
    }

    /// Validate configuration, returning errors for invalid values.
    ///
    /// # Errors
    ///
    /// Returns error strings for any invalid configuration values.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.refresh_interval_ms == 0 {
            errors.push("refresh_interval_ms must be > 0".to_string());
        }
        if self.refreshability_timeout_ms < self.refresh_interval_ms {
            errors.push("refreshability_timeout_ms must be >= refresh_interval_ms".to_string());
        }
        if self.stale_age_ms == 0 {
            errors.push("stale_age_ms must be > 0".to_string());
        }
        if self.backoff_initial_ms == 0 {
            errors.push("backoff_initial_ms must be > 0".to_string());
        }
        if self.backoff_cap_ms < self.backoff_initial_ms {
            errors.push("backoff_cap_ms must be >= backoff_initial_ms".to_string());
        }
        if self.backend_attempts == 0 {
            errors.push("backend_attempts must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
