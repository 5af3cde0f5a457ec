//! Cache configuration.
//!
//! Controls store capacity, the three expiration classes used by the content
//! lookups, and miss coalescing via `lectern.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

// Default values for cache configuration
const DEFAULT_CAPACITY: usize = 10_000;
const DEFAULT_SHORT_SECS: u64 = 10;
const DEFAULT_MEDIUM_SECS: u64 = 20;
const DEFAULT_LONG_SECS: u64 = 30;

/// Cache configuration resolved from settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum live entries before least-recently-used eviction.
    pub capacity: usize,
    /// Expiration for volatile lookups (lists by tag/category, feedback).
    pub short: Duration,
    /// Expiration for entries resolved by name.
    pub medium: Duration,
    /// Expiration for archive lookups and tag clouds.
    pub long: Duration,
    /// Coalesce concurrent misses for one key into a single producer call.
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            short: Duration::from_secs(DEFAULT_SHORT_SECS),
            medium: Duration::from_secs(DEFAULT_MEDIUM_SECS),
            long: Duration::from_secs(DEFAULT_LONG_SECS),
            single_flight: true,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            capacity: settings.capacity,
            short: settings.short_duration,
            medium: settings.medium_duration,
            long: settings.long_duration,
            single_flight: settings.single_flight,
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
