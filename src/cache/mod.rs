//! Lectern content cache.
//!
//! One process-wide [`CacheStore`] holds lookup results for every blog. Each
//! request talks to it through a [`ContentCache`] bound to the request's
//! locale, which suffixes keys so localized content never crosses languages.
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `lectern.toml`:
//!
//! ```toml
//! [cache]
//! capacity = 10000
//! short_seconds = 10
//! medium_seconds = 20
//! long_seconds = 30
//! single_flight = true
//! ```

mod config;
mod content;
mod flight;
mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub use content::{CacheError, CacheHandle, CachePolicy, ContentCache};
pub use flight::{FlightGuard, SingleFlight};
pub use keys::{CategoryRef, ContentKey};
pub use store::{CacheStore, CacheValue, InsertOptions};

pub(crate) use content::METRIC_CACHE_COALESCED;
pub(crate) use store::{METRIC_CACHE_EVICT, METRIC_CACHE_HIT, METRIC_CACHE_MISS};
