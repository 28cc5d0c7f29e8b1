//! rentdesk result cache
//!
//! An in-memory, bounded, TTL-based cache for remote query results with
//! table-scoped invalidation:
//!
//! - **Keys** are structured `(table, operation, params)` values with a
//!   canonical parameter rendering.
//! - **TTL** is chosen per table (`cars` 10 min, `bookings` 2 min,
//!   `profiles` 15 min, otherwise 5 min).
//! - **Eviction** removes the entry with the oldest store time once capacity
//!   is reached.
//! - **Invalidation** clears every entry of one table after a write.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 100
//! default_ttl_seconds = 300
//!
//! [[cache.ttl_rules]]
//! pattern = "bookings"
//! ttl_seconds = 120
//! ```

mod config;
mod keys;
pub(crate) mod lock;
mod stats;
mod store;

pub use config::{CacheConfig, TtlRule, default_ttl_rules};
pub use keys::{QueryKey, QueryParams, build_key, build_key_from, render_params};
pub use stats::CacheCounters;
pub use store::{CacheStore, CachedValue, Generation};
