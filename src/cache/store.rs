//! Result cache storage.
//!
//! Entries are kept in insertion/refresh order; reads never change that order,
//! so the eviction victim is always the entry with the oldest `stored_at`.
//! A secondary index maps each table to its live keys for exact table-scoped
//! invalidation, and a per-table generation lets callers refuse to cache
//! results that were fetched across an invalidation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use lru::LruCache;
use rentdesk_types::{BookingStats, CacheStatsSnapshot, FilterOption, PaginationResult};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::domain::records::Record;

use super::config::CacheConfig;
use super::keys::QueryKey;
use super::lock::{rw_read, rw_write};
use super::stats::CacheCounters;

const SOURCE: &str = "cache::store";

/// Values the query layer stores.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Record(Option<Record>),
    Records(Arc<Vec<Record>>),
    Page(Arc<PaginationResult<Record>>),
    Options(Arc<Vec<FilterOption>>),
    Count(u64),
    BookingStats(BookingStats),
}

/// Snapshot of the invalidation state of one table.
///
/// Obtained before a remote fetch and handed back to
/// [`CacheStore::set_if_current`] once the fetch completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    clear_epoch: u64,
    table_epoch: u64,
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.stored_at) >= ttl
    }
}

enum Lookup<V> {
    Live(V),
    Expired,
    Absent,
}

struct Inner<V> {
    entries: LruCache<QueryKey, CacheEntry<V>>,
    tables: HashMap<String, HashSet<QueryKey>>,
    table_epochs: HashMap<String, u64>,
    clear_epoch: u64,
}

impl<V> Inner<V> {
    fn index(&mut self, key: &QueryKey) {
        self.tables
            .entry(key.table().to_string())
            .or_default()
            .insert(key.clone());
    }

    fn unindex(&mut self, key: &QueryKey) {
        if let Some(keys) = self.tables.get_mut(key.table()) {
            keys.remove(key);
            if keys.is_empty() {
                self.tables.remove(key.table());
            }
        }
    }

    fn remove(&mut self, key: &QueryKey) -> Option<CacheEntry<V>> {
        let entry = self.entries.pop(key)?;
        self.unindex(key);
        Some(entry)
    }

    fn generation(&self, table: &str) -> Generation {
        Generation {
            clear_epoch: self.clear_epoch,
            table_epoch: self.table_epochs.get(table).copied().unwrap_or(0),
        }
    }
}

/// Bounded TTL cache shared by the query façade and the mutation gateway.
///
/// Construct one per application (or per test) and share it through `Arc`.
pub struct CacheStore<V = CachedValue> {
    config: CacheConfig,
    inner: RwLock<Inner<V>>,
    counters: CacheCounters,
}

impl<V: Clone> CacheStore<V> {
    pub fn new(config: CacheConfig) -> Self {
        let entries = LruCache::new(config.capacity_non_zero());
        Self {
            config,
            inner: RwLock::new(Inner {
                entries,
                tables: HashMap::new(),
                table_epochs: HashMap::new(),
                clear_epoch: 0,
            }),
            counters: CacheCounters::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity_non_zero().get()
    }

    /// TTL applied to `key`.
    pub fn ttl(&self, key: &QueryKey) -> Duration {
        self.config.ttl_for_table(key.table())
    }

    /// Look up a live entry. Expired entries are removed and reported absent.
    pub fn get(&self, key: &QueryKey) -> Option<V> {
        if !self.config.enabled {
            return None;
        }

        let ttl = self.ttl(key);
        let now = Instant::now();
        let lookup = {
            let mut inner = rw_write(&self.inner, SOURCE, "get");
            match inner.entries.peek(key) {
                None => Lookup::Absent,
                Some(entry) if !entry.is_expired(now, ttl) => Lookup::Live(entry.value.clone()),
                Some(_) => {
                    inner.remove(key);
                    Lookup::Expired
                }
            }
        };

        match lookup {
            Lookup::Live(value) => {
                self.counters.record_hit(key.table());
                Some(value)
            }
            Lookup::Expired => {
                debug!(cache_key = %key, ttl_secs = ttl.as_secs(), "Cache entry expired");
                self.counters.record_expiration(key.table());
                self.counters.record_miss(key.table());
                None
            }
            Lookup::Absent => {
                self.counters.record_miss(key.table());
                None
            }
        }
    }

    /// Store `value` under `key`, evicting the oldest entry when full.
    pub fn set(&self, key: QueryKey, value: V) {
        if !self.config.enabled {
            return;
        }
        let mut inner = rw_write(&self.inner, SOURCE, "set");
        self.insert_locked(&mut inner, key, value);
    }

    /// Store `value` only if `table`'s generation still equals `generation`.
    ///
    /// Returns whether the value was stored.
    pub fn set_if_current(&self, key: QueryKey, value: V, generation: Generation) -> bool {
        if !self.config.enabled {
            return false;
        }
        let mut inner = rw_write(&self.inner, SOURCE, "set_if_current");
        if inner.generation(key.table()) != generation {
            debug!(
                cache_key = %key,
                "Skipping cache store: table invalidated while fetching"
            );
            return false;
        }
        self.insert_locked(&mut inner, key, value);
        true
    }

    fn insert_locked(&self, inner: &mut Inner<V>, key: QueryKey, value: V) {
        let replacing = inner.entries.contains(&key);
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
        };

        if let Some((evicted_key, _)) = inner.entries.push(key.clone(), entry)
            && !replacing
        {
            inner.unindex(&evicted_key);
            debug!(cache_key = %evicted_key, "Evicted oldest cache entry");
            self.counters.record_eviction(evicted_key.table());
        }
        inner.index(&key);
    }

    /// Current generation of `table`.
    pub fn generation(&self, table: &str) -> Generation {
        rw_read(&self.inner, SOURCE, "generation").generation(table)
    }

    /// Remove `key` if present.
    pub fn delete(&self, key: &QueryKey) {
        rw_write(&self.inner, SOURCE, "delete").remove(key);
    }

    /// Remove every entry belonging to `table`. Returns how many were removed.
    pub fn clear_table(&self, table: &str) -> usize {
        let removed = {
            let mut inner = rw_write(&self.inner, SOURCE, "clear_table");
            *inner.table_epochs.entry(table.to_string()).or_insert(0) += 1;
            let keys = inner.tables.remove(table).unwrap_or_default();
            keys.iter()
                .filter(|key| inner.entries.pop(*key).is_some())
                .count()
        };

        info!(table, removed, "Cache invalidated for table");
        self.counters.record_invalidation(table, removed);
        removed
    }

    /// Remove everything.
    pub fn clear(&self) {
        let mut inner = rw_write(&self.inner, SOURCE, "clear");
        inner.entries.clear();
        inner.tables.clear();
        inner.clear_epoch += 1;
    }

    /// Drop every expired entry now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<QueryKey> = {
            let mut inner = rw_write(&self.inner, SOURCE, "purge_expired");
            let expired: Vec<QueryKey> = inner
                .entries
                .iter()
                .filter(|(key, entry)| entry.is_expired(now, self.ttl(key)))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &expired {
                inner.remove(key);
            }
            expired
        };

        for key in &expired {
            self.counters.record_expiration(key.table());
        }
        expired.len()
    }

    /// Number of stored entries, including ones that expired but were not
    /// yet purged.
    pub fn len(&self) -> usize {
        rw_read(&self.inner, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is physically stored, regardless of expiry.
    pub fn contains(&self, key: &QueryKey) -> bool {
        rw_read(&self.inner, SOURCE, "contains")
            .entries
            .contains(key)
    }

    /// Keys currently indexed under `table`.
    pub fn keys_for_table(&self, table: &str) -> Vec<QueryKey> {
        rw_read(&self.inner, SOURCE, "keys_for_table")
            .tables
            .get(table)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }

    /// Size, capacity, keys (oldest first) and lookup ratios.
    pub fn stats(&self) -> CacheStatsSnapshot {
        let inner = rw_read(&self.inner, SOURCE, "stats");
        let size = inner.entries.len();
        let keys = inner
            .entries
            .iter()
            .rev()
            .map(|(key, _)| key.to_string())
            .collect();
        drop(inner);

        let max_size = self.capacity();
        CacheStatsSnapshot {
            size,
            max_size,
            keys,
            hits: self.counters.hits(),
            misses: self.counters.misses(),
            hit_rate: self.counters.hit_rate(),
            utilization: size as f64 / max_size as f64 * 100.0,
        }
    }
}

impl<V> std::fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size = rw_read(&self.inner, SOURCE, "debug").entries.len();
        f.debug_struct("CacheStore")
            .field("enabled", &self.config.enabled)
            .field("capacity", &self.config.capacity)
            .field("size", &size)
            .finish()
    }
}
