//! Cache configuration.
//!
//! Controls capacity and the per-table TTL policy via `rentdesk.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

// Default values for cache configuration
const DEFAULT_CAPACITY: usize = 100;
const DEFAULT_TTL_SECS: u64 = 5 * 60;
const CARS_TTL_SECS: u64 = 10 * 60;
const BOOKINGS_TTL_SECS: u64 = 2 * 60;
const PROFILES_TTL_SECS: u64 = 15 * 60;

/// Assigns a TTL to every table whose name contains `pattern`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlRule {
    pub pattern: String,
    pub ttl: Duration,
}

impl TtlRule {
    pub fn new(pattern: impl Into<String>, ttl: Duration) -> Self {
        Self {
            pattern: pattern.into(),
            ttl,
        }
    }

    fn matches(&self, table: &str) -> bool {
        table.contains(self.pattern.as_str())
    }
}

/// Cache configuration, built from the loaded `[cache]` settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve and store results at all.
    pub enabled: bool,
    /// Maximum number of live entries.
    pub capacity: usize,
    /// TTL for tables no rule matches.
    pub default_ttl: Duration,
    /// Evaluated in order; the first matching rule wins.
    pub ttl_rules: Vec<TtlRule>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: DEFAULT_CAPACITY,
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            ttl_rules: default_ttl_rules(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            capacity: settings.capacity.get(),
            default_ttl: settings.default_ttl,
            ttl_rules: settings.ttl_rules.clone(),
        }
    }
}

impl CacheConfig {
    /// Returns the capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }

    /// TTL for entries belonging to `table`.
    pub fn ttl_for_table(&self, table: &str) -> Duration {
        self.ttl_rules
            .iter()
            .find(|rule| rule.matches(table))
            .map(|rule| rule.ttl)
            .unwrap_or(self.default_ttl)
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Built-in TTL rules: `cars` 10 min, `bookings` 2 min, `profiles` 15 min.
pub fn default_ttl_rules() -> Vec<TtlRule> {
    vec![
        TtlRule::new("cars", Duration::from_secs(CARS_TTL_SECS)),
        TtlRule::new("bookings", Duration::from_secs(BOOKINGS_TTL_SECS)),
        TtlRule::new("profiles", Duration::from_secs(PROFILES_TTL_SECS)),
    ]
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.capacity, 100);
        assert_eq!(config.default_ttl, Duration::from_secs(300));
        assert_eq!(config.ttl_rules.len(), 3);
    }

    #[test]
    fn ttl_policy_by_table() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl_for_table("cars"), Duration::from_secs(600));
        assert_eq!(config.ttl_for_table("bookings"), Duration::from_secs(120));
        assert_eq!(config.ttl_for_table("profiles"), Duration::from_secs(900));
        assert_eq!(config.ttl_for_table("locations"), Duration::from_secs(300));
    }

    #[test]
    fn ttl_rules_match_by_substring() {
        let config = CacheConfig::default();
        assert_eq!(
            config.ttl_for_table("archived_bookings"),
            Duration::from_secs(120)
        );
        assert_eq!(config.ttl_for_table("car"), Duration::from_secs(300));
    }

    #[test]
    fn first_matching_rule_wins() {
        let config = CacheConfig {
            ttl_rules: vec![
                TtlRule::new("cars", Duration::from_secs(1)),
                TtlRule::new("cars_archive", Duration::from_secs(2)),
            ],
            ..Default::default()
        };
        assert_eq!(config.ttl_for_table("cars_archive"), Duration::from_secs(1));
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig::default().with_capacity(0);
        assert_eq!(config.capacity_non_zero().get(), 1);
    }

    #[test]
    fn built_from_loaded_settings() {
        let settings = crate::config::CacheSettings {
            enabled: false,
            capacity: NonZeroUsize::new(7).expect("non-zero"),
            default_ttl: Duration::from_secs(30),
            ttl_rules: vec![TtlRule::new("invoices", Duration::from_secs(45))],
        };
        let config = CacheConfig::from(&settings);
        assert!(!config.enabled);
        assert_eq!(config.capacity, 7);
        assert_eq!(config.ttl_for_table("invoices"), Duration::from_secs(45));
        assert_eq!(config.ttl_for_table("cars"), Duration::from_secs(30));
    }
}
