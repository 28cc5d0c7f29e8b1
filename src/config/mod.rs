//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroUsize, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::{TtlRule, default_ttl_rules};

mod cli;

pub use cli::{
    CliArgs, Command, ListArgs, OptionsArgs, RowArgs, SettingsOverrides, SuggestArgs, UpdateArgs,
    parse_filter,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "rentdesk";
const ENV_PREFIX: &str = "RENTDESK";
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REMOTE_SCHEMA: &str = "public";
const DEFAULT_CACHE_CAPACITY: u64 = 100;
const DEFAULT_CACHE_TTL_SECS: u64 = 5 * 60;

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub remote: RemoteSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub schema: String,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: NonZeroUsize,
    pub default_ttl: Duration,
    pub ttl_rules: Vec<TtlRule>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    remote: RawRemoteSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &SettingsOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.remote_url.as_ref() {
            self.remote.url = Some(url.clone());
        }
        if let Some(key) = overrides.remote_api_key.as_ref() {
            self.remote.api_key = Some(key.clone());
        }
        if let Some(seconds) = overrides.remote_timeout_seconds {
            self.remote.timeout_seconds = Some(seconds);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(capacity) = overrides.cache_capacity {
            self.cache.capacity = Some(capacity);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            remote,
            cache,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let remote = build_remote_settings(remote)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self {
            logging,
            remote,
            cache,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_remote_settings(remote: RawRemoteSettings) -> Result<RemoteSettings, LoadError> {
    let url = non_blank(remote.url);
    let api_key = non_blank(remote.api_key);

    let timeout_seconds = remote
        .timeout_seconds
        .unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "remote.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let schema = non_blank(remote.schema).unwrap_or_else(|| DEFAULT_REMOTE_SCHEMA.to_string());

    Ok(RemoteSettings {
        url,
        api_key,
        timeout: Duration::from_secs(timeout_seconds),
        schema,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let capacity = non_zero_usize(
        cache.capacity.unwrap_or(DEFAULT_CACHE_CAPACITY),
        "cache.capacity",
    )?;

    let default_ttl_seconds = cache.default_ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS);
    if default_ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.default_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let ttl_rules = match cache.ttl_rules {
        Some(rules) => rules
            .into_iter()
            .map(build_ttl_rule)
            .collect::<Result<Vec<_>, _>>()?,
        None => default_ttl_rules(),
    };

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        capacity,
        default_ttl: Duration::from_secs(default_ttl_seconds),
        ttl_rules,
    })
}

fn build_ttl_rule(rule: RawTtlRule) -> Result<TtlRule, LoadError> {
    let pattern = rule.pattern.trim();
    if pattern.is_empty() {
        return Err(LoadError::invalid(
            "cache.ttl_rules.pattern",
            "must not be empty",
        ));
    }
    if rule.ttl_seconds == 0 {
        return Err(LoadError::invalid(
            "cache.ttl_rules.ttl_seconds",
            format!("rule `{pattern}` must have a TTL greater than zero"),
        ));
    }
    Ok(TtlRule::new(pattern, Duration::from_secs(rule.ttl_seconds)))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRemoteSettings {
    url: Option<String>,
    api_key: Option<String>,
    timeout_seconds: Option<u64>,
    schema: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    capacity: Option<u64>,
    default_ttl_seconds: Option<u64>,
    ttl_rules: Option<Vec<RawTtlRule>>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTtlRule {
    pattern: String,
    ttl_seconds: u64,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
