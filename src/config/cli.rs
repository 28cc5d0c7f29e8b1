use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use rentdesk_types::SortOrder;
use serde_json::{Map, Value};

use crate::application::pagination::DEFAULT_PAGE_SIZE;

const RANGE_SEPARATOR: &str = "..";

/// Command-line arguments for the rentdesk binary.
#[derive(Debug, Parser)]
#[command(
    name = "rentdesk",
    version,
    about = "Cache-aware admin queries for the car-rental back office"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "RENTDESK_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub config_file: Option<PathBuf>,

    /// Answer from the built-in demo dataset instead of the remote store.
    #[arg(long, global = true)]
    pub memory: bool,

    /// Print cache statistics to stderr after the command finishes.
    #[arg(long = "cache-stats", global = true)]
    pub cache_stats: bool,

    #[command(flatten)]
    pub overrides: SettingsOverrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SettingsOverrides {
    /// Override the base log level (trace, debug, info, warn, error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the remote store base URL.
    #[arg(long = "remote-url", value_name = "URL", value_hint = ValueHint::Url, global = true)]
    pub remote_url: Option<String>,

    /// Override the remote store API key.
    #[arg(long = "remote-api-key", value_name = "KEY", global = true)]
    pub remote_api_key: Option<String>,

    /// Override the remote request timeout.
    #[arg(long = "remote-timeout-seconds", value_name = "SECONDS", global = true)]
    pub remote_timeout_seconds: Option<u64>,

    /// Enable or disable the result cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub cache_enabled: Option<bool>,

    /// Override the maximum number of cached results.
    #[arg(long = "cache-capacity", value_name = "ENTRIES", global = true)]
    pub cache_capacity: Option<u64>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List one page of a table.
    List(ListArgs),
    /// Distinct values of a column, for filter dropdowns.
    Options(OptionsArgs),
    /// Rows whose search columns contain a term.
    Suggest(SuggestArgs),
    /// Fetch one row by id.
    Get(RowArgs),
    /// Patch one row with a JSON object.
    Update(UpdateArgs),
    /// Delete one row by id.
    Delete(RowArgs),
    /// Headline counts and booking revenue.
    Dashboard,
}

#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    pub table: String,

    #[arg(long, default_value_t = 1)]
    pub page: u64,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub limit: u64,

    /// Public sort key such as `price` or `customer`.
    #[arg(long)]
    pub sort: Option<String>,

    #[arg(long, default_value = "desc", value_parser = parse_sort_order)]
    pub order: SortOrder,

    /// `field=value` or `field=min..max`; repeatable.
    #[arg(long = "filter", value_name = "FIELD=VALUE", value_parser = parse_filter)]
    pub filters: Vec<(String, Value)>,

    /// Embedded resource such as `profiles(full_name,email,phone)`; repeatable.
    #[arg(long = "join", value_name = "RESOURCE")]
    pub joins: Vec<String>,
}

#[derive(Debug, Args, Clone)]
pub struct OptionsArgs {
    pub table: String,
    pub field: String,
}

#[derive(Debug, Args, Clone)]
pub struct SuggestArgs {
    pub table: String,
    pub term: String,

    #[arg(long, default_value_t = 10)]
    pub limit: u64,
}

#[derive(Debug, Args, Clone)]
pub struct RowArgs {
    pub table: String,
    pub id: String,
}

#[derive(Debug, Args, Clone)]
pub struct UpdateArgs {
    pub table: String,
    pub id: String,

    /// JSON object with the columns to change.
    #[arg(value_parser = parse_patch)]
    pub patch: Map<String, Value>,
}

fn parse_sort_order(raw: &str) -> Result<SortOrder, String> {
    raw.parse()
}

/// Parse `field=value` or `field=min..max`. Values that read as JSON scalars
/// (numbers, booleans) keep that type; everything else is a string.
pub fn parse_filter(raw: &str) -> Result<(String, Value), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got `{raw}`"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("missing field name in `{raw}`"));
    }

    let value = match value.split_once(RANGE_SEPARATOR) {
        Some((min, max)) => {
            let mut bounds = Map::new();
            if !min.trim().is_empty() {
                bounds.insert("min".to_string(), scalar(min));
            }
            if !max.trim().is_empty() {
                bounds.insert("max".to_string(), scalar(max));
            }
            if bounds.is_empty() {
                return Err(format!("range filter `{raw}` has no bounds"));
            }
            Value::Object(bounds)
        }
        None => scalar(value),
    };

    Ok((field.to_string(), value))
}

fn scalar(raw: &str) -> Value {
    let raw = raw.trim();
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
        _ => Value::String(raw.to_string()),
    }
}

fn parse_patch(raw: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(patch)) => Ok(patch),
        Ok(_) => Err("patch must be a JSON object".to_string()),
        Err(err) => Err(format!("invalid JSON: {err}")),
    }
}
