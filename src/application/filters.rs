//! Translation of listing filters into remote predicates.
//!
//! Filter values arrive as loose JSON keyed by column name:
//!
//! - scalars become equality predicates;
//! - `{"min": a, "max": b}` becomes `gte`/`lte` (either bound may be absent);
//! - `search` matches the table's search columns case-insensitively;
//! - `date_range` of `today`, `week`, `month` or `year` keeps rows whose date
//!   column falls in that period;
//! - `null`, `""` and `"all"` mean "no filter".

use serde_json::Value;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime, Time};
use tracing::debug;

use crate::application::repos::Filter;
use crate::cache::QueryParams;
use crate::domain::tables::{date_field, search_fields};

pub const SEARCH_FILTER: &str = "search";
pub const DATE_FILTER: &str = "date_range";

const RANGE_MIN: &str = "min";
const RANGE_MAX: &str = "max";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBucket {
    Today,
    Week,
    Month,
    Year,
}

impl DateBucket {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "today" => Some(DateBucket::Today),
            "week" => Some(DateBucket::Week),
            "month" => Some(DateBucket::Month),
            "year" => Some(DateBucket::Year),
            _ => None,
        }
    }

    /// Start of the bucket as seen from `now`.
    pub fn since(self, now: OffsetDateTime) -> OffsetDateTime {
        match self {
            DateBucket::Today => now.replace_time(Time::MIDNIGHT),
            DateBucket::Week => now - Duration::days(7),
            DateBucket::Month => now - Duration::days(30),
            DateBucket::Year => now - Duration::days(365),
        }
    }
}

/// Whether a filter value means "do not filter".
pub fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty() || text.eq_ignore_ascii_case("all"),
        _ => false,
    }
}

/// Predicates for `filters` on `table`, evaluated against `now`.
pub fn translate(table: &str, filters: &QueryParams, now: OffsetDateTime) -> Vec<Filter> {
    let mut translated = Vec::with_capacity(filters.len());

    for (name, value) in filters {
        if is_unset(value) {
            continue;
        }

        match (name.as_str(), value) {
            (SEARCH_FILTER, Value::String(term)) => {
                let term = term.trim();
                if !term.is_empty() {
                    translated.push(Filter::search(search_fields(table), term));
                }
            }
            (DATE_FILTER, Value::String(bucket)) => {
                if let Some(filter) = date_filter(table, bucket, now) {
                    translated.push(filter);
                }
            }
            (_, Value::Object(bounds)) => {
                let mut matched = false;
                if let Some(min) = bounds.get(RANGE_MIN).filter(|v| !is_unset(v)) {
                    translated.push(Filter::gte(name.as_str(), min.clone()));
                    matched = true;
                }
                if let Some(max) = bounds.get(RANGE_MAX).filter(|v| !is_unset(v)) {
                    translated.push(Filter::lte(name.as_str(), max.clone()));
                    matched = true;
                }
                if !matched {
                    debug!(filter = %name, "Ignoring object filter without min/max bounds");
                }
            }
            (_, Value::Array(_)) => {
                debug!(filter = %name, "Ignoring unsupported list filter");
            }
            _ => translated.push(Filter::eq(name.as_str(), value.clone())),
        }
    }

    translated
}

fn date_filter(table: &str, bucket: &str, now: OffsetDateTime) -> Option<Filter> {
    let Some(bucket) = DateBucket::parse(bucket) else {
        debug!(bucket, "Ignoring unknown date bucket");
        return None;
    };

    match bucket.since(now).format(&Rfc3339) {
        Ok(since) => Some(Filter::gte(date_field(table), since)),
        Err(err) => {
            debug!(error = %err, "Ignoring unformattable date bucket");
            None
        }
    }
}
