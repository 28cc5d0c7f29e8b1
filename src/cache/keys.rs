//! Cache key construction.
//!
//! A `QueryKey` is structured as `(table, operation, params)` so table-scoped
//! invalidation matches tables exactly. Parameters are rendered canonically:
//! names sorted and quoted as JSON strings, nested objects rendered with
//! sorted keys, values as JSON.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Parameters of a cached query.
pub type QueryParams = Map<String, Value>;

const PARAM_SEPARATOR: char = '|';

/// Identifies one cached query result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    table: String,
    operation: String,
    params: String,
}

impl QueryKey {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Canonical parameter segment.
    pub fn params(&self) -> &str {
        &self.params
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.table, self.operation, self.params)
    }
}

/// Build the cache key for `operation` on `table` with `params`.
pub fn build_key(table: &str, operation: &str, params: &QueryParams) -> QueryKey {
    QueryKey {
        table: table.to_string(),
        operation: operation.to_string(),
        params: render_params(params),
    }
}

/// Build a key from any serializable parameter struct.
///
/// Non-object values are stored under a single `value` parameter.
pub fn build_key_from<T: Serialize>(table: &str, operation: &str, params: &T) -> QueryKey {
    let params = match serde_json::to_value(params) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => QueryParams::new(),
        Ok(other) => {
            let mut map = QueryParams::new();
            map.insert("value".to_string(), other);
            map
        }
        Err(err) => {
            let mut map = QueryParams::new();
            map.insert("unserializable".to_string(), Value::String(err.to_string()));
            map
        }
    };
    build_key(table, operation, &params)
}

/// Render `"name":value` pairs sorted by name and joined by `|`.
///
/// Names are JSON-quoted so separators inside a name cannot alias another
/// parameter set.
pub fn render_params(params: &QueryParams) -> String {
    let mut names: Vec<&String> = params.keys().collect();
    names.sort();

    let mut out = String::new();
    for (index, name) in names.into_iter().enumerate() {
        if index > 0 {
            out.push(PARAM_SEPARATOR);
        }
        write_name(name, &mut out);
        write_canonical(&params[name], &mut out);
    }
    out
}

fn write_name(name: &str, out: &mut String) {
    out.push_str(&Value::String(name.to_string()).to_string());
    out.push(':');
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (index, (name, inner)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_name(name, out);
                write_canonical(inner, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
