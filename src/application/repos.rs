//! Remote table store contract and the query shapes it accepts.

use async_trait::async_trait;
use rentdesk_types::SortOrder;
use serde_json::Value;
use thiserror::Error;

use crate::domain::records::Record;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("duplicate record: {message}")]
    Duplicate { message: String },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("remote store timeout")]
    Timeout,
    #[error("failed to decode remote response: {0}")]
    Decode(String),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Gte,
    Lte,
    /// Case-insensitive substring match.
    ILike,
    NotNull,
}

impl FilterOp {
    /// PostgREST operator name.
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Gte => "gte",
            FilterOp::Lte => "lte",
            FilterOp::ILike => "ilike",
            FilterOp::NotNull => "not.is",
        }
    }
}

/// A single column comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// A row filter. Top-level filters are combined with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Where(Predicate),
    /// Matches when any of the predicates matches.
    AnyOf(Vec<Predicate>),
}

impl Filter {
    fn predicate(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Filter::Where(Predicate {
            field: field.into(),
            op,
            value,
        })
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::predicate(field, FilterOp::Eq, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::predicate(field, FilterOp::Gte, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::predicate(field, FilterOp::Lte, value.into())
    }

    pub fn not_null(field: impl Into<String>) -> Self {
        Self::predicate(field, FilterOp::NotNull, Value::Null)
    }

    /// Case-insensitive substring match of `term` against any of `fields`.
    pub fn search(fields: &[&str], term: &str) -> Self {
        Filter::AnyOf(
            fields
                .iter()
                .map(|field| Predicate {
                    field: (*field).to_string(),
                    op: FilterOp::ILike,
                    value: Value::String(term.to_string()),
                })
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub direction: SortOrder,
}

/// Inclusive row window, zero based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub from: u64,
    pub to: u64,
}

impl RowRange {
    /// Rows of 1-based `page` when pages hold `limit` rows.
    pub fn page(page: u64, limit: u64) -> Self {
        let page = page.max(1);
        let limit = limit.max(1);
        let from = (page - 1).saturating_mul(limit);
        Self {
            from,
            to: from.saturating_add(limit - 1),
        }
    }

    /// Number of rows the window spans.
    pub fn rows(&self) -> u64 {
        self.to.saturating_sub(self.from) + 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub range: Option<RowRange>,
    pub limit: Option<u64>,
}

impl SelectQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            range: None,
            limit: None,
        }
    }

    pub fn columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, field: impl Into<String>, direction: SortOrder) -> Self {
        self.order = Some(Order {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn range(mut self, range: RowRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Table-scoped CRUD against the hosted data store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Record>, RepoError>;

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64, RepoError>;

    async fn insert(&self, table: &str, record: Record) -> Result<Record, RepoError>;

    async fn update(&self, table: &str, id: &str, patch: Record) -> Result<Record, RepoError>;

    async fn delete(&self, table: &str, id: &str) -> Result<(), RepoError>;
}
