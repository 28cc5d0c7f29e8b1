//! Cache-aware reads against the remote table store.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use rentdesk_types::{BookingStats, FilterOption, PaginationResult, SortOrder};
use serde_json::{Value, json};
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::application::filters::translate;
use crate::application::pagination::PageQuery;
use crate::application::repos::{Filter, RemoteStore, RepoError, RowRange, SelectQuery};
use crate::cache::{CacheStore, CachedValue, QueryKey, QueryParams, build_key, build_key_from};
use crate::domain::bookings::{BookingStatus, ensure_profile};
use crate::domain::records::{Record, scalar_text};
use crate::domain::tables::{self, BOOKINGS, is_booking_table, search_fields, sort_field};

pub(crate) const METRIC_REMOTE_QUERY_MS: &str = "rentdesk_remote_query_ms";

pub const OP_PAGINATED: &str = "getPaginated";
pub const OP_FILTER_OPTIONS: &str = "getFilterOptions";
pub const OP_SUGGESTIONS: &str = "getSearchSuggestions";
pub const OP_ALL: &str = "getAll";
pub const OP_BY_ID: &str = "getById";
pub const OP_COUNT: &str = "count";
pub const OP_STATS: &str = "getStats";

/// Shortest search term that reaches the remote store.
pub const MIN_SEARCH_TERM_CHARS: usize = 2;

/// Values the façade knows how to keep in the shared cache.
trait Cacheable: Sized {
    fn into_cached(self) -> CachedValue;
    fn from_cached(value: CachedValue) -> Option<Self>;
}

impl Cacheable for Arc<PaginationResult<Record>> {
    fn into_cached(self) -> CachedValue {
        CachedValue::Page(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Page(page) => Some(page),
            _ => None,
        }
    }
}

impl Cacheable for Arc<Vec<Record>> {
    fn into_cached(self) -> CachedValue {
        CachedValue::Records(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Records(rows) => Some(rows),
            _ => None,
        }
    }
}

impl Cacheable for Option<Record> {
    fn into_cached(self) -> CachedValue {
        CachedValue::Record(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Record(row) => Some(row),
            _ => None,
        }
    }
}

impl Cacheable for Arc<Vec<FilterOption>> {
    fn into_cached(self) -> CachedValue {
        CachedValue::Options(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Options(options) => Some(options),
            _ => None,
        }
    }
}

impl Cacheable for u64 {
    fn into_cached(self) -> CachedValue {
        CachedValue::Count(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::Count(count) => Some(count),
            _ => None,
        }
    }
}

impl Cacheable for BookingStats {
    fn into_cached(self) -> CachedValue {
        CachedValue::BookingStats(self)
    }

    fn from_cached(value: CachedValue) -> Option<Self> {
        match value {
            CachedValue::BookingStats(stats) => Some(stats),
            _ => None,
        }
    }
}

/// Read side of the data layer.
///
/// Every operation looks in the cache first and only stores successful
/// results. Remote errors are returned as-is and never fall back to stale
/// entries.
#[derive(Clone)]
pub struct QueryFacade {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<CacheStore>,
}

impl QueryFacade {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: Arc<CacheStore>) -> Self {
        Self { remote, cache }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// One filtered, sorted page of `table`.
    #[instrument(skip(self, query), fields(page = query.page, limit = query.limit))]
    pub async fn get_paginated_data(
        &self,
        table: &str,
        query: &PageQuery,
    ) -> Result<Arc<PaginationResult<Record>>, RepoError> {
        let query = query.normalized();
        let key = build_key_from(table, OP_PAGINATED, &query);

        self.cached(key, async {
            let filters = translate(table, &query.filters, OffsetDateTime::now_utc());
            let select = page_select(table, &query, &filters, query.window());

            let (total, mut rows) = timed(table, OP_PAGINATED, async {
                tokio::try_join!(
                    self.remote.count(table, &filters),
                    self.remote.select(&select)
                )
            })
            .await?;

            // Past the end: serve the last page the count allows.
            let last_page = total.div_ceil(query.limit);
            if last_page > 0 && query.page > last_page {
                debug!(
                    requested = query.page,
                    last_page, "Requested page out of range, fetching last page"
                );
                let window = RowRange::page(last_page, query.limit);
                let select = page_select(table, &query, &filters, window);
                rows = timed(table, OP_PAGINATED, self.remote.select(&select)).await?;
            }

            let rows = post_process(table, rows);
            Ok(Arc::new(PaginationResult::new(
                rows,
                query.page,
                query.limit,
                total,
            )))
        })
        .await
    }

    /// Distinct values of `field`, sorted, with a capitalized label.
    #[instrument(skip(self))]
    pub async fn get_filter_options(
        &self,
        table: &str,
        field: &str,
    ) -> Result<Arc<Vec<FilterOption>>, RepoError> {
        let key = build_key(table, OP_FILTER_OPTIONS, &params([("field", json!(field))]));

        self.cached(key, async {
            let select = SelectQuery::new(table)
                .columns(field)
                .filter(Filter::not_null(field));
            let rows = timed(table, OP_FILTER_OPTIONS, self.remote.select(&select)).await?;
            Ok(Arc::new(filter_options(&rows, field)))
        })
        .await
    }

    /// Rows whose search columns contain `term`. Terms shorter than two
    /// characters return nothing without touching the remote store or cache.
    #[instrument(skip(self))]
    pub async fn get_search_suggestions(
        &self,
        table: &str,
        term: &str,
        limit: u64,
    ) -> Result<Arc<Vec<Record>>, RepoError> {
        let term = term.trim();
        if term.chars().count() < MIN_SEARCH_TERM_CHARS {
            return Ok(Arc::new(Vec::new()));
        }

        let limit = limit.max(1);
        let key = build_key(
            table,
            OP_SUGGESTIONS,
            &params([("term", json!(term)), ("limit", json!(limit))]),
        );

        self.cached(key, async {
            let select = SelectQuery::new(table)
                .filter(Filter::search(search_fields(table), term))
                .limit(limit);
            let rows = timed(table, OP_SUGGESTIONS, self.remote.select(&select)).await?;
            Ok(Arc::new(rows))
        })
        .await
    }

    /// Every row of `table`, optionally sorted.
    #[instrument(skip(self))]
    pub async fn get_all(
        &self,
        table: &str,
        sort_by: Option<&str>,
        sort_order: SortOrder,
    ) -> Result<Arc<Vec<Record>>, RepoError> {
        let key = match sort_by {
            Some(sort_by) => build_key(
                table,
                OP_ALL,
                &params([
                    ("sortBy", json!(sort_by)),
                    ("sortOrder", json!(sort_order.as_str())),
                ]),
            ),
            None => build_key(table, OP_ALL, &QueryParams::new()),
        };

        self.cached(key, async {
            let mut select = SelectQuery::new(table);
            if let Some(sort_by) = sort_by {
                select = select.order(sort_field(table, Some(sort_by)), sort_order);
            }
            let rows = timed(table, OP_ALL, self.remote.select(&select)).await?;
            Ok(Arc::new(post_process(table, rows)))
        })
        .await
    }

    /// The row with `id`, or `None`.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, table: &str, id: &str) -> Result<Option<Record>, RepoError> {
        let key = build_key(table, OP_BY_ID, &params([("id", json!(id))]));

        self.cached(key, async {
            let select = SelectQuery::new(table).filter(Filter::eq("id", id)).limit(1);
            let rows = timed(table, OP_BY_ID, self.remote.select(&select)).await?;
            Ok(post_process(table, rows).into_iter().next())
        })
        .await
    }

    /// Number of rows of `table` matching `filters`.
    #[instrument(skip(self, filters))]
    pub async fn count(&self, table: &str, filters: &QueryParams) -> Result<u64, RepoError> {
        let key = build_key(table, OP_COUNT, filters);

        self.cached(key, async {
            let filters = translate(table, filters, OffsetDateTime::now_utc());
            timed(table, OP_COUNT, self.remote.count(table, &filters)).await
        })
        .await
    }

    /// Booking totals per status and revenue of confirmed and completed
    /// bookings.
    #[instrument(skip(self))]
    pub async fn booking_stats(&self) -> Result<BookingStats, RepoError> {
        let key = build_key(BOOKINGS, OP_STATS, &QueryParams::new());

        self.cached(key, async {
            let select = SelectQuery::new(BOOKINGS).columns("status,total_price");
            let rows = timed(BOOKINGS, OP_STATS, self.remote.select(&select)).await?;
            Ok(booking_stats(&rows))
        })
        .await
    }

    async fn cached<T, F>(&self, key: QueryKey, fetch: F) -> Result<T, RepoError>
    where
        T: Cacheable + Clone,
        F: Future<Output = Result<T, RepoError>>,
    {
        if let Some(value) = self.cache.get(&key) {
            if let Some(value) = T::from_cached(value) {
                debug!(cache_key = %key, "Cache hit");
                return Ok(value);
            }
            self.cache.delete(&key);
        }

        debug!(cache_key = %key, "Cache miss");
        let generation = self.cache.generation(key.table());
        let value = fetch.await?;
        self.cache
            .set_if_current(key, value.clone().into_cached(), generation);
        Ok(value)
    }
}

async fn timed<T, F>(table: &str, operation: &'static str, fut: F) -> Result<T, RepoError>
where
    F: Future<Output = Result<T, RepoError>>,
{
    let started = Instant::now();
    let result = fut.await;
    histogram!(
        METRIC_REMOTE_QUERY_MS,
        "table" => table.to_string(),
        "operation" => operation
    )
    .record(started.elapsed().as_secs_f64() * 1000.0);
    result
}

fn page_select(
    table: &str,
    query: &PageQuery,
    filters: &[Filter],
    window: RowRange,
) -> SelectQuery {
    SelectQuery::new(table)
        .columns(tables::select_columns(&query.joins))
        .filters(filters.to_vec())
        .order(sort_field(table, query.sort_by.as_deref()), query.sort_order)
        .range(window)
}

fn params<const N: usize>(entries: [(&str, Value); N]) -> QueryParams {
    entries
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn post_process(table: &str, mut rows: Vec<Record>) -> Vec<Record> {
    if is_booking_table(table) {
        rows.iter_mut().for_each(ensure_profile);
    }
    rows
}

fn filter_options(rows: &[Record], field: &str) -> Vec<FilterOption> {
    let distinct: BTreeSet<String> = rows
        .iter()
        .filter_map(|row| row.get(field).and_then(scalar_text))
        .collect();

    distinct
        .into_iter()
        .map(|value| FilterOption {
            label: capitalize(&value),
            value,
        })
        .collect()
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn booking_stats(rows: &[Record]) -> BookingStats {
    let mut stats = BookingStats {
        total: rows.len() as u64,
        ..BookingStats::default()
    };

    for row in rows {
        let Some(status) = row
            .get("status")
            .and_then(Value::as_str)
            .and_then(|status| status.parse::<BookingStatus>().ok())
        else {
            continue;
        };

        match status {
            BookingStatus::Pending => stats.pending += 1,
            BookingStatus::Confirmed => stats.confirmed += 1,
            BookingStatus::Completed => stats.completed += 1,
            BookingStatus::Cancelled => stats.cancelled += 1,
        }

        if status.is_billable() {
            stats.revenue += row.get("total_price").map_or(0.0, price);
        }
    }

    stats
}

fn price(value: &Value) -> f64 {
    match value {
        Value::Number(number) => number.as_f64().unwrap_or(0.0),
        Value::String(text) => text.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn options_are_distinct_sorted_and_labelled() {
        let rows = vec![
            row(json!({"category": "suv"})),
            row(json!({"category": "compact"})),
            row(json!({"category": "suv"})),
            row(json!({"category": null})),
            row(json!({})),
        ];
        let options = filter_options(&rows, "category");
        assert_eq!(
            options,
            vec![
                FilterOption {
                    value: "compact".into(),
                    label: "Compact".into()
                },
                FilterOption {
                    value: "suv".into(),
                    label: "Suv".into()
                },
            ]
        );
    }

    #[test]
    fn capitalize_handles_unicode_and_empty() {
        assert_eq!(capitalize("électrique"), "Électrique");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("4x4"), "4x4");
    }

    #[test]
    fn stats_count_statuses_and_billable_revenue() {
        let rows = vec![
            row(json!({"status": "pending", "total_price": 100})),
            row(json!({"status": "confirmed", "total_price": 250.5})),
            row(json!({"status": "completed", "total_price": "49.5"})),
            row(json!({"status": "cancelled", "total_price": 80})),
            row(json!({"status": "unknown"})),
        ];
        let stats = booking_stats(&rows);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.confirmed, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.cancelled, 1);
        assert!((stats.revenue - 300.0).abs() < f64::EPSILON);
    }
}
