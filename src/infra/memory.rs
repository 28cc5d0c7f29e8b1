//! In-process remote store.
//!
//! Backs the `--memory` demo mode and the test suites. It evaluates the same
//! predicates the HTTP adapter sends, counts calls per operation and can be
//! told to fail the next read or write.

use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::application::repos::{Filter, FilterOp, Predicate, RemoteStore, RepoError, SelectQuery};
use crate::cache::lock::{rw_read, rw_write};
use crate::domain::records::{Record, record_id, scalar_text};

const SOURCE: &str = "infra::memory";

/// Calls issued against a [`MemoryStore`] so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub select: u64,
    pub count: u64,
    pub insert: u64,
    pub update: u64,
    pub delete: u64,
}

impl CallCounts {
    pub fn reads(&self) -> u64 {
        self.select + self.count
    }

    pub fn writes(&self) -> u64 {
        self.insert + self.update + self.delete
    }
}

#[derive(Debug, Default)]
struct Calls {
    select: AtomicU64,
    count: AtomicU64,
    insert: AtomicU64,
    update: AtomicU64,
    delete: AtomicU64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Record>>>,
    calls: Calls,
    next_id: AtomicU64,
    fail_next_read: AtomicBool,
    fail_next_write: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the rows of `table`.
    pub fn seed(&self, table: &str, rows: Vec<Record>) {
        let highest = rows
            .iter()
            .filter_map(|row| row.get("id").and_then(Value::as_u64))
            .max()
            .unwrap_or(0);
        self.next_id.fetch_max(highest, Ordering::Relaxed);
        rw_write(&self.tables, SOURCE, "seed").insert(table.to_string(), rows);
    }

    pub fn with_rows(self, table: &str, rows: Vec<Record>) -> Self {
        self.seed(table, rows);
        self
    }

    /// Current rows of `table`, bypassing call accounting.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        rw_read(&self.tables, SOURCE, "rows")
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            select: self.calls.select.load(Ordering::Relaxed),
            count: self.calls.count.load(Ordering::Relaxed),
            insert: self.calls.insert.load(Ordering::Relaxed),
            update: self.calls.update.load(Ordering::Relaxed),
            delete: self.calls.delete.load(Ordering::Relaxed),
        }
    }

    /// Make the next `select` or `count` fail with a persistence error.
    pub fn fail_next_read(&self) {
        self.fail_next_read.store(true, Ordering::SeqCst);
    }

    /// Make the next `insert`, `update` or `delete` fail with a persistence
    /// error.
    pub fn fail_next_write(&self) {
        self.fail_next_write.store(true, Ordering::SeqCst);
    }

    fn take_read_failure(&self) -> Result<(), RepoError> {
        if self.fail_next_read.swap(false, Ordering::SeqCst) {
            return Err(RepoError::Persistence("injected read failure".to_string()));
        }
        Ok(())
    }

    fn take_write_failure(&self) -> Result<(), RepoError> {
        if self.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(RepoError::Persistence("injected write failure".to_string()));
        }
        Ok(())
    }

    /// A small fleet with a few bookings and customers.
    pub fn demo() -> Self {
        let store = Self::new();
        store.seed(
            "cars",
            records(json!([
                {"id": 1, "name": "Volvo XC60", "make": "Volvo", "model": "XC60", "category": "suv",
                 "price_per_day": 95, "created_at": "2024-01-05T09:00:00Z"},
                {"id": 2, "name": "Fiat 500", "make": "Fiat", "model": "500", "category": "compact",
                 "price_per_day": 39, "created_at": "2024-01-06T09:00:00Z"},
                {"id": 3, "name": "Tesla Model 3", "make": "Tesla", "model": "Model 3",
                 "category": "electric", "price_per_day": 120, "created_at": "2024-02-01T09:00:00Z"},
                {"id": 4, "name": "Volkswagen Golf", "make": "Volkswagen", "model": "Golf",
                 "category": "compact", "price_per_day": 55, "created_at": "2024-02-10T09:00:00Z"}
            ])),
        );
        store.seed(
            "profiles",
            records(json!([
                {"id": "p-1", "full_name": "Ada Lovelace", "email": "ada@example.com",
                 "phone": "+44 20 0000 0001", "created_at": "2024-01-02T10:00:00Z"},
                {"id": "p-2", "full_name": "Alan Turing", "email": "alan@example.com",
                 "phone": null, "created_at": "2024-01-03T10:00:00Z"}
            ])),
        );
        store.seed(
            "bookings",
            records(json!([
                {"id": 1, "car_id": 1, "status": "confirmed", "total_price": 285,
                 "customer_name": "Ada Lovelace", "customer_email": "ada@example.com",
                 "customer_phone": "+44 20 0000 0001", "start_date": "2024-03-01",
                 "profiles": {"full_name": "Ada Lovelace", "email": "ada@example.com",
                              "phone": "+44 20 0000 0001"},
                 "created_at": "2024-02-20T12:00:00Z"},
                {"id": 2, "car_id": 2, "status": "pending", "total_price": 78,
                 "customer_name": "Jon Doe", "customer_email": null, "customer_phone": null,
                 "start_date": "2024-03-04", "profiles": null,
                 "created_at": "2024-02-21T12:00:00Z"},
                {"id": 3, "car_id": 3, "status": "completed", "total_price": 360,
                 "customer_name": null, "customer_email": null, "customer_phone": null,
                 "start_date": "2024-02-10", "profiles": null,
                 "created_at": "2024-02-01T12:00:00Z"},
                {"id": 4, "car_id": 4, "status": "cancelled", "total_price": 110,
                 "customer_name": "Alan Turing", "customer_email": "alan@example.com",
                 "customer_phone": null, "start_date": "2024-03-12", "profiles": null,
                 "created_at": "2024-02-25T12:00:00Z"}
            ])),
        );
        store
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Record>, RepoError> {
        self.calls.select.fetch_add(1, Ordering::Relaxed);
        self.take_read_failure()?;

        let mut rows: Vec<Record> = rw_read(&self.tables, SOURCE, "select")
            .get(&query.table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|filter| matches(row, filter)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_fields(a, b, &order.field);
                if order.direction.is_ascending() {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        let (offset, take) = match (query.range, query.limit) {
            (Some(range), _) => (range.from, range.rows()),
            (None, Some(limit)) => (0, limit),
            (None, None) => (0, u64::MAX),
        };
        let rows = rows
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(take).unwrap_or(usize::MAX))
            .map(|row| project(row, &query.columns))
            .collect();

        Ok(rows)
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64, RepoError> {
        self.calls.count.fetch_add(1, Ordering::Relaxed);
        self.take_read_failure()?;

        let count = rw_read(&self.tables, SOURCE, "count")
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| filters.iter().all(|filter| matches(row, filter)))
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn insert(&self, table: &str, mut record: Record) -> Result<Record, RepoError> {
        self.calls.insert.fetch_add(1, Ordering::Relaxed);
        self.take_write_failure()?;

        let mut tables = rw_write(&self.tables, SOURCE, "insert");
        let rows = tables.entry(table.to_string()).or_default();

        match record_id(&record) {
            Some(id) if rows.iter().any(|row| record_id(row).as_deref() == Some(id.as_str())) => {
                return Err(RepoError::Duplicate {
                    message: format!("{table}.id `{id}` already exists"),
                });
            }
            Some(_) => {}
            None => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
                record.insert("id".to_string(), json!(id));
            }
        }
        if !record.contains_key("created_at")
            && let Ok(now) = OffsetDateTime::now_utc().format(&Rfc3339)
        {
            record.insert("created_at".to_string(), Value::String(now));
        }

        rows.push(record.clone());
        Ok(record)
    }

    async fn update(&self, table: &str, id: &str, patch: Record) -> Result<Record, RepoError> {
        self.calls.update.fetch_add(1, Ordering::Relaxed);
        self.take_write_failure()?;

        let mut tables = rw_write(&self.tables, SOURCE, "update");
        let row = tables
            .get_mut(table)
            .and_then(|rows| {
                rows.iter_mut()
                    .find(|row| record_id(row).as_deref() == Some(id))
            })
            .ok_or(RepoError::NotFound)?;

        row.extend(patch);
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), RepoError> {
        self.calls.delete.fetch_add(1, Ordering::Relaxed);
        self.take_write_failure()?;

        if let Some(rows) = rw_write(&self.tables, SOURCE, "delete").get_mut(table) {
            rows.retain(|row| record_id(row).as_deref() != Some(id));
        }
        Ok(())
    }
}

fn records(value: Value) -> Vec<Record> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn matches(row: &Record, filter: &Filter) -> bool {
    match filter {
        Filter::Where(predicate) => predicate_matches(row, predicate),
        Filter::AnyOf(alternatives) => alternatives
            .iter()
            .any(|predicate| predicate_matches(row, predicate)),
    }
}

fn predicate_matches(row: &Record, predicate: &Predicate) -> bool {
    let value = row.get(&predicate.field).unwrap_or(&Value::Null);
    match predicate.op {
        FilterOp::Eq => compare(value, &predicate.value) == Some(CmpOrdering::Equal),
        FilterOp::Gte => compare(value, &predicate.value).is_some_and(CmpOrdering::is_ge),
        FilterOp::Lte => compare(value, &predicate.value).is_some_and(CmpOrdering::is_le),
        FilterOp::ILike => match (scalar_text(value), scalar_text(&predicate.value)) {
            (Some(text), Some(term)) => text.to_lowercase().contains(&term.to_lowercase()),
            _ => false,
        },
        FilterOp::NotNull => !value.is_null(),
    }
}

/// Numeric comparison when both sides read as numbers, text comparison
/// otherwise. `null` compares to nothing.
fn compare(left: &Value, right: &Value) -> Option<CmpOrdering> {
    let left = scalar_text(left)?;
    let right = scalar_text(right)?;
    match (left.parse::<f64>(), right.parse::<f64>()) {
        (Ok(l), Ok(r)) => l.partial_cmp(&r),
        _ => Some(left.cmp(&right)),
    }
}

/// Sort order for `field`; rows without a comparable value sort last.
fn compare_fields(a: &Record, b: &Record, field: &str) -> CmpOrdering {
    let left = a.get(field).unwrap_or(&Value::Null);
    let right = b.get(field).unwrap_or(&Value::Null);
    match (left.is_null(), right.is_null()) {
        (true, true) => CmpOrdering::Equal,
        (true, false) => CmpOrdering::Greater,
        (false, true) => CmpOrdering::Less,
        (false, false) => compare(left, right).unwrap_or(CmpOrdering::Equal),
    }
}

/// Keep only the listed columns unless the list starts with `*`. Embedded
/// resources such as `profiles(full_name)` are not resolved.
fn project(row: Record, columns: &str) -> Record {
    let wanted: Vec<&str> = columns
        .split(',')
        .map(str::trim)
        .filter(|column| !column.is_empty() && !column.contains('('))
        .collect();
    if wanted.first().is_none_or(|first| *first == "*") {
        return row;
    }
    row.into_iter()
        .filter(|(column, _)| wanted.contains(&column.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use rentdesk_types::SortOrder;

    use super::*;
    use crate::application::repos::RowRange;

    fn cars() -> MemoryStore {
        MemoryStore::demo()
    }

    #[tokio::test]
    async fn select_filters_sorts_and_windows() {
        let store = cars();
        let query = SelectQuery::new("cars")
            .filter(Filter::eq("category", "compact"))
            .order("price_per_day", SortOrder::Asc)
            .range(RowRange::page(1, 1));

        let rows = store.select(&query).await.expect("select");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "Fiat 500");
        assert_eq!(store.calls().select, 1);
    }

    #[tokio::test]
    async fn search_is_case_insensitive_over_alternatives() {
        let store = cars();
        let filters = vec![Filter::search(&["name", "make", "model"], "VOL")];
        assert_eq!(store.count("cars", &filters).await.ok(), Some(2));
    }

    #[tokio::test]
    async fn numeric_ranges_compare_as_numbers() {
        let store = cars();
        let filters = vec![Filter::gte("price_per_day", 50), Filter::lte("price_per_day", "100")];
        assert_eq!(store.count("cars", &filters).await.ok(), Some(2));
    }

    #[tokio::test]
    async fn projection_keeps_listed_columns() {
        let store = cars();
        let rows = store
            .select(&SelectQuery::new("cars").columns("category").limit(1))
            .await
            .expect("select");
        assert_eq!(rows[0].len(), 1);
        assert!(rows[0].contains_key("category"));
    }

    #[tokio::test]
    async fn insert_assigns_next_id() {
        let store = cars();
        let created = store
            .insert("cars", records(json!([{"name": "Mini"}])).remove(0))
            .await
            .expect("insert");
        assert_eq!(created["id"], 5);
        assert!(created.contains_key("created_at"));
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids() {
        let store = cars();
        let result = store
            .insert("cars", records(json!([{"id": 1, "name": "Clone"}])).remove(0))
            .await;
        assert!(matches!(result, Err(RepoError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn update_merges_patch_and_reports_missing_rows() {
        let store = cars();
        let patch = records(json!([{"price_per_day": 99}])).remove(0);
        let updated = store.update("cars", "1", patch.clone()).await.expect("update");
        assert_eq!(updated["price_per_day"], 99);
        assert_eq!(updated["name"], "Volvo XC60");

        let missing = store.update("cars", "404", patch).await;
        assert!(matches!(missing, Err(RepoError::NotFound)));
    }

    #[tokio::test]
    async fn injected_failures_fire_once() {
        let store = cars();
        store.fail_next_write();
        assert!(store.delete("cars", "1").await.is_err());
        assert!(store.delete("cars", "1").await.is_ok());
        assert_eq!(store.rows("cars").len(), 3);

        store.fail_next_read();
        assert!(store.count("cars", &[]).await.is_err());
        assert_eq!(store.count("cars", &[]).await.ok(), Some(3));
        assert_eq!(store.calls().delete, 2);
        assert_eq!(store.calls().count, 2);
    }
}
