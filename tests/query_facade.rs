use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rentdesk::application::dashboard::DashboardService;
use rentdesk::application::pagination::PageQuery;
use rentdesk::application::query::QueryFacade;
use rentdesk::application::repos::{Filter, RemoteStore, RepoError, SelectQuery};
use rentdesk::cache::{CacheConfig, CacheStore, QueryParams};
use rentdesk::domain::records::Record;
use rentdesk::infra::memory::MemoryStore;
use rentdesk_types::{FilterOption, SortOrder};
use serde_json::{Value, json};

fn rows(value: Value) -> Vec<Record> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => row,
                other => panic!("expected object row, got {other}"),
            })
            .collect(),
        other => panic!("expected array, got {other}"),
    }
}

fn numbered_bookings(count: u64) -> Vec<Record> {
    rows(Value::Array(
        (1..=count)
            .map(|id| {
                json!({
                    "id": id,
                    "status": if id % 2 == 0 { "pending" } else { "confirmed" },
                    "total_price": 100,
                    "customer_name": format!("Customer {id}"),
                    "profiles": {"full_name": format!("Customer {id}"), "email": "c@example.com", "phone": "1"},
                    "created_at": format!("2024-01-01T00:00:{:02}Z", id % 60),
                })
            })
            .collect(),
    ))
}

fn facade(store: Arc<MemoryStore>) -> (QueryFacade, Arc<CacheStore>) {
    let cache = Arc::new(CacheStore::new(CacheConfig::default()));
    (QueryFacade::new(store, cache.clone()), cache)
}

#[tokio::test]
async fn last_page_holds_the_remainder() {
    let store = Arc::new(MemoryStore::new().with_rows("bookings", numbered_bookings(45)));
    let (query, _cache) = facade(store.clone());

    let page = query
        .get_paginated_data("bookings", &PageQuery::new(3, 20).sort("id", SortOrder::Asc))
        .await
        .expect("page");

    assert_eq!(page.total_count, 45);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.current_page, 3);
    assert!(!page.has_next_page);
    assert!(page.has_prev_page);
    let ids: Vec<u64> = page
        .data
        .iter()
        .filter_map(|row| row["id"].as_u64())
        .collect();
    assert_eq!(ids, vec![41, 42, 43, 44, 45]);
    assert_eq!(store.calls().count, 1);
    assert_eq!(store.calls().select, 1);
}

#[tokio::test]
async fn page_past_the_end_serves_the_last_page() {
    let store = Arc::new(MemoryStore::new().with_rows("bookings", numbered_bookings(4)));
    let (query, _cache) = facade(store.clone());

    let page = query
        .get_paginated_data("bookings", &PageQuery::new(5, 2).sort("id", SortOrder::Asc))
        .await
        .expect("page");

    assert_eq!(page.total_pages, 2);
    assert_eq!(page.current_page, 2);
    assert!(page.has_prev_page);
    assert!(!page.has_next_page);
    let ids: Vec<u64> = page
        .data
        .iter()
        .filter_map(|row| row["id"].as_u64())
        .collect();
    assert_eq!(ids, vec![3, 4]);
    assert_eq!(store.calls().select, 2);

    let empty = Arc::new(MemoryStore::new().with_rows("bookings", Vec::new()));
    let (query, _cache) = facade(empty.clone());
    let page = query
        .get_paginated_data("bookings", &PageQuery::new(3, 2))
        .await
        .expect("empty page");
    assert_eq!(page.current_page, 1);
    assert!(page.data.is_empty());
    assert_eq!(empty.calls().select, 1);
}

#[tokio::test]
async fn repeated_page_is_served_from_cache() {
    let store = Arc::new(MemoryStore::new().with_rows("bookings", numbered_bookings(30)));
    let (query, cache) = facade(store.clone());
    let request = PageQuery::new(1, 10).filter("status", "pending");

    let first = query
        .get_paginated_data("bookings", &request)
        .await
        .expect("first");
    let second = query
        .get_paginated_data("bookings", &request)
        .await
        .expect("second");

    assert_eq!(first, second);
    assert_eq!(first.total_count, 15);
    assert_eq!(store.calls().reads(), 2);
    assert_eq!(cache.counters().hits(), 1);

    query
        .get_paginated_data("bookings", &PageQuery::new(2, 10).filter("status", "pending"))
        .await
        .expect("second page");
    assert_eq!(store.calls().reads(), 4);
}

#[tokio::test]
async fn filters_sort_aliases_and_ranges_apply() {
    let store = Arc::new(MemoryStore::demo());
    let (query, _cache) = facade(store);

    let page = query
        .get_paginated_data(
            "cars",
            &PageQuery::new(1, 10)
                .filter("price_per_day", json!({"min": 40, "max": 100}))
                .filter("category", "all")
                .sort("price", SortOrder::Asc),
        )
        .await
        .expect("page");

    let names: Vec<&str> = page
        .data
        .iter()
        .filter_map(|row| row["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Volkswagen Golf", "Volvo XC60"]);
}

#[tokio::test]
async fn bookings_without_profile_get_a_display_profile() {
    let store = Arc::new(MemoryStore::new().with_rows(
        "bookings",
        rows(json!([{
            "id": 1,
            "profiles": null,
            "customer_name": "Jon Doe",
            "customer_email": null,
            "created_at": "2024-01-01T00:00:00Z",
        }])),
    ));
    let (query, _cache) = facade(store);

    let page = query
        .get_paginated_data("bookings", &PageQuery::default())
        .await
        .expect("page");

    let profile = &page.data[0]["profiles"];
    assert_eq!(profile["full_name"], "Jon Doe");
    assert_eq!(profile["email"], "No email");
    assert_eq!(profile["phone"], "No phone");
}

#[tokio::test]
async fn remote_errors_are_not_cached() {
    let store = Arc::new(MemoryStore::demo());
    let (query, cache) = facade(store.clone());

    store.fail_next_read();
    let result = query.get_all("cars", None, SortOrder::Desc).await;
    assert!(matches!(result, Err(RepoError::Persistence(_))));
    assert!(cache.is_empty());

    let rows = query
        .get_all("cars", None, SortOrder::Desc)
        .await
        .expect("retry");
    assert_eq!(rows.len(), 4);
    assert_eq!(store.calls().select, 2);
    assert_eq!(cache.keys_for_table("cars").len(), 1);
}

#[tokio::test]
async fn failed_refresh_does_not_fall_back_to_stale_entry() {
    let store = Arc::new(MemoryStore::demo());
    let (query, cache) = facade(store.clone());

    query
        .get_paginated_data("cars", &PageQuery::default())
        .await
        .expect("warm");
    cache.clear_table("cars");

    store.fail_next_read();
    let result = query
        .get_paginated_data("cars", &PageQuery::default())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn short_search_terms_skip_the_remote_store() {
    let store = Arc::new(MemoryStore::demo());
    let (query, cache) = facade(store.clone());

    let suggestions = query
        .get_search_suggestions("cars", "a", 10)
        .await
        .expect("suggestions");
    assert!(suggestions.is_empty());

    let blank = query
        .get_search_suggestions("cars", "  ", 10)
        .await
        .expect("suggestions");
    assert!(blank.is_empty());

    assert_eq!(store.calls().reads(), 0);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn suggestions_match_search_fields_and_are_cached() {
    let store = Arc::new(MemoryStore::demo());
    let (query, _cache) = facade(store.clone());

    let first = query
        .get_search_suggestions("cars", "vol", 10)
        .await
        .expect("suggestions");
    assert_eq!(first.len(), 2);

    let limited = query
        .get_search_suggestions("cars", "vol", 1)
        .await
        .expect("suggestions");
    assert_eq!(limited.len(), 1);

    query
        .get_search_suggestions("cars", "vol", 10)
        .await
        .expect("cached suggestions");
    assert_eq!(store.calls().select, 2);
}

#[tokio::test]
async fn filter_options_are_distinct_sorted_and_labelled() {
    let store = Arc::new(MemoryStore::demo());
    let (query, _cache) = facade(store);

    let options = query
        .get_filter_options("cars", "category")
        .await
        .expect("options");

    let expected: Vec<FilterOption> = ["compact", "electric", "suv"]
        .into_iter()
        .map(|value| FilterOption {
            value: value.to_string(),
            label: format!("{}{}", value[..1].to_uppercase(), &value[1..]),
        })
        .collect();
    assert_eq!(*options, expected);
}

#[tokio::test]
async fn missing_rows_are_cached_as_absent() {
    let store = Arc::new(MemoryStore::demo());
    let (query, _cache) = facade(store.clone());

    assert!(query.get_by_id("cars", "99").await.expect("lookup").is_none());
    assert!(query.get_by_id("cars", "99").await.expect("lookup").is_none());
    assert_eq!(store.calls().select, 1);

    let car = query.get_by_id("cars", "3").await.expect("lookup");
    assert_eq!(car.as_ref().map(|row| row["name"].clone()), Some(json!("Tesla Model 3")));
}

#[tokio::test(start_paused = true)]
async fn expired_entries_are_refetched() {
    let store = Arc::new(MemoryStore::demo());
    let (query, _cache) = facade(store.clone());

    query.booking_stats().await.expect("stats");
    tokio::time::advance(Duration::from_secs(60)).await;
    query.booking_stats().await.expect("stats");
    assert_eq!(store.calls().select, 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    query.booking_stats().await.expect("stats");
    assert_eq!(store.calls().select, 2);
}

#[tokio::test]
async fn dashboard_overview_combines_counts_and_revenue() {
    let store = Arc::new(MemoryStore::demo());
    let (query, cache) = facade(store.clone());
    let dashboard = DashboardService::new(Arc::new(query));

    let overview = dashboard.overview().await.expect("overview");
    assert_eq!(overview.cars, 4);
    assert_eq!(overview.bookings, 4);
    assert_eq!(overview.profiles, 2);
    assert_eq!(overview.booking_stats.pending, 1);
    assert_eq!(overview.booking_stats.confirmed, 1);
    assert_eq!(overview.booking_stats.completed, 1);
    assert_eq!(overview.booking_stats.cancelled, 1);
    assert!((overview.booking_stats.revenue - 645.0).abs() < f64::EPSILON);

    cache.clear_table("cars");
    let reads_before = store.calls().reads();
    dashboard.overview().await.expect("overview");
    assert_eq!(store.calls().reads(), reads_before + 1);
}

/// Remote store whose reads race with a write that clears the cache.
struct InvalidatingReads {
    inner: MemoryStore,
    cache: Arc<CacheStore>,
}

#[async_trait]
impl RemoteStore for InvalidatingReads {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Record>, RepoError> {
        let rows = self.inner.select(query).await?;
        self.cache.clear_table(&query.table);
        Ok(rows)
    }

    async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64, RepoError> {
        self.inner.count(table, filters).await
    }

    async fn insert(&self, table: &str, record: Record) -> Result<Record, RepoError> {
        self.inner.insert(table, record).await
    }

    async fn update(&self, table: &str, id: &str, patch: Record) -> Result<Record, RepoError> {
        self.inner.update(table, id, patch).await
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), RepoError> {
        self.inner.delete(table, id).await
    }
}

#[tokio::test]
async fn results_fetched_across_an_invalidation_are_not_cached() {
    let cache = Arc::new(CacheStore::new(CacheConfig::default()));
    let remote = Arc::new(InvalidatingReads {
        inner: MemoryStore::demo(),
        cache: cache.clone(),
    });
    let query = QueryFacade::new(remote, cache.clone());

    let rows = query
        .get_all("cars", None, SortOrder::Desc)
        .await
        .expect("rows");
    assert_eq!(rows.len(), 4);
    assert!(cache.keys_for_table("cars").is_empty());
}

#[tokio::test]
async fn disabled_cache_always_reaches_the_remote_store() {
    let store = Arc::new(MemoryStore::demo());
    let cache = Arc::new(CacheStore::new(CacheConfig::disabled()));
    let query = QueryFacade::new(store.clone(), cache.clone());

    query.count("cars", &Default::default()).await.expect("count");
    query.count("cars", &Default::default()).await.expect("count");

    assert_eq!(store.calls().count, 2);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn counts_with_separator_laden_filter_names_get_their_own_entry() {
    let store = Arc::new(MemoryStore::demo());
    let (query, _cache) = facade(store.clone());

    let mut fiat = QueryParams::new();
    fiat.insert("category".to_string(), json!("compact"));
    fiat.insert("make".to_string(), json!("Fiat"));
    assert_eq!(query.count("cars", &fiat).await.expect("count"), 1);

    let mut odd = QueryParams::new();
    odd.insert("category:\"compact\"|make".to_string(), json!("Fiat"));
    assert_eq!(query.count("cars", &odd).await.expect("count"), 0);
    assert_eq!(store.calls().count, 2);
}
