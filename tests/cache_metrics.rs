use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use metrics_util::debugging::DebuggingRecorder;
use rentdesk::application::mutations::MutationGateway;
use rentdesk::application::query::QueryFacade;
use rentdesk::cache::{CacheConfig, CacheStore};
use rentdesk::infra::memory::MemoryStore;
use rentdesk::infra::telemetry::describe_metrics;
use rentdesk_types::SortOrder;
use serde_json::{Map, json};

#[tokio::test(start_paused = true)]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    describe_metrics();

    let store = Arc::new(MemoryStore::demo());
    let cache = Arc::new(CacheStore::new(CacheConfig::default().with_capacity(1)));
    let query = QueryFacade::new(store.clone(), cache.clone());
    let gateway = MutationGateway::new(store, cache);

    // miss, then hit
    query.get_by_id("cars", "1").await.expect("car");
    query.get_by_id("cars", "1").await.expect("car");

    // capacity 1: the second key evicts the first
    query.get_by_id("cars", "2").await.expect("car");

    // bookings live for two minutes
    query
        .get_all("bookings", None, SortOrder::Desc)
        .await
        .expect("bookings");
    tokio::time::advance(Duration::from_secs(121)).await;
    query
        .get_all("bookings", None, SortOrder::Desc)
        .await
        .expect("bookings");

    let mut patch = Map::new();
    patch.insert("status".to_string(), json!("completed"));
    gateway.update("bookings", "1", patch).await.expect("update");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for expected in [
        "rentdesk_cache_hit_total",
        "rentdesk_cache_miss_total",
        "rentdesk_cache_evict_total",
        "rentdesk_cache_expired_total",
        "rentdesk_cache_invalidate_total",
        "rentdesk_cache_invalidated_entries_total",
        "rentdesk_remote_query_ms",
    ] {
        assert!(
            names.contains(expected),
            "missing metric `{expected}`, saw {names:?}"
        );
    }
}
