//! Writes against the remote table store followed by table invalidation.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use crate::application::repos::{RemoteStore, RepoError};
use crate::cache::CacheStore;
use crate::domain::bookings::BookingStatus;
use crate::domain::records::Record;
use crate::domain::tables::{BOOKINGS, CARS};

/// Write side of the data layer.
///
/// A table's cache entries are cleared only after the remote store
/// acknowledged the write; a failed write leaves the cache untouched.
#[derive(Clone)]
pub struct MutationGateway {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<CacheStore>,
}

impl MutationGateway {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: Arc<CacheStore>) -> Self {
        Self { remote, cache }
    }

    #[instrument(skip(self, record))]
    pub async fn create(&self, table: &str, record: Record) -> Result<Record, RepoError> {
        let created = self.remote.insert(table, record).await?;
        self.invalidate(table, "create");
        Ok(created)
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, table: &str, id: &str, patch: Record) -> Result<Record, RepoError> {
        let updated = self.remote.update(table, id, patch).await?;
        self.invalidate(table, "update");
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, table: &str, id: &str) -> Result<(), RepoError> {
        self.remote.delete(table, id).await?;
        self.invalidate(table, "delete");
        Ok(())
    }

    pub async fn update_booking(&self, id: &str, patch: Record) -> Result<Record, RepoError> {
        self.update(BOOKINGS, id, patch).await
    }

    pub async fn update_booking_status(
        &self,
        id: &str,
        status: BookingStatus,
    ) -> Result<Record, RepoError> {
        let mut patch = Record::new();
        patch.insert(
            "status".to_string(),
            Value::String(status.as_str().to_string()),
        );
        self.update(BOOKINGS, id, patch).await
    }

    pub async fn delete_booking(&self, id: &str) -> Result<(), RepoError> {
        self.delete(BOOKINGS, id).await
    }

    pub async fn create_car(&self, record: Record) -> Result<Record, RepoError> {
        self.create(CARS, record).await
    }

    pub async fn update_car(&self, id: &str, patch: Record) -> Result<Record, RepoError> {
        self.update(CARS, id, patch).await
    }

    pub async fn delete_car(&self, id: &str) -> Result<(), RepoError> {
        self.delete(CARS, id).await
    }

    fn invalidate(&self, table: &str, operation: &'static str) {
        let removed = self.cache.clear_table(table);
        debug!(
            target = "rentdesk::mutations",
            table, operation, removed, "Write acknowledged, table cache cleared"
        );
    }
}
