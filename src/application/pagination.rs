//! Offset pagination requests for table listings.

use rentdesk_types::SortOrder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::repos::RowRange;
use crate::cache::QueryParams;

pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// One page request: window, raw filters, sort and embedded resources.
///
/// Every field takes part in the cache key, so two pages of the same listing
/// are distinct entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageQuery {
    pub page: u64,
    pub limit: u64,
    pub filters: QueryParams,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub joins: Vec<String>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            filters: QueryParams::new(),
            sort_by: None,
            sort_order: SortOrder::Desc,
            joins: Vec::new(),
        }
    }
}

impl PageQuery {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page,
            limit,
            ..Self::default()
        }
    }

    pub fn filter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(name.into(), value.into());
        self
    }

    pub fn sort(mut self, sort_by: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(sort_by.into());
        self.sort_order = order;
        self
    }

    pub fn join(mut self, resource: impl Into<String>) -> Self {
        self.joins.push(resource.into());
        self
    }

    /// Copy with `page` and `limit` raised to at least 1.
    pub fn normalized(&self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.max(1),
            ..self.clone()
        }
    }

    /// Rows covered by this page.
    pub fn window(&self) -> RowRange {
        RowRange::page(self.page, self.limit)
    }
}
