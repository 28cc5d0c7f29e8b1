//! Result shapes shared between the rentdesk query layer and its consumers.
//!
//! Field names serialize in camelCase to match what the admin dashboards read.

use serde::{Deserialize, Serialize};

/// Direction of a sort instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn is_ascending(self) -> bool {
        matches!(self, SortOrder::Asc)
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order `{other}`")),
        }
    }
}

/// One page of rows plus the arithmetic a pager needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult<T> {
    pub data: Vec<T>,
    pub current_page: u64,
    pub total_pages: u64,
    pub total_count: u64,
    pub page_size: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl<T> PaginationResult<T> {
    /// Assemble a page. `page` and `page_size` are clamped to at least 1 and
    /// `page` to at most `max(total_pages, 1)`.
    ///
    /// `data` is taken as given: callers must pass the rows of the clamped
    /// page, not of the requested one.
    pub fn new(data: Vec<T>, page: u64, page_size: u64, total_count: u64) -> Self {
        let page_size = page_size.max(1);
        let total_pages = total_count.div_ceil(page_size);
        let current_page = page.clamp(1, total_pages.max(1));

        Self {
            data,
            current_page,
            total_pages,
            total_count,
            page_size,
            has_next_page: current_page < total_pages,
            has_prev_page: current_page > 1,
        }
    }
}

/// A selectable value for a filter dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOption {
    pub value: String,
    pub label: String,
}

/// Point-in-time view of the result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsSnapshot {
    pub size: usize,
    pub max_size: usize,
    pub keys: Vec<String>,
    pub hits: u64,
    pub misses: u64,
    /// Percentage of lookups served from cache (0-100).
    pub hit_rate: f64,
    /// Percentage of capacity in use (0-100).
    pub utilization: f64,
}

/// Booking totals shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingStats {
    pub total: u64,
    pub pending: u64,
    pub confirmed: u64,
    pub completed: u64,
    pub cancelled: u64,
    /// Sum of `total_price` over confirmed and completed bookings.
    pub revenue: f64,
}

/// Headline numbers for the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub cars: u64,
    pub bookings: u64,
    pub profiles: u64,
    pub booking_stats: BookingStats,
}
