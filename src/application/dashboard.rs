use std::sync::Arc;

use rentdesk_types::DashboardOverview;
use tracing::instrument;

use crate::application::query::QueryFacade;
use crate::application::repos::RepoError;
use crate::cache::QueryParams;
use crate::domain::tables::{BOOKINGS, CARS, PROFILES};

/// Headline numbers for the admin landing page.
///
/// Each figure is cached under its own table, so a write to one table only
/// refetches that figure.
#[derive(Clone)]
pub struct DashboardService {
    query: Arc<QueryFacade>,
}

impl DashboardService {
    pub fn new(query: Arc<QueryFacade>) -> Self {
        Self { query }
    }

    #[instrument(skip(self))]
    pub async fn overview(&self) -> Result<DashboardOverview, RepoError> {
        let unfiltered = QueryParams::new();
        let (cars, bookings, profiles, booking_stats) = tokio::try_join!(
            self.query.count(CARS, &unfiltered),
            self.query.count(BOOKINGS, &unfiltered),
            self.query.count(PROFILES, &unfiltered),
            self.query.booking_stats(),
        )?;

        Ok(DashboardOverview {
            cars,
            bookings,
            profiles,
            booking_stats,
        })
    }
}
