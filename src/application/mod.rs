//! Application services: cache-aware reads, invalidating writes and the
//! admin dashboard.

pub mod dashboard;
pub mod error;
pub mod filters;
pub mod mutations;
pub mod pagination;
pub mod query;
pub mod repos;
