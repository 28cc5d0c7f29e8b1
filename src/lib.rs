//! Cache-aware data layer for a car-rental admin back office.
//!
//! Reads go through [`application::query::QueryFacade`], which answers from a
//! bounded TTL cache ([`cache::CacheStore`]) and falls back to a
//! [`application::repos::RemoteStore`]. Writes go through
//! [`application::mutations::MutationGateway`], which clears the written
//! table's cache entries once the remote store acknowledged the write.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
