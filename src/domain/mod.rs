//! Domain layer: record shape, table conventions and booking rules.

pub mod bookings;
pub mod records;
pub mod tables;
