//! Booking statuses and the display profile every booking row carries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::records::{Record, text_field};

pub const ANONYMOUS_CUSTOMER: &str = "Anonymous Customer";
pub const NO_EMAIL: &str = "No email";
pub const NO_PHONE: &str = "No phone";

const PROFILE_FIELD: &str = "profiles";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the booking's price counts towards revenue.
    pub fn is_billable(self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::Completed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status `{other}`")),
        }
    }
}

/// Give a booking row without a joined profile one built from its inline
/// customer columns. Rows that already carry a profile are left as they are.
pub fn ensure_profile(record: &mut Record) {
    if record
        .get(PROFILE_FIELD)
        .is_some_and(|profile| !profile.is_null())
    {
        return;
    }

    let mut profile = Map::new();
    profile.insert(
        "full_name".to_string(),
        inline_or(record, "customer_name", ANONYMOUS_CUSTOMER),
    );
    profile.insert(
        "email".to_string(),
        inline_or(record, "customer_email", NO_EMAIL),
    );
    profile.insert(
        "phone".to_string(),
        inline_or(record, "customer_phone", NO_PHONE),
    );
    record.insert(PROFILE_FIELD.to_string(), Value::Object(profile));
}

fn inline_or(record: &Record, field: &str, fallback: &str) -> Value {
    Value::String(text_field(record, field).unwrap_or(fallback).to_string())
}
