//! Per-table conventions: sort aliases, search columns and the date column.

pub const CARS: &str = "cars";
pub const BOOKINGS: &str = "bookings";
pub const PROFILES: &str = "profiles";

/// Column every table is sorted by when the caller names none.
pub const DEFAULT_SORT_FIELD: &str = "created_at";

const BOOKING_SORT_ALIASES: &[(&str, &str)] = &[
    ("customer", "customer_name"),
    ("price", "total_price"),
    ("date", "start_date"),
    ("created", "created_at"),
];
const CAR_SORT_ALIASES: &[(&str, &str)] = &[("price", "price_per_day"), ("name", "name")];

const CAR_SEARCH_FIELDS: &[&str] = &["name", "make", "model"];
const BOOKING_SEARCH_FIELDS: &[&str] = &["customer_name", "customer_email"];
const PROFILE_SEARCH_FIELDS: &[&str] = &["full_name", "email"];
const FALLBACK_SEARCH_FIELDS: &[&str] = &["name"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    Bookings,
    Cars,
    Profiles,
    Other,
}

impl TableKind {
    fn of(table: &str) -> Self {
        if is_booking_table(table) {
            TableKind::Bookings
        } else if table.contains(CARS) {
            TableKind::Cars
        } else if table.contains(PROFILES) {
            TableKind::Profiles
        } else {
            TableKind::Other
        }
    }
}

/// Rows of tables whose name contains `bookings` get booking post-processing.
pub fn is_booking_table(table: &str) -> bool {
    table.contains(BOOKINGS)
}

/// Storage column for a public sort key. Unknown keys pass through unchanged;
/// a missing or blank key sorts by [`DEFAULT_SORT_FIELD`].
pub fn sort_field(table: &str, sort_by: Option<&str>) -> String {
    let Some(sort_by) = sort_by.map(str::trim).filter(|key| !key.is_empty()) else {
        return DEFAULT_SORT_FIELD.to_string();
    };

    let aliases = match TableKind::of(table) {
        TableKind::Bookings => BOOKING_SORT_ALIASES,
        TableKind::Cars => CAR_SORT_ALIASES,
        TableKind::Profiles | TableKind::Other => &[],
    };

    aliases
        .iter()
        .find(|(alias, _)| *alias == sort_by)
        .map(|(_, column)| (*column).to_string())
        .unwrap_or_else(|| sort_by.to_string())
}

/// Columns matched case-insensitively by free-text search.
pub fn search_fields(table: &str) -> &'static [&'static str] {
    match TableKind::of(table) {
        TableKind::Cars => CAR_SEARCH_FIELDS,
        TableKind::Bookings => BOOKING_SEARCH_FIELDS,
        TableKind::Profiles => PROFILE_SEARCH_FIELDS,
        TableKind::Other => FALLBACK_SEARCH_FIELDS,
    }
}

/// Column the `today`/`week`/`month`/`year` date buckets apply to.
pub fn date_field(_table: &str) -> &'static str {
    DEFAULT_SORT_FIELD
}

/// PostgREST `select` list: every column plus any embedded resources.
pub fn select_columns(joins: &[String]) -> String {
    let mut columns = String::from("*");
    for join in joins.iter().map(|join| join.trim()).filter(|join| !join.is_empty()) {
        columns.push(',');
        columns.push_str(join);
    }
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_aliases() {
        assert_eq!(sort_field("bookings", Some("customer")), "customer_name");
        assert_eq!(sort_field("bookings", Some("price")), "total_price");
        assert_eq!(sort_field("bookings", Some("date")), "start_date");
        assert_eq!(sort_field("bookings", Some("created")), "created_at");
    }

    #[test]
    fn car_aliases() {
        assert_eq!(sort_field("cars", Some("price")), "price_per_day");
        assert_eq!(sort_field("cars", Some("name")), "name");
    }

    #[test]
    fn unknown_keys_pass_through() {
        assert_eq!(sort_field("cars", Some("seats")), "seats");
        assert_eq!(sort_field("profiles", Some("price")), "price");
    }

    #[test]
    fn missing_sort_uses_created_at() {
        assert_eq!(sort_field("cars", None), "created_at");
        assert_eq!(sort_field("cars", Some("  ")), "created_at");
    }

    #[test]
    fn search_fields_per_table() {
        assert_eq!(search_fields("cars"), &["name", "make", "model"]);
        assert_eq!(search_fields("bookings"), &["customer_name", "customer_email"]);
        assert_eq!(search_fields("profiles"), &["full_name", "email"]);
        assert_eq!(search_fields("locations"), &["name"]);
    }

    #[test]
    fn select_list_includes_joins() {
        assert_eq!(select_columns(&[]), "*");
        assert_eq!(
            select_columns(&["profiles(full_name,email,phone)".to_string(), " ".to_string()]),
            "*,profiles(full_name,email,phone)"
        );
    }
}
