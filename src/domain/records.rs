//! Loosely typed rows as returned by the remote table store.

use serde_json::{Map, Value};

/// One row: a JSON object keyed by column name.
pub type Record = Map<String, Value>;

/// The record's `id` column rendered as a string, if it is a string or number.
pub fn record_id(record: &Record) -> Option<String> {
    match record.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

/// Plain string form of a scalar column value. Strings are returned without
/// quotes; `null`, arrays and objects have no scalar form.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Non-empty string value of `field`, if any.
pub fn text_field<'a>(record: &'a Record, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn ids_from_strings_and_numbers() {
        assert_eq!(record_id(&record(json!({"id": "b-1"}))), Some("b-1".into()));
        assert_eq!(record_id(&record(json!({"id": 42}))), Some("42".into()));
        assert_eq!(record_id(&record(json!({"id": null}))), None);
        assert_eq!(record_id(&record(json!({}))), None);
    }

    #[test]
    fn scalar_text_skips_compound_values() {
        assert_eq!(scalar_text(&json!("suv")), Some("suv".into()));
        assert_eq!(scalar_text(&json!(4)), Some("4".into()));
        assert_eq!(scalar_text(&json!(true)), Some("true".into()));
        assert_eq!(scalar_text(&json!(null)), None);
        assert_eq!(scalar_text(&json!(["a"])), None);
    }

    #[test]
    fn empty_text_fields_are_absent() {
        let row = record(json!({"name": "", "make": "Volvo"}));
        assert_eq!(text_field(&row, "name"), None);
        assert_eq!(text_field(&row, "make"), Some("Volvo"));
        assert_eq!(text_field(&row, "model"), None);
    }
}
