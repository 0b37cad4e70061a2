//! Single serialization boundary for the JSON-text columns (jars, schedules,
//! photo lists, attachments, jar breakdowns). Nothing outside this module
//! parses or renders those columns.
//!
//! Reads for display are lenient: text that fails to parse is surfaced as the
//! raw string instead of failing the request. The ledger read of a user's
//! jars is the one strict path, because arithmetic on a half-parsed balance
//! would corrupt it further.

use kinboard_shared::domain::JarBalances;
use serde::Serialize;
use serde_json::Value;

use super::StorageError;

pub(crate) fn to_text<T: Serialize>(value: &T) -> Result<String, StorageError> {
    Ok(serde_json::to_string(value)?)
}

/// Lenient decode for display paths.
pub(crate) fn value_or_raw(raw: &str) -> Value {
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "stored document did not parse; returning raw text");
            Value::String(raw.to_string())
        }
    }
}

/// Strict decode for the jar ledger read-modify-write.
pub(crate) fn jars_from_text(raw: &str) -> Result<JarBalances, StorageError> {
    Ok(serde_json::from_str(raw)?)
}

/// Lenient jars decode for display paths; a corrupt row shows zeroes rather
/// than failing the request.
pub(crate) fn jars_or_default(raw: &str) -> JarBalances {
    serde_json::from_str(raw).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "stored jars did not parse; showing zeroes");
        JarBalances::default()
    })
}

pub(crate) fn string_list(items: Option<&[String]>) -> Result<String, StorageError> {
    to_text(&items.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinboard_shared::domain::Cents;

    #[test]
    fn value_or_raw_parses_valid_json() {
        let value = value_or_raw(r#"{"frequency":"weekly","days":[1,3,5]}"#);
        assert_eq!(value["frequency"], "weekly");
        assert_eq!(value["days"], serde_json::json!([1, 3, 5]));
    }

    #[test]
    fn value_or_raw_keeps_broken_text() {
        let value = value_or_raw("not json {");
        assert_eq!(value, Value::String("not json {".to_string()));
    }

    #[test]
    fn jars_round_trip() {
        let jars = JarBalances {
            spend: Cents(5_000),
            save: Cents(3_000),
            give: Cents(2_000),
        };
        let text = to_text(&jars).unwrap();
        assert_eq!(jars_from_text(&text).unwrap(), jars);
    }

    #[test]
    fn jars_reject_broken_text() {
        assert!(jars_from_text("oops").is_err());
    }

    #[test]
    fn string_list_defaults_to_empty() {
        assert_eq!(string_list(None).unwrap(), "[]");
        let photos = vec!["a.jpg".to_string()];
        assert_eq!(string_list(Some(&photos)).unwrap(), r#"["a.jpg"]"#);
    }
}
