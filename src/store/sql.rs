//! Column and placeholder lists built from a record, for repositories that
//! write whole models.
//!
//! A key missing from the record is "not provided" and produces no column;
//! a key holding `null` is written as SQL `NULL`.

use serde_json::Value;

use crate::model::Record;

/// Keys present in the record, in record order
pub fn defined_keys(record: &Record) -> Vec<&str> {
    record.keys().map(String::as_str).collect()
}

/// Values matching [`defined_keys`], nulls included
pub fn defined_values(record: &Record) -> Vec<Value> {
    record.values().cloned().collect()
}

/// `"a", "b"`
pub fn insert_columns(record: &Record) -> String {
    defined_keys(record)
        .into_iter()
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `$start, $start+1, ...`, one per defined value
pub fn insert_placeholders(record: &Record, start: usize) -> String {
    (0..defined_keys(record).len())
        .map(|offset| format!("${}", start + offset))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `"a" = $start, "b" = $start+1`
pub fn update_columns(record: &Record, start: usize) -> String {
    defined_keys(record)
        .into_iter()
        .enumerate()
        .map(|(offset, column)| format!("{} = ${}", quote_ident(column), start + offset))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> Record {
        json!({"name": "Ann", "phone": null, "email": "ann@example.com"})
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_null_values_are_kept() {
        assert_eq!(defined_keys(&record()), vec!["name", "phone", "email"]);
        assert_eq!(
            defined_values(&record()),
            vec![json!("Ann"), Value::Null, json!("ann@example.com")]
        );
    }

    #[test]
    fn test_insert_fragments() {
        assert_eq!(insert_columns(&record()), r#""name", "phone", "email""#);
        assert_eq!(insert_placeholders(&record(), 1), "$1, $2, $3");
    }

    #[test]
    fn test_update_fragment_offsets() {
        assert_eq!(
            update_columns(&record(), 2),
            r#""name" = $2, "phone" = $3, "email" = $4"#
        );
        assert_eq!(update_columns(&Record::new(), 1), "");
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
    }
}
