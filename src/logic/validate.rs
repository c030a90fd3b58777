use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::borrow::Cow;

use crate::model::FieldType;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email pattern")
});

static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9]{9,13}$").expect("valid phone pattern"));

static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}T[0-9]{2}:[0-9]{2}:[0-9]{2}\.[0-9]{3}Z$")
        .expect("valid date pattern")
});

/// Checks single JSON values against schema type tags. Stateless.
pub struct Validator;

impl Validator {
    /// Whether `value` satisfies `field_type`.
    ///
    /// Falsy values (`null`, `false`, `0`, `""`) never pass a declared type.
    /// Unknown tags accept any truthy value.
    pub fn validate(field_type: &FieldType, value: &Value) -> bool {
        if !field_type.as_str().is_empty() && !is_truthy(value) {
            return false;
        }

        match field_type {
            FieldType::Number => match value {
                Value::Number(_) => true,
                Value::String(text) => parses_to_finite_number(text),
                _ => false,
            },
            FieldType::Email => as_text(value).is_some_and(|text| EMAIL.is_match(&text)),
            FieldType::Phone => as_text(value).is_some_and(|text| PHONE.is_match(&text)),
            FieldType::Object => value.is_object(),
            FieldType::String => value.is_string(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Date => as_text(value).is_some_and(|text| DATE.is_match(&text)),
            FieldType::Array | FieldType::Other(_) => true,
        }
    }
}

/// Shorthand for [`Validator::validate`]
pub fn validate(field_type: &FieldType, value: &Value) -> bool {
    Validator::validate(field_type, value)
}

/// JSON truthiness: everything except `null`, `false`, `0` and `""`
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map_or(true, |n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Scalars as the text a pattern is matched against
fn as_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(text) => Some(Cow::Borrowed(text.as_str())),
        Value::Number(number) => Some(Cow::Owned(number.to_string())),
        Value::Bool(flag) => Some(Cow::Owned(flag.to_string())),
        _ => None,
    }
}

fn parses_to_finite_number(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    let lower = trimmed.to_ascii_lowercase();
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = lower.strip_prefix(prefix) {
            return !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix));
        }
    }

    trimmed.parse::<f64>().map_or(false, f64::is_finite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_email() {
        assert!(validate(&FieldType::Email, &json!("a@b.co")));
        assert!(validate(&FieldType::Email, &json!("first.last+tag@mail.example.org")));
        assert!(!validate(&FieldType::Email, &json!("a@b")));
        assert!(!validate(&FieldType::Email, &json!("a@b.c")));
        assert!(!validate(&FieldType::Email, &json!("with space@b.co")));
    }

    #[test]
    fn test_number() {
        assert!(validate(&FieldType::Number, &json!("42")));
        assert!(validate(&FieldType::Number, &json!(" 4.5e2 ")));
        assert!(validate(&FieldType::Number, &json!("0x1F")));
        assert!(validate(&FieldType::Number, &json!(-3.25)));
        assert!(!validate(&FieldType::Number, &json!("")));
        assert!(!validate(&FieldType::Number, &json!("   ")));
        assert!(!validate(&FieldType::Number, &json!("Infinity")));
        assert!(!validate(&FieldType::Number, &json!("NaN")));
        assert!(!validate(&FieldType::Number, &json!("12abc")));
        assert!(!validate(&FieldType::Number, &json!(true)));
    }

    #[test]
    fn test_falsy_values_never_pass() {
        assert!(!validate(&FieldType::Number, &json!(0)));
        assert!(!validate(&FieldType::Boolean, &json!(false)));
        assert!(!validate(&FieldType::String, &json!("")));
        assert!(!validate(&FieldType::Object, &Value::Null));
        assert!(!validate(&FieldType::from("anything"), &Value::Null));
    }

    #[test]
    fn test_phone() {
        assert!(validate(&FieldType::Phone, &json!("+491701234567")));
        assert!(validate(&FieldType::Phone, &json!("123456789")));
        assert!(validate(&FieldType::Phone, &json!(4917012345_i64)));
        assert!(!validate(&FieldType::Phone, &json!("12345678")));
        assert!(!validate(&FieldType::Phone, &json!("12345678901234")));
        assert!(!validate(&FieldType::Phone, &json!("+49 170 1234567")));
    }

    #[test]
    fn test_object_string_boolean() {
        assert!(validate(&FieldType::Object, &json!({"a": 1})));
        assert!(!validate(&FieldType::Object, &json!([1, 2])));
        assert!(!validate(&FieldType::Object, &json!("{}")));
        assert!(validate(&FieldType::String, &json!("Ann")));
        assert!(!validate(&FieldType::String, &json!(7)));
        assert!(validate(&FieldType::Boolean, &json!(true)));
        assert!(!validate(&FieldType::Boolean, &json!("true")));
    }

    #[test]
    fn test_date() {
        assert!(validate(&FieldType::Date, &json!("2024-02-29T13:45:00.123Z")));
        assert!(!validate(&FieldType::Date, &json!("2024-02-29T13:45:00Z")));
        assert!(!validate(&FieldType::Date, &json!("2024-02-29 13:45:00.123Z")));
        assert!(!validate(&FieldType::Date, &json!("2024-02-29T13:45:00x123Z")));
        assert!(!validate(&FieldType::Date, &json!("2024-02-29T13:45:00.123+01:00")));
    }

    #[test]
    fn test_unknown_tag_is_permissive() {
        assert!(validate(&FieldType::from("uuid"), &json!("not-a-uuid")));
        assert!(validate(&FieldType::from("uuid"), &json!(12)));
    }

    #[test]
    fn test_validation_is_repeatable() {
        let value = json!("a@b.co");
        let results: Vec<bool> = (0..5)
            .map(|_| validate(&FieldType::Email, &value))
            .collect();
        assert!(results.iter().all(|passed| *passed));
    }
}
