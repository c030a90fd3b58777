use anyhow::{bail, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type Id = String;

/// One row or JSON object, keys in insertion order
pub type Record = Map<String, Value>;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Millisecond-precision UTC timestamp, e.g. `2024-01-01T00:00:00.000Z`
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Something stored as a database record and sent to clients as JSON.
pub trait Model: Serialize + DeserializeOwned + Sized {
    /// Apply every key present in `patch`; a `null` value clears the field
    fn update(&mut self, patch: &Record) -> Result<()> {
        let mut current = self.to_record()?;
        for (key, value) in patch {
            current.insert(key.clone(), value.clone());
        }
        *self = Self::from_record(current)?;
        Ok(())
    }

    /// Record to be stored in the database
    fn to_record(&self) -> Result<Record> {
        match serde_json::to_value(self)? {
            Value::Object(record) => Ok(record),
            other => bail!("model serialized to {} instead of an object", other),
        }
    }

    /// Representation sent to the client
    fn to_client(&self) -> Result<Value> {
        Ok(Value::Object(self.to_record()?))
    }

    /// Rebuild the model from a database record
    fn from_record(record: Record) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(record))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
        body: Option<String>,
    }

    impl Model for Note {}

    #[test]
    fn test_update_applies_null_and_keeps_absent_keys() {
        let mut note = Note {
            title: "draft".to_string(),
            body: Some("text".to_string()),
        };

        note.update(json!({"title": "final"}).as_object().unwrap()).unwrap();
        assert_eq!(note.title, "final");
        assert_eq!(note.body, Some("text".to_string()));

        note.update(json!({"body": null}).as_object().unwrap()).unwrap();
        assert_eq!(note.title, "final");
        assert_eq!(note.body, None);
    }

    #[test]
    fn test_timestamp_format_has_millis() {
        let ts = DateTime::parse_from_rfc3339("2024-03-01T10:20:30Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_timestamp(&ts), "2024-03-01T10:20:30.000Z");
    }
}
