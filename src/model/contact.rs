use crate::model::{format_timestamp, generate_id, Id, Model, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Id,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    /// ISO 8601 timestamp with millisecond precision
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: String,
}

impl Contact {
    pub fn new(name: String, email: String) -> Self {
        Self {
            id: generate_id(),
            name,
            email,
            phone: None,
            birthday: None,
            tags: Vec::new(),
            created_at: format_timestamp(&chrono::Utc::now()),
        }
    }

    /// Map a schema-checked request body onto the stored field types.
    ///
    /// Falsy values skip type checks, so they land here: a falsy `name` or
    /// `email` leaves the field unchanged, a falsy `phone` or `birthday`
    /// clears it and falsy `tags` become an empty list. A numeric phone is
    /// kept as its digits.
    pub fn normalize_patch(patch: Record) -> Record {
        patch
            .into_iter()
            .filter_map(|(key, value)| {
                let value = match key.as_str() {
                    "name" | "email" => match value {
                        Value::String(text) if !text.is_empty() => Value::String(text),
                        _ => return None,
                    },
                    "phone" | "birthday" => match value {
                        Value::String(text) if !text.is_empty() => Value::String(text),
                        Value::Number(number) if number.as_f64() != Some(0.0) => {
                            Value::String(number.to_string())
                        }
                        _ => Value::Null,
                    },
                    "tags" => match value {
                        Value::Array(items) => Value::Array(items),
                        _ => Value::Array(Vec::new()),
                    },
                    _ => value,
                };
                Some((key, value))
            })
            .collect()
    }

    /// vCard 3.0 rendering, served as a raw byte payload
    pub fn to_vcard(&self) -> String {
        let mut lines = vec![
            "BEGIN:VCARD".to_string(),
            "VERSION:3.0".to_string(),
            format!("FN:{}", self.name),
            format!("EMAIL:{}", self.email),
        ];
        if let Some(phone) = &self.phone {
            lines.push(format!("TEL:{}", phone));
        }
        if let Some(birthday) = &self.birthday {
            // BDAY takes the date part only
            lines.push(format!("BDAY:{}", birthday.get(..10).unwrap_or(birthday.as_str())));
        }
        if !self.tags.is_empty() {
            lines.push(format!("CATEGORIES:{}", self.tags.join(",")));
        }
        lines.push("END:VCARD".to_string());
        lines.join("\r\n") + "\r\n"
    }
}

impl Model for Contact {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contact_update_from_patch() {
        let mut contact = Contact::new("Ann".to_string(), "ann@example.com".to_string());
        let patch = json!({"phone": "+4912345678", "tags": ["work"]});

        contact.update(patch.as_object().unwrap()).unwrap();

        assert_eq!(contact.phone.as_deref(), Some("+4912345678"));
        assert_eq!(contact.tags, vec!["work".to_string()]);
        assert_eq!(contact.name, "Ann");
    }

    #[test]
    fn test_normalize_patch_maps_falsy_and_numeric_values() {
        let patch = json!({
            "name": 0,
            "email": "",
            "phone": 4917012345u64,
            "birthday": false,
            "tags": ""
        });

        let normalized = Contact::normalize_patch(patch.as_object().unwrap().clone());
        assert_eq!(
            Value::Object(normalized.clone()),
            json!({"phone": "4917012345", "birthday": null, "tags": []})
        );

        let mut contact = Contact::new("Ann".to_string(), "ann@example.com".to_string());
        contact.birthday = Some("1990-05-17T00:00:00.000Z".to_string());
        contact.update(&normalized).unwrap();
        assert_eq!(contact.name, "Ann");
        assert_eq!(contact.phone.as_deref(), Some("4917012345"));
        assert_eq!(contact.birthday, None);
        assert!(contact.tags.is_empty());
    }

    #[test]
    fn test_contact_from_database_record() {
        let record = json!({
            "id": "c-1",
            "name": "Ann",
            "email": "ann@example.com",
            "phone": null,
            "birthday": "1990-05-17T00:00:00.000Z",
            "tags": ["family"],
            "created_at": "2024-01-01T00:00:00.000Z"
        });

        let contact = Contact::from_record(record.as_object().unwrap().clone()).unwrap();
        assert_eq!(contact.phone, None);
        assert_eq!(contact.tags, vec!["family".to_string()]);

        let card = contact.to_vcard();
        assert!(card.starts_with("BEGIN:VCARD\r\n"));
        assert!(card.contains("BDAY:1990-05-17\r\n"));
        assert!(card.contains("CATEGORIES:family\r\n"));
    }
}
