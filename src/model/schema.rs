use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Type tag of a schema field.
///
/// Tags outside the known set are kept verbatim in `Other` and accepted by the
/// validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Email,
    Phone,
    Array,
    Object,
    Other(String),
}

impl FieldType {
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Other(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, FieldType::Other(_))
    }
}

impl From<&str> for FieldType {
    fn from(tag: &str) -> Self {
        match tag {
            "string" => FieldType::String,
            "number" => FieldType::Number,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "email" => FieldType::Email,
            "phone" => FieldType::Phone,
            "array" => FieldType::Array,
            "object" => FieldType::Object,
            other => FieldType::Other(other.to_string()),
        }
    }
}

impl From<String> for FieldType {
    fn from(tag: String) -> Self {
        FieldType::from(tag.as_str())
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    /// Element type, only meaningful for `array` fields
    #[serde(rename = "itemType", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<FieldType>,
}

impl FieldSpec {
    pub fn required(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: true,
            item_type: None,
        }
    }

    pub fn optional(field_type: FieldType) -> Self {
        Self {
            field_type,
            required: false,
            item_type: None,
        }
    }

    /// An optional array whose elements must all be `item_type`
    pub fn array_of(item_type: FieldType) -> Self {
        Self {
            field_type: FieldType::Array,
            required: false,
            item_type: Some(item_type),
        }
    }

    pub fn and_required(mut self) -> Self {
        self.required = true;
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("schema must be a JSON object")]
    NotAnObject,
    #[error("field '{field}': {source}")]
    Field {
        field: String,
        source: serde_json::Error,
    },
    #[error("field '{0}' declares an itemType but is not an array")]
    ItemTypeOnScalar(String),
}

/// Closed-world description of a JSON request body.
///
/// Fields keep their declaration order; validation reports problems in that
/// order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: Vec<(String, FieldSpec)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, replacing any earlier declaration with the same name
    pub fn field(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = spec,
            None => self.fields.push((name, spec)),
        }
        self
    }

    /// Parse a schema written as `{"name": {"type": "string", "required": true}, ...}`
    pub fn from_json(value: Value) -> Result<Self, SchemaError> {
        let Value::Object(entries) = value else {
            return Err(SchemaError::NotAnObject);
        };

        let mut schema = Schema::new();
        for (name, raw) in entries {
            let spec: FieldSpec = serde_json::from_value(raw).map_err(|source| SchemaError::Field {
                field: name.clone(),
                source,
            })?;
            if spec.item_type.is_some() && spec.field_type != FieldType::Array {
                return Err(SchemaError::ItemTypeOnScalar(name));
            }
            schema = schema.field(name, spec);
        }
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, spec)| spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Type tags the validator does not know, with the field declaring them
    pub fn unknown_types(&self) -> Vec<(&str, &FieldType)> {
        let mut unknown = Vec::new();
        for (name, spec) in self.fields() {
            if !spec.field_type.is_known() {
                unknown.push((name, &spec.field_type));
            }
            if let Some(item_type) = spec.item_type.as_ref().filter(|t| !t.is_known()) {
                unknown.push((name, item_type));
            }
        }
        unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_from_json_keeps_declaration_order() {
        let schema = Schema::from_json(json!({
            "name": {"type": "string", "required": true},
            "email": {"type": "email"},
            "tags": {"type": "array", "itemType": "string"}
        }))
        .unwrap();

        let names: Vec<&str> = schema.fields().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["name", "email", "tags"]);
        assert!(schema.get("name").unwrap().required);
        assert!(!schema.get("email").unwrap().required);
        assert_eq!(
            schema.get("tags").unwrap().item_type,
            Some(FieldType::String)
        );
    }

    #[test]
    fn test_item_type_requires_array() {
        let result = Schema::from_json(json!({"age": {"type": "number", "itemType": "string"}}));
        assert!(matches!(result, Err(SchemaError::ItemTypeOnScalar(field)) if field == "age"));
    }

    #[test]
    fn test_unknown_types_are_reported() {
        let schema = Schema::new()
            .field("color", FieldSpec::optional(FieldType::from("hex")))
            .field("sizes", FieldSpec::array_of(FieldType::from("size")))
            .field("name", FieldSpec::required(FieldType::String));

        let unknown: Vec<(&str, String)> = schema
            .unknown_types()
            .into_iter()
            .map(|(name, tag)| (name, tag.to_string()))
            .collect();
        assert_eq!(
            unknown,
            vec![("color", "hex".to_string()), ("sizes", "size".to_string())]
        );
    }

    #[test]
    fn test_field_type_round_trips_through_string() {
        assert_eq!(FieldType::from("email"), FieldType::Email);
        assert_eq!(String::from(FieldType::Phone), "phone");
        assert_eq!(FieldType::from("uuid").as_str(), "uuid");
    }
}
