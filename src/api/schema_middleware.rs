use axum::http::StatusCode;
use serde_json::Value;

use crate::api::context::{RequestBody, RequestCache, RequestContext};
use crate::api::error::error_reply;
use crate::api::middleware::{Flow, Middleware};
use crate::logic::validate::{is_truthy, validate};
use crate::model::{FieldType, Schema};

/// The first problem found in a request body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub name: String,
    pub type_label: String,
}

impl FieldViolation {
    fn new(name: impl Into<String>, type_label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_label: type_label.into(),
        }
    }

    pub fn message(&self) -> String {
        format!("\"{}\" must be of type \"{}\"", self.name, self.type_label)
    }
}

/// Rejects request bodies that do not match a route's schema with a 400.
///
/// Declared fields are checked in declaration order, then any undeclared key
/// is rejected. Only the first problem is reported.
#[derive(Debug, Clone)]
pub struct SchemaMiddleware {
    schema: Schema,
}

impl SchemaMiddleware {
    pub fn new(schema: Schema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Check `body` against the schema, `None` meaning it matches
    pub fn test_schema(&self, body: Option<&Value>) -> Option<FieldViolation> {
        let Some(Value::Object(fields)) = body.filter(|value| is_truthy(value)) else {
            return Some(FieldViolation::new("body", "object"));
        };

        for (name, spec) in self.schema.fields() {
            let value = fields.get(name).unwrap_or(&Value::Null);

            if spec.required && value.is_null() {
                return Some(FieldViolation::new(name, spec.field_type.as_str()));
            }

            if !is_truthy(value) {
                continue;
            }

            if spec.field_type == FieldType::Array {
                let Value::Array(items) = value else {
                    return Some(FieldViolation::new(name, "Array"));
                };
                if let Some(item_type) = &spec.item_type {
                    if !items.iter().all(|item| validate(item_type, item)) {
                        return Some(FieldViolation::new(name, format!("Array<{}>", item_type)));
                    }
                }
            } else if !validate(&spec.field_type, value) {
                return Some(FieldViolation::new(name, spec.field_type.as_str()));
            }
        }

        fields
            .keys()
            .find(|key| !self.schema.contains(key))
            .map(|key| FieldViolation::new(key.as_str(), "undefined"))
    }
}

#[async_trait::async_trait]
impl Middleware for SchemaMiddleware {
    fn name(&self) -> &'static str {
        "schema"
    }

    async fn handle_request(
        &self,
        ctx: &mut RequestContext,
        body: &RequestBody,
        _cache: &mut RequestCache,
    ) -> anyhow::Result<Flow> {
        let reparsed;
        let json = match body {
            RequestBody::Json(value) => Some(value),
            RequestBody::Raw(bytes) if bytes.is_empty() => None,
            RequestBody::Raw(bytes) => {
                reparsed = serde_json::from_slice::<Value>(bytes)?;
                Some(&reparsed)
            }
            RequestBody::Empty => None,
        };

        match self.test_schema(json) {
            Some(violation) => Ok(Flow::Terminate(error_reply(
                ctx,
                StatusCode::BAD_REQUEST,
                violation.message(),
            ))),
            None => Ok(Flow::Continue),
        }
    }
}
