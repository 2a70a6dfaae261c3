//! Output schema - the shape extracted fields must conform to.
//!
//! The schema drives two things: the JSON-schema fragment handed to the
//! provider when building a request, and the validation pass applied to
//! whatever comes back. Field order is preserved so prompts are
//! deterministic across runs.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ValidationError;

/// JSON type of one schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    StringList,
}

impl FieldKind {
    /// Name used in JSON-schema output and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::StringList => "array of strings",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
        }
    }
}

/// Specification of one extracted field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// JSON type the field must carry
    pub kind: FieldKind,

    /// Whether the field must be present
    pub required: bool,

    /// Guidance for the provider prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The schema extracted output is validated against.
///
/// # Example
///
/// ```rust,ignore
/// let schema = OutputSchema::new("contact")
///     .required_field("name", FieldKind::String, "Person's full name")
///     .field("company", FieldKind::String, "Employer, if mentioned")
///     .field("topics", FieldKind::StringList, "Topics discussed");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSchema {
    /// Schema name (used in prompts and provenance)
    pub name: String,

    /// Ordered field specifications
    pub fields: IndexMap<String, FieldSpec>,
}

impl OutputSchema {
    /// Create an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Add an optional field.
    pub fn field(
        mut self,
        name: impl Into<String>,
        kind: FieldKind,
        description: impl Into<String>,
    ) -> Self {
        self.fields.insert(
            name.into(),
            FieldSpec {
                kind,
                required: false,
                description: Some(description.into()),
            },
        );
        self
    }

    /// Add a required field.
    pub fn required_field(
        mut self,
        name: impl Into<String>,
        kind: FieldKind,
        description: impl Into<String>,
    ) -> Self {
        self.fields.insert(
            name.into(),
            FieldSpec {
                kind,
                required: true,
                description: Some(description.into()),
            },
        );
        self
    }

    /// Validate extracted output against this schema.
    ///
    /// Checks object-ness, required presence, declared types, and rejects
    /// undeclared fields. The first violation is returned; validation
    /// failures are retryable.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let Some(object) = value.as_object() else {
            return Err(ValidationError::NotAnObject {
                found: json_type_name(value).to_string(),
            });
        };

        for (name, spec) in &self.fields {
            match object.get(name) {
                Some(Value::Null) | None if spec.required => {
                    return Err(ValidationError::MissingField { field: name.clone() });
                }
                Some(Value::Null) | None => {}
                Some(field_value) => {
                    if !spec.kind.matches(field_value) {
                        return Err(ValidationError::WrongType {
                            field: name.clone(),
                            expected: spec.kind.type_name().to_string(),
                        });
                    }
                }
            }
        }

        for name in object.keys() {
            if !self.fields.contains_key(name) {
                return Err(ValidationError::UnknownField { field: name.clone() });
            }
        }

        Ok(())
    }

    /// Render the schema as a JSON-schema fragment for provider prompts.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();

        for (name, spec) in &self.fields {
            let type_schema = match spec.kind {
                FieldKind::String => json!({"type": "string"}),
                FieldKind::Number => json!({"type": "number"}),
                FieldKind::Boolean => json!({"type": "boolean"}),
                FieldKind::StringList => json!({"type": "array", "items": {"type": "string"}}),
            };
            let mut field_schema = type_schema;
            if let Some(description) = &spec.description {
                field_schema["description"] = json!(description);
            }
            properties.insert(name.clone(), field_schema);

            if spec.required {
                required.push(json!(name));
            }
        }

        json!({
            "type": "object",
            "title": self.name,
            "properties": properties,
            "required": required,
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
