//! Declarative output schemas and the generic validator that checks provider
//! payloads against them.
//!
//! A schema is plain data (usually loaded from the flow catalog YAML), so the
//! same validator handles every flow. Validation is pure: it never mutates the
//! payload, and a payload that passed once passes again.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub fields: Vec<FieldSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Enum {
        values: Vec<String>,
    },
    Object {
        fields: Vec<FieldSpec>,
    },
    List {
        items: Box<FieldKind>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },
}

impl FieldKind {
    fn type_name(&self) -> &'static str {
        match self {
            FieldKind::String | FieldKind::Enum { .. } => "string",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Object { .. } => "object",
            FieldKind::List { .. } => "list",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    NotAnObject,
    MissingField,
    WrongType {
        expected: &'static str,
        found: &'static str,
    },
    NotInEnum {
        value: String,
        allowed: Vec<String>,
    },
    TooFewItems {
        min: usize,
        found: usize,
    },
    TooManyItems {
        max: usize,
        found: usize,
    },
}

/// First constraint a payload broke, with the JSON path where it happened.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {kind}")]
pub struct SchemaViolation {
    pub path: String,
    pub kind: ViolationKind,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::NotAnObject => write!(f, "expected an object"),
            ViolationKind::MissingField => write!(f, "required field is missing"),
            ViolationKind::WrongType { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            ViolationKind::NotInEnum { value, allowed } => {
                write!(f, "'{}' is not one of [{}]", value, allowed.join(", "))
            }
            ViolationKind::TooFewItems { min, found } => {
                write!(f, "expected at least {} items, found {}", min, found)
            }
            ViolationKind::TooManyItems { max, found } => {
                write!(f, "expected at most {} items, found {}", max, found)
            }
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

fn child_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", parent, field)
    }
}

impl OutputSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Check `value` against every declared constraint. Undeclared fields are
    /// ignored.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        match value {
            Value::Object(map) => validate_fields(&self.fields, map, ""),
            _ => Err(SchemaViolation {
                path: "$".to_string(),
                kind: ViolationKind::NotAnObject,
            }),
        }
    }

    /// JSON Schema rendering handed to the provider alongside the prompt.
    pub fn to_json_schema(&self) -> Value {
        object_json_schema(&self.fields)
    }
}

fn validate_fields(
    fields: &[FieldSpec],
    map: &Map<String, Value>,
    path: &str,
) -> Result<(), SchemaViolation> {
    for field in fields {
        let field_path = child_path(path, &field.name);
        match map.get(&field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    return Err(SchemaViolation {
                        path: field_path,
                        kind: ViolationKind::MissingField,
                    });
                }
            }
            Some(v) => validate_kind(&field.kind, field.required, v, &field_path)?,
        }
    }
    Ok(())
}

fn validate_kind(
    kind: &FieldKind,
    required: bool,
    value: &Value,
    path: &str,
) -> Result<(), SchemaViolation> {
    let wrong_type = || SchemaViolation {
        path: path.to_string(),
        kind: ViolationKind::WrongType {
            expected: kind.type_name(),
            found: json_type_name(value),
        },
    };

    match kind {
        FieldKind::String => value.as_str().map(|_| ()).ok_or_else(wrong_type),
        FieldKind::Integer => {
            if value.is_i64() || value.is_u64() {
                Ok(())
            } else {
                Err(wrong_type())
            }
        }
        FieldKind::Number => {
            if value.is_number() {
                Ok(())
            } else {
                Err(wrong_type())
            }
        }
        FieldKind::Boolean => value.as_bool().map(|_| ()).ok_or_else(wrong_type),
        FieldKind::Enum { values } => {
            let s = value.as_str().ok_or_else(wrong_type)?;
            if values.iter().any(|allowed| allowed == s) {
                Ok(())
            } else {
                Err(SchemaViolation {
                    path: path.to_string(),
                    kind: ViolationKind::NotInEnum {
                        value: s.to_string(),
                        allowed: values.clone(),
                    },
                })
            }
        }
        FieldKind::Object { fields } => {
            let map = value.as_object().ok_or_else(wrong_type)?;
            validate_fields(fields, map, path)
        }
        FieldKind::List {
            items,
            min_items,
            max_items,
        } => {
            let list = value.as_array().ok_or_else(wrong_type)?;
            // A required collection must not come back empty unless the
            // schema says so explicitly.
            let min = min_items.unwrap_or(if required { 1 } else { 0 });
            if list.len() < min {
                return Err(SchemaViolation {
                    path: path.to_string(),
                    kind: ViolationKind::TooFewItems {
                        min,
                        found: list.len(),
                    },
                });
            }
            if let Some(max) = *max_items
                && list.len() > max
            {
                return Err(SchemaViolation {
                    path: path.to_string(),
                    kind: ViolationKind::TooManyItems {
                        max,
                        found: list.len(),
                    },
                });
            }
            for (i, item) in list.iter().enumerate() {
                let item_path = format!("{}[{}]", path, i);
                if item.is_null() {
                    return Err(SchemaViolation {
                        path: item_path,
                        kind: ViolationKind::MissingField,
                    });
                }
                validate_kind(items, true, item, &item_path)?;
            }
            Ok(())
        }
    }
}

fn object_json_schema(fields: &[FieldSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        let mut prop = kind_json_schema(&field.kind);
        if let (Some(desc), Some(obj)) = (&field.description, prop.as_object_mut()) {
            obj.insert("description".to_string(), Value::String(desc.clone()));
        }
        properties.insert(field.name.clone(), prop);
        if field.required {
            required.push(Value::String(field.name.clone()));
        }
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn kind_json_schema(kind: &FieldKind) -> Value {
    match kind {
        FieldKind::String => json!({ "type": "string" }),
        FieldKind::Integer => json!({ "type": "integer" }),
        FieldKind::Number => json!({ "type": "number" }),
        FieldKind::Boolean => json!({ "type": "boolean" }),
        FieldKind::Enum { values } => json!({ "type": "string", "enum": values }),
        FieldKind::Object { fields } => object_json_schema(fields),
        FieldKind::List {
            items,
            min_items,
            max_items,
        } => {
            let mut schema = json!({ "type": "array", "items": kind_json_schema(items) });
            if let Some(obj) = schema.as_object_mut() {
                if let Some(min) = min_items {
                    obj.insert("minItems".to_string(), json!(min));
                }
                if let Some(max) = max_items {
                    obj.insert("maxItems".to_string(), json!(max));
                }
            }
            schema
        }
    }
}
