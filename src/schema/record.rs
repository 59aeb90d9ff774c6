//! Runtime record types

use super::{SchemaError, SchemaResult};
use crate::graph::Record;
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

/// Type of a compiled field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    /// Closed set of values, named `{Field}Enum`
    Enum { name: String, values: Vec<Value> },
    Array(Box<FieldType>),
    /// Object with declared properties
    Object(Box<RecordType>),
    /// Object without declared properties
    Map,
    Any,
}

impl FieldType {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Enum { .. } => "enum",
            FieldType::Array(_) => "array",
            FieldType::Object(_) => "object",
            FieldType::Map => "map",
            FieldType::Any => "any",
        }
    }

    /// Whether strict structured output can express the type; open
    /// objects and untyped values cannot
    pub fn is_strict(&self) -> bool {
        match self {
            FieldType::Map | FieldType::Any => false,
            FieldType::Array(item) => item.is_strict(),
            FieldType::Object(record) => record.is_strict(),
            _ => true,
        }
    }

    fn json_schema(&self) -> Value {
        match self {
            FieldType::String => json!({"type": "string"}),
            FieldType::Integer => json!({"type": "integer"}),
            FieldType::Number => json!({"type": "number"}),
            FieldType::Boolean => json!({"type": "boolean"}),
            FieldType::Enum { values, .. } => {
                if values.iter().all(Value::is_string) {
                    json!({"type": "string", "enum": values})
                } else {
                    json!({"enum": values})
                }
            }
            FieldType::Array(item) => json!({"type": "array", "items": item.json_schema()}),
            FieldType::Object(record) => record.to_json_schema(),
            FieldType::Map => json!({"type": "object"}),
            FieldType::Any => json!({}),
        }
    }

    fn placeholder(&self) -> Value {
        match self {
            FieldType::String => json!(""),
            FieldType::Integer => json!(0),
            FieldType::Number => json!(0.0),
            FieldType::Boolean => json!(false),
            FieldType::Enum { values, .. } => values.first().cloned().unwrap_or(Value::Null),
            FieldType::Array(_) => json!([]),
            FieldType::Object(record) => Value::Object(record.skeleton()),
            FieldType::Map => json!({}),
            FieldType::Any => Value::Null,
        }
    }

    /// Check a value, normalizing integral floats for integer fields
    fn check(&self, value: &Value, path: &str) -> SchemaResult<Value> {
        let mismatch = || SchemaError::invalid(path, format!("expected {}, got {}", self.type_name(), value));
        match self {
            FieldType::String if value.is_string() => Ok(value.clone()),
            FieldType::Integer => {
                if value.is_i64() || value.is_u64() {
                    Ok(value.clone())
                } else {
                    match value.as_f64() {
                        Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(json!(f as i64)),
                        _ => Err(mismatch()),
                    }
                }
            }
            FieldType::Number if value.is_number() => Ok(value.clone()),
            FieldType::Boolean if value.is_boolean() => Ok(value.clone()),
            FieldType::Enum { values, .. } => {
                if values.contains(value) {
                    Ok(value.clone())
                } else {
                    Err(SchemaError::invalid(path, format!("{} is not one of {:?}", value, values)))
                }
            }
            FieldType::Array(item) => {
                let elements = value.as_array().ok_or_else(mismatch)?;
                elements
                    .iter()
                    .enumerate()
                    .map(|(i, element)| item.check(element, &format!("{}[{}]", path, i)))
                    .collect::<SchemaResult<Vec<_>>>()
                    .map(Value::Array)
            }
            FieldType::Object(record) => record.instantiate_at(value, path).map(Value::Object),
            FieldType::Map if value.is_object() => Ok(value.clone()),
            FieldType::Any => Ok(value.clone()),
            _ => Err(mismatch()),
        }
    }
}

/// A compiled field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub required: bool,
    pub nullable: bool,
    /// Value used when the field is absent; `None` for required fields
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl FieldDef {
    fn json_schema(&self) -> Value {
        let mut schema = self.ty.json_schema();
        // Strict mode lists every property as required, so optional ones admit null
        if self.nullable || !self.required {
            schema = json!({"anyOf": [schema, {"type": "null"}]});
        }
        if let (Some(description), Some(obj)) = (&self.description, schema.as_object_mut()) {
            obj.insert("description".to_string(), json!(description));
        }
        schema
    }
}

/// A record type synthesized from a JSON Schema
#[derive(Debug, Clone, PartialEq)]
pub struct RecordType {
    pub name: String,
    pub description: Option<String>,
    /// Fields in schema order
    pub fields: IndexMap<String, FieldDef>,
}

impl RecordType {
    /// Declared property names, in schema order
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    /// Validate a value against the record type.
    ///
    /// Every declared field appears in the result; absent optional fields
    /// take their default. Undeclared keys are dropped.
    pub fn instantiate(&self, value: &Value) -> SchemaResult<Record> {
        self.instantiate_at(value, "$")
    }

    fn instantiate_at(&self, value: &Value, path: &str) -> SchemaResult<Record> {
        let object = value
            .as_object()
            .ok_or_else(|| SchemaError::invalid(path, format!("expected object {}, got {}", self.name, value)))?;

        let mut record = Map::new();
        for (name, field) in &self.fields {
            let field_path = format!("{}.{}", path, name);
            let checked = match object.get(name) {
                None if field.required => {
                    return Err(SchemaError::invalid(&field_path, "missing required field"));
                }
                None => field.default.clone().unwrap_or(Value::Null),
                Some(Value::Null) if field.nullable || !field.required => Value::Null,
                Some(Value::Null) => {
                    return Err(SchemaError::invalid(&field_path, "field is not nullable"));
                }
                Some(v) => field.ty.check(v, &field_path)?,
            };
            record.insert(name.clone(), checked);
        }
        Ok(record)
    }

    /// Whether every field, nested ones included, has a strict schema
    pub fn is_strict(&self) -> bool {
        self.fields.values().all(|field| field.ty.is_strict())
    }

    /// JSON Schema for structured output; strict-shaped, though open fields
    /// stay open (see `is_strict`)
    pub fn to_json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, field)| (name.clone(), field.json_schema()))
            .collect();
        let required: Vec<&str> = self.field_names();

        let mut schema = json!({
            "type": "object",
            "title": self.name,
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        });
        if let (Some(description), Some(obj)) = (&self.description, schema.as_object_mut()) {
            obj.insert("description".to_string(), json!(description));
        }
        schema
    }

    /// Placeholder instance: defaults where given, zero values otherwise
    pub fn skeleton(&self) -> Record {
        self.fields
            .iter()
            .map(|(name, field)| {
                let value = match &field.default {
                    Some(default) if !default.is_null() => default.clone(),
                    Some(_) => Value::Null,
                    None => field.ty.placeholder(),
                };
                (name.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::compile;
    use super::*;

    fn sample() -> RecordType {
        compile(
            &json!({
                "title": "Assessment",
                "properties": {
                    "maturity": {"enum": ["none", "emerging", "established"]},
                    "team_size": {"type": "integer"},
                    "score": {"type": "number", "default": 0.5},
                    "note": {"type": "string"},
                    "owner": {"type": "string", "nullable": true},
                    "risks": {"type": "array", "items": {"type": "string"}},
                    "budget": {
                        "type": "object",
                        "properties": {"amount": {"type": "number"}},
                        "required": ["amount"]
                    }
                },
                "required": ["maturity", "team_size", "owner"]
            }),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_instantiate_fills_defaults_and_drops_extras() {
        let record = sample()
            .instantiate(&json!({
                "maturity": "none",
                "team_size": 4.0,
                "owner": null,
                "unexpected": true
            }))
            .unwrap();

        assert_eq!(record["team_size"], json!(4));
        assert_eq!(record["score"], json!(0.5));
        assert_eq!(record["note"], Value::Null);
        assert_eq!(record["owner"], Value::Null);
        assert!(!record.contains_key("unexpected"));
        assert_eq!(record.len(), 7);
    }

    #[test]
    fn test_instantiate_rejects_bad_values() {
        let rt = sample();
        let missing = rt.instantiate(&json!({"maturity": "none", "owner": "x"}));
        assert!(matches!(missing, Err(SchemaError::Validation { ref path, .. }) if path == "$.team_size"));

        let bad_enum = rt.instantiate(&json!({"maturity": "total", "team_size": 1, "owner": "x"}));
        assert!(bad_enum.is_err());

        let fractional = rt.instantiate(&json!({"maturity": "none", "team_size": 1.5, "owner": "x"}));
        assert!(fractional.is_err());

        let bad_item = rt.instantiate(&json!({"maturity": "none", "team_size": 1, "owner": "x", "risks": ["a", 2]}));
        assert!(matches!(bad_item, Err(SchemaError::Validation { ref path, .. }) if path == "$.risks[1]"));

        let bad_nested = rt.instantiate(&json!({"maturity": "none", "team_size": 1, "owner": "x", "budget": {}}));
        assert!(matches!(bad_nested, Err(SchemaError::Validation { ref path, .. }) if path == "$.budget.amount"));

        assert!(rt.instantiate(&json!("text")).is_err());
    }

    #[test]
    fn test_strict_json_schema() {
        let schema = sample().to_json_schema();
        assert_eq!(schema["additionalProperties"], json!(false));
        assert_eq!(schema["required"].as_array().unwrap().len(), 7);
        assert_eq!(schema["properties"]["team_size"], json!({"type": "integer"}));
        assert_eq!(
            schema["properties"]["note"],
            json!({"anyOf": [{"type": "string"}, {"type": "null"}]})
        );
        assert_eq!(
            schema["properties"]["maturity"]["enum"],
            json!(["none", "emerging", "established"])
        );
        let budget = &schema["properties"]["budget"]["anyOf"][0];
        assert_eq!(budget["additionalProperties"], json!(false));
    }

    #[test]
    fn test_strictness_follows_nested_fields() {
        assert!(sample().is_strict());

        let open = [
            json!({"properties": {"extra": {"type": "object"}}}),
            json!({"properties": {"tags": {"type": "array"}}}),
            json!({"properties": {"owner": {"type": "object", "properties": {"meta": {"type": "whatever"}}}}}),
        ];
        for schema in open {
            assert!(!compile(&schema, None).unwrap().is_strict(), "{}", schema);
        }
    }

    #[test]
    fn test_skeleton_is_a_valid_instance() {
        let rt = sample();
        let skeleton = rt.skeleton();
        assert_eq!(skeleton["maturity"], json!("none"));
        assert_eq!(skeleton["score"], json!(0.5));
        assert_eq!(skeleton["owner"], json!(""));
        assert!(rt.instantiate(&Value::Object(skeleton)).is_ok());
    }
}
