//! JSON Schema to `RecordType` compiler
//!
//! Handles the subset of JSON Schema that templates use: `properties`,
//! `required`, `enum`, `items`, `nullable`, `default`, `title` and
//! `description`. Anything else compiles to an untyped field.

use super::record::{FieldDef, FieldType, RecordType};
use super::{SchemaError, SchemaResult};
use indexmap::IndexMap;
use serde_json::{Map, Value};

const DEFAULT_RECORD_NAME: &str = "Record";

/// Compile schema text into a record type
pub fn compile_str(schema_def: &str, name: Option<&str>) -> SchemaResult<RecordType> {
    let schema: Value = serde_json::from_str(schema_def)?;
    compile(&schema, name)
}

/// Compile a parsed schema into a record type.
///
/// The record is named `name`, else the schema's `title`, else `Record`.
pub fn compile(schema: &Value, name: Option<&str>) -> SchemaResult<RecordType> {
    compile_object(schema, name, "$")
}

fn compile_object(schema: &Value, name: Option<&str>, path: &str) -> SchemaResult<RecordType> {
    let schema = schema.as_object().ok_or(SchemaError::NotAnObject)?;
    match schema.get("type") {
        None => {}
        Some(Value::String(ty)) if ty == "object" => {}
        Some(_) => return Err(SchemaError::NotAnObject),
    }

    let title = schema.get("title").and_then(Value::as_str);
    let name = name.or(title).unwrap_or(DEFAULT_RECORD_NAME).to_string();

    let properties = match schema.get("properties") {
        None => Map::new(),
        Some(Value::Object(props)) => props.clone(),
        Some(_) => return Err(SchemaError::malformed(path, "`properties` must be an object")),
    };
    let required = required_names(schema, path)?;

    let mut fields = IndexMap::with_capacity(properties.len());
    for (field_name, props) in &properties {
        let field_path = format!("{}.{}", path, field_name);
        let props = props
            .as_object()
            .ok_or_else(|| SchemaError::malformed(&field_path, "field schema must be an object"))?;
        let field = compile_field(field_name, props, required.contains(field_name), &field_path)?;
        fields.insert(field_name.clone(), field);
    }

    Ok(RecordType {
        name,
        description: describe(schema),
        fields,
    })
}

fn required_names(schema: &Map<String, Value>, path: &str) -> SchemaResult<Vec<String>> {
    match schema.get("required") {
        None => Ok(Vec::new()),
        Some(Value::Array(names)) => names
            .iter()
            .map(|n| {
                n.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| SchemaError::malformed(path, "`required` entries must be strings"))
            })
            .collect(),
        Some(_) => Err(SchemaError::malformed(path, "`required` must be an array")),
    }
}

fn compile_field(
    field_name: &str,
    props: &Map<String, Value>,
    required: bool,
    path: &str,
) -> SchemaResult<FieldDef> {
    let (ty, union_null) = compile_type(field_name, props, path)?;
    let nullable = union_null || props.get("nullable").and_then(Value::as_bool).unwrap_or(false);

    let default = if required {
        None
    } else {
        Some(props.get("default").cloned().unwrap_or(Value::Null))
    };

    Ok(FieldDef {
        name: field_name.to_string(),
        ty,
        required,
        nullable,
        default,
        description: describe(props),
    })
}

/// Field type plus whether a `["T", "null"]` union made it nullable
fn compile_type(field_name: &str, props: &Map<String, Value>, path: &str) -> SchemaResult<(FieldType, bool)> {
    if let Some(values) = enum_values(props) {
        return Ok((
            FieldType::Enum {
                name: format!("{}Enum", capitalize(field_name)),
                values,
            },
            false,
        ));
    }

    let (json_type, union_null) = type_name(props);
    let ty = match json_type.as_deref().unwrap_or("string") {
        "object" if props.contains_key("properties") => {
            let nested_name = nested_name(field_name, props);
            FieldType::Object(Box::new(compile_object(
                &Value::Object(props.clone()),
                Some(&nested_name),
                path,
            )?))
        }
        "array" => match props.get("items") {
            Some(Value::Object(items)) => {
                FieldType::Array(Box::new(compile_item(field_name, items, &format!("{}[]", path))?))
            }
            Some(_) => return Err(SchemaError::malformed(path, "`items` must be an object")),
            None => FieldType::Array(Box::new(FieldType::Any)),
        },
        other => scalar(other),
    };
    Ok((ty, union_null))
}

/// Array items: objects become nested records, a missing type is untyped
fn compile_item(field_name: &str, items: &Map<String, Value>, path: &str) -> SchemaResult<FieldType> {
    if let Some(values) = enum_values(items) {
        return Ok(FieldType::Enum {
            name: format!("{}Enum", capitalize(field_name)),
            values,
        });
    }

    let (json_type, _) = type_name(items);
    Ok(match json_type.as_deref() {
        None => FieldType::Any,
        Some("object") if items.contains_key("properties") => {
            let nested_name = nested_name(field_name, items);
            FieldType::Object(Box::new(compile_object(
                &Value::Object(items.clone()),
                Some(&nested_name),
                path,
            )?))
        }
        Some("array") => match items.get("items") {
            Some(Value::Object(inner)) => FieldType::Array(Box::new(compile_item(field_name, inner, path)?)),
            _ => FieldType::Array(Box::new(FieldType::Any)),
        },
        Some(other) => scalar(other),
    })
}

fn scalar(json_type: &str) -> FieldType {
    match json_type {
        "string" => FieldType::String,
        "integer" => FieldType::Integer,
        "number" => FieldType::Number,
        "boolean" => FieldType::Boolean,
        "array" => FieldType::Array(Box::new(FieldType::Any)),
        "object" => FieldType::Map,
        _ => FieldType::Any,
    }
}

/// The declared type name; `["T", "null"]` yields `T` and a null flag
fn type_name(props: &Map<String, Value>) -> (Option<String>, bool) {
    match props.get("type") {
        Some(Value::String(ty)) => (Some(ty.clone()), false),
        Some(Value::Array(types)) => {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            let union_null = names.contains(&"null");
            let first = names.into_iter().find(|t| *t != "null").map(str::to_string);
            (first, union_null)
        }
        _ => (None, false),
    }
}

fn enum_values(props: &Map<String, Value>) -> Option<Vec<Value>> {
    match props.get("enum") {
        Some(Value::Array(values)) if !values.is_empty() => Some(values.clone()),
        _ => None,
    }
}

fn nested_name(field_name: &str, props: &Map<String, Value>) -> String {
    props
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| capitalize(field_name))
}

fn describe(props: &Map<String, Value>) -> Option<String> {
    props
        .get("description")
        .or_else(|| props.get("title"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// First character upper-cased, the rest lower-cased
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
