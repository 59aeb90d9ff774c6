//! Offline completion backend
//!
//! Structured requests get a placeholder instance of the response schema;
//! bounded numbers (such as a confidence in `[0, 1]`) take their midpoint.

use super::{CompletionBackend, CompletionRequest, LlmResult};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

pub const MOCK_TEXT_ANSWER: &str = "This is a mock answer.";

#[derive(Debug, Clone, Default)]
pub struct MockBackend;

impl MockBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<String> {
        Ok(match &request.response_schema {
            Some(rs) => sample(&rs.schema).to_string(),
            None => MOCK_TEXT_ANSWER.to_string(),
        })
    }

    fn model(&self) -> &str {
        "mock"
    }
}

/// A value matching `schema`
pub fn sample(schema: &Value) -> Value {
    let Some(schema) = schema.as_object() else {
        return Value::Null;
    };

    if let Some(first) = schema
        .get("anyOf")
        .or_else(|| schema.get("oneOf"))
        .and_then(Value::as_array)
        .and_then(|alts| alts.first())
    {
        return sample(first);
    }
    if let Some(first) = schema.get("enum").and_then(Value::as_array).and_then(|v| v.first()) {
        return first.clone();
    }

    let ty = match schema.get("type") {
        Some(Value::String(ty)) => ty.as_str(),
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .unwrap_or("null"),
        _ => "null",
    };

    match ty {
        "object" => {
            let properties = schema.get("properties").and_then(Value::as_object);
            let fields: Map<String, Value> = properties
                .into_iter()
                .flatten()
                .map(|(name, prop)| (name.clone(), sample(prop)))
                .collect();
            Value::Object(fields)
        }
        "array" => json!([]),
        "string" => json!(""),
        "integer" => json!(0),
        "number" => {
            let min = schema.get("minimum").and_then(Value::as_f64);
            let max = schema.get("maximum").and_then(Value::as_f64);
            match (min, max) {
                (Some(lo), Some(hi)) => json!((lo + hi) / 2.0),
                (Some(lo), None) => json!(lo),
                _ => json!(0.0),
            }
        }
        "boolean" => json!(false),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_structured_answer() {
        let schema = json!({
            "type": "object",
            "properties": {
                "record": {
                    "type": "object",
                    "properties": {
                        "maturity": {"type": "string", "enum": ["none", "emerging"]},
                        "note": {"anyOf": [{"type": "string"}, {"type": "null"}]},
                        "count": {"type": "integer"}
                    }
                },
                "confidence": {"type": "number", "minimum": 0, "maximum": 1}
            }
        });
        let value = sample(&schema);
        assert_eq!(value["record"]["maturity"], json!("none"));
        assert_eq!(value["record"]["note"], json!(""));
        assert_eq!(value["record"]["count"], json!(0));
        assert_eq!(value["confidence"], json!(0.5));
    }

    #[tokio::test]
    async fn test_mock_backend_answers() {
        let backend = MockBackend::new();
        let text = backend.complete(&CompletionRequest::text("hello")).await.unwrap();
        assert_eq!(text, MOCK_TEXT_ANSWER);

        let structured = CompletionRequest::text("classify")
            .with_schema("Answer", json!({"type": "object", "properties": {"ok": {"type": "boolean"}}}));
        let text = backend.complete(&structured).await.unwrap();
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), json!({"ok": false}));
    }
}
