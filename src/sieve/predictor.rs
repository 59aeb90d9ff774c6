//! Prompt/response contract for one compiled template

use super::{SieveError, SieveResult};
use crate::graph::Record;
use crate::llm::CompletionRequest;
use crate::schema::RecordType;
use serde_json::{json, Value};
use std::sync::Arc;

/// Confidence reported when the model omits one
const DEFAULT_CONFIDENCE: f64 = 1.0;

/// Binds a record type to the request sent to the model and the parsing of
/// its answer.
///
/// The model answers `{ "record": <record>, "confidence": <0..1> }`.
#[derive(Debug, Clone)]
pub struct Predictor {
    pub name: String,
    pub record_type: Arc<RecordType>,
    pub instructions: Option<String>,
    response_schema: Value,
}

impl Predictor {
    pub fn new(record_type: Arc<RecordType>, instructions: Option<String>) -> Self {
        let response_schema = json!({
            "type": "object",
            "properties": {
                "record": record_type.to_json_schema(),
                "confidence": {
                    "type": "number",
                    "minimum": 0,
                    "maximum": 1,
                    "description": "How well the narrative fits this template"
                }
            },
            "required": ["record", "confidence"],
            "additionalProperties": false
        });
        Self {
            name: record_type.name.clone(),
            record_type,
            instructions,
            response_schema,
        }
    }

    pub fn response_schema(&self) -> &Value {
        &self.response_schema
    }

    /// The structured request for a narrative
    pub fn request(&self, system: &str, text: &str) -> CompletionRequest {
        let mut prompt = String::new();
        if let Some(instructions) = self.instructions.as_deref().filter(|s| !s.trim().is_empty()) {
            prompt.push_str(instructions.trim());
            prompt.push_str("\n\n");
        }
        prompt.push_str("Narrative:\n");
        prompt.push_str(text);
        prompt.push_str(
            "\n\nFill in the record described by the response schema from the narrative, \
             and rate from 0 to 1 how confident you are that this template fits it.",
        );

        let request = CompletionRequest::text(prompt).with_system(system);
        let name = response_name(&self.name);
        if self.record_type.is_strict() {
            request.with_schema(name, self.response_schema.clone())
        } else {
            request.with_loose_schema(name, self.response_schema.clone())
        }
    }

    /// Validate a raw answer; returns the record and a confidence in `[0, 1]`
    pub fn parse(&self, answer: &str) -> SieveResult<(Record, f64)> {
        let value: Value = serde_json::from_str(extract_json(answer))
            .map_err(|e| SieveError::InvalidAnswer(format!("{}: {}", self.name, e)))?;

        let (record, confidence) = match value.get("record") {
            Some(record) => (record, value.get("confidence")),
            None => (&value, None),
        };
        let record = self
            .record_type
            .instantiate(record)
            .map_err(|e| SieveError::InvalidAnswer(format!("{}: {}", self.name, e)))?;

        let confidence = match confidence {
            None | Some(Value::Null) => DEFAULT_CONFIDENCE,
            Some(v) => v
                .as_f64()
                .ok_or_else(|| SieveError::InvalidAnswer(format!("{}: confidence is not a number", self.name)))?,
        };
        Ok((record, clamp_confidence(confidence)))
    }
}

/// Providers accept `[a-zA-Z0-9_-]` schema names only
fn response_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .take(64)
        .collect();
    if cleaned.is_empty() {
        "Record".to_string()
    } else {
        cleaned
    }
}

pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Extract the JSON document from an answer that may be wrapped in a
/// markdown fence or surrounded by prose.
pub fn extract_json(answer: &str) -> &str {
    let trimmed = answer.trim();

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        // Skip language tag (e.g. "json\n")
        let code_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        if let Some(end) = after_fence[code_start..].find("```") {
            return after_fence[code_start..code_start + end].trim();
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::compile;

    fn predictor() -> Predictor {
        let rt = compile(
            &json!({
                "properties": {
                    "maturity": {"enum": ["none", "emerging"]},
                    "note": {"type": "string"}
                },
                "required": ["maturity"]
            }),
            Some("CaseTemplate_a1111"),
        )
        .unwrap();
        Predictor::new(Arc::new(rt), Some("Assess the automation maturity.".to_string()))
    }

    #[test]
    fn test_request_shape() {
        let request = predictor().request("system", "They do everything by hand.");
        assert!(request.prompt.starts_with("Assess the automation maturity."));
        assert!(request.prompt.contains("They do everything by hand."));
        let rs = request.response_schema.unwrap();
        assert_eq!(rs.name, "CaseTemplate_a1111");
        assert_eq!(rs.schema["properties"]["record"]["title"], json!("CaseTemplate_a1111"));
        assert_eq!(rs.schema["required"], json!(["record", "confidence"]));
    }

    #[test]
    fn test_open_fields_relax_strict_mode() {
        assert!(predictor().request("system", "text").response_schema.unwrap().strict);

        let rt = compile(
            &json!({
                "properties": {
                    "maturity": {"enum": ["none", "emerging"]},
                    "extra": {"type": "object"},
                    "tags": {"type": "array"}
                }
            }),
            Some("CaseTemplate_open"),
        )
        .unwrap();
        let rs = Predictor::new(Arc::new(rt), None)
            .request("system", "text")
            .response_schema
            .unwrap();
        assert!(!rs.strict);
        assert_eq!(rs.schema["properties"]["record"]["properties"]["extra"]["anyOf"][0], json!({"type": "object"}));
    }

    #[test]
    fn test_parse_answer() {
        let (record, score) = predictor()
            .parse(r#"{"record": {"maturity": "none", "note": "manual"}, "confidence": 0.8}"#)
            .unwrap();
        assert_eq!(record["maturity"], json!("none"));
        assert_eq!(score, 0.8);
    }

    #[test]
    fn test_parse_clamps_and_defaults_confidence() {
        let p = predictor();
        let (_, high) = p.parse(r#"{"record": {"maturity": "none"}, "confidence": 7}"#).unwrap();
        assert_eq!(high, 1.0);
        let (_, low) = p.parse(r#"{"record": {"maturity": "none"}, "confidence": -2}"#).unwrap();
        assert_eq!(low, 0.0);
        // A bare record is accepted with full confidence
        let (record, bare) = p.parse(r#"{"maturity": "emerging"}"#).unwrap();
        assert_eq!(bare, 1.0);
        assert_eq!(record["note"], Value::Null);
    }

    #[test]
    fn test_parse_rejects_invalid_answers() {
        let p = predictor();
        assert!(matches!(p.parse("not json"), Err(SieveError::InvalidAnswer(_))));
        assert!(matches!(
            p.parse(r#"{"record": {"maturity": "total"}, "confidence": 0.3}"#),
            Err(SieveError::InvalidAnswer(_))
        ));
        assert!(matches!(
            p.parse(r#"{"record": {"maturity": "none"}, "confidence": "high"}"#),
            Err(SieveError::InvalidAnswer(_))
        ));
    }

    #[test]
    fn test_extract_json() {
        assert_eq!(extract_json("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json("Here you go: {\"a\": 1} hope it helps"), "{\"a\": 1}");
        assert_eq!(extract_json("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_response_name_is_sanitized() {
        assert_eq!(response_name("Center-Led, Guild Model"), "Center-Led__Guild_Model");
        assert_eq!(response_name(""), "Record");
    }
}
