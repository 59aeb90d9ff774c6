//! Domain entities
//!
//! Typed views over the category-tagged records held by the graph store.
//! Every entity rejects unknown fields, so a request body is validated by
//! deserializing it.

pub mod entities;
pub mod template;

pub use entities::*;
pub use template::{Template, TemplateKind};

use crate::graph::Record;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Key carrying the category on tagged records
pub const CATEGORY_KEY: &str = "category";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid {category}: {source}")]
    Invalid {
        category: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Do not change the Id")]
    IdChanged,

    #[error("Expected a JSON object")]
    NotAnObject,

    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Lifecycle of templates, narratives and rulebooks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Draft,
    Current,
    Superseded,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Draft => "draft",
            Status::Current => "current",
            Status::Superseded => "superseded",
        }
    }
}

/// A record type stored under one category and served under one route
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Category label in the store
    const CATEGORY: &'static str;
    /// Route segment under `/api`
    const PATH: &'static str;

    fn id(&self) -> &str;

    /// Validate a JSON record as this entity
    fn from_record(record: Record) -> ModelResult<Self> {
        serde_json::from_value(Value::Object(clean(record))).map_err(|source| ModelError::Invalid {
            category: Self::CATEGORY,
            source,
        })
    }

    /// The entity's fields as an untagged record
    fn to_record(&self) -> ModelResult<Record> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ModelError::NotAnObject),
            Err(source) => Err(ModelError::Invalid {
                category: Self::CATEGORY,
                source,
            }),
        }
    }
}

/// Every stored category, for constraint setup
pub const CATEGORIES: &[&str] = &[
    Person::CATEGORY,
    Organization::CATEGORY,
    Case::CATEGORY,
    Report::CATEGORY,
    Rule::CATEGORY,
    SituationSchema::CATEGORY,
    CaseTemplate::CATEGORY,
    OutcomeTemplate::CATEGORY,
    ReportTemplate::CATEGORY,
    Objective::CATEGORY,
    ProgramTemplate::CATEGORY,
    Role::CATEGORY,
    Narrative::CATEGORY,
    Criterion::CATEGORY,
    Evaluation::CATEGORY,
    Skill::CATEGORY,
];

/// Serialize an entity with its category tag
pub fn dump<E: Entity>(entity: &E) -> ModelResult<Record> {
    Ok(tag(E::CATEGORY, entity.to_record()?))
}

/// Prefix a record with its category tag
pub fn tag(category: &str, fields: Record) -> Record {
    let mut tagged = Record::new();
    tagged.insert(CATEGORY_KEY.to_string(), Value::String(category.to_string()));
    tagged.extend(clean(fields));
    tagged
}

/// Strip the category tag from a record
pub fn clean(mut record: Record) -> Record {
    record.shift_remove(CATEGORY_KEY);
    record
}

/// Split a tagged record into its category and fields
pub fn split_category(mut record: Record) -> Option<(String, Record)> {
    match record.shift_remove(CATEGORY_KEY) {
        Some(Value::String(category)) => Some((category, record)),
        _ => None,
    }
}

/// Apply a partial update to a stored record.
///
/// The patch may carry any subset of the entity's fields; an `id` in it must
/// match the path id. The merged record has to validate as the full entity.
pub fn merge_patch<E: Entity>(id: &str, current: Record, patch: Record) -> ModelResult<E> {
    let patch = clean(patch);
    if let Some(patched_id) = patch.get("id") {
        if patched_id.as_str() != Some(id) {
            return Err(ModelError::IdChanged);
        }
    }

    let mut merged = clean(current);
    for (key, value) in patch {
        merged.insert(key, value);
    }
    E::from_record(merged)
}

/// Validate the fields of a record against its category's entity type
pub fn validate(category: &str, record: Record) -> ModelResult<Record> {
    fn check<E: Entity>(record: Record) -> ModelResult<Record> {
        E::from_record(record)?.to_record()
    }

    match category {
        Person::CATEGORY => check::<Person>(record),
        Organization::CATEGORY => check::<Organization>(record),
        Case::CATEGORY => check::<Case>(record),
        Report::CATEGORY => check::<Report>(record),
        Rule::CATEGORY => check::<Rule>(record),
        SituationSchema::CATEGORY => check::<SituationSchema>(record),
        CaseTemplate::CATEGORY => check::<CaseTemplate>(record),
        OutcomeTemplate::CATEGORY => check::<OutcomeTemplate>(record),
        ReportTemplate::CATEGORY => check::<ReportTemplate>(record),
        Objective::CATEGORY => check::<Objective>(record),
        ProgramTemplate::CATEGORY => check::<ProgramTemplate>(record),
        Role::CATEGORY => check::<Role>(record),
        Narrative::CATEGORY => check::<Narrative>(record),
        Criterion::CATEGORY => check::<Criterion>(record),
        Evaluation::CATEGORY => check::<Evaluation>(record),
        Skill::CATEGORY => check::<Skill>(record),
        other => Err(ModelError::UnknownCategory(other.to_string())),
    }
}

/// Parse a JSON body into a record
pub fn as_record(value: Value) -> ModelResult<Record> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ModelError::NotAnObject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        as_record(value).unwrap()
    }

    #[test]
    fn test_dump_and_clean() {
        let person = Person {
            id: "maparent".to_string(),
            name: "Marc-Antoine Parent".to_string(),
            email: "maparent@example.com".to_string(),
        };
        let tagged = dump(&person).unwrap();
        assert_eq!(tagged.keys().next().map(String::as_str), Some("category"));
        assert_eq!(tagged["category"], json!("Person"));

        let (category, fields) = split_category(tagged.clone()).unwrap();
        assert_eq!(category, "Person");
        assert!(!fields.contains_key("category"));
        assert_eq!(clean(tagged), fields);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = Person::from_record(record(json!({
            "id": "p", "name": "n", "email": "e", "age": 3
        })))
        .unwrap_err();
        assert!(matches!(err, ModelError::Invalid { category: "Person", .. }));
    }

    #[test]
    fn test_category_tag_is_tolerated_on_input() {
        let person = Person::from_record(record(json!({
            "category": "Person", "id": "p", "name": "n", "email": "e"
        })))
        .unwrap();
        assert_eq!(person.id(), "p");
    }

    #[test]
    fn test_merge_patch() {
        let current = record(json!({"id": "r1", "name": "Lead", "description": null}));
        let role: Role = merge_patch("r1", current, record(json!({"description": "Runs the guild"}))).unwrap();
        assert_eq!(role.name, "Lead");
        assert_eq!(role.description.as_deref(), Some("Runs the guild"));
    }

    #[test]
    fn test_merge_patch_rejects_id_change() {
        let current = record(json!({"id": "r1", "name": "Lead"}));
        let err = merge_patch::<Role>("r1", current, record(json!({"id": "r2"}))).unwrap_err();
        assert!(matches!(err, ModelError::IdChanged));
    }

    #[test]
    fn test_merge_patch_validates_result() {
        let current = record(json!({"id": "r1", "name": "Lead"}));
        let err = merge_patch::<Role>("r1", current, record(json!({"name": null}))).unwrap_err();
        assert!(matches!(err, ModelError::Invalid { .. }));
    }

    #[test]
    fn test_validate_by_category() {
        let fields = validate("Role", record(json!({"id": "r1", "name": "Lead"}))).unwrap();
        assert_eq!(fields["name"], json!("Lead"));
        assert!(matches!(
            validate("Role", record(json!({"id": "r1"}))),
            Err(ModelError::Invalid { category: "Role", .. })
        ));
        assert!(matches!(
            validate("Widget", record(json!({"id": "w"}))),
            Err(ModelError::UnknownCategory(c)) if c == "Widget"
        ));
    }

    #[test]
    fn test_status_default_and_wire_format() {
        assert_eq!(Status::default(), Status::Draft);
        assert_eq!(serde_json::to_value(Status::Current).unwrap(), json!("current"));
    }
}
