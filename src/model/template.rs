//! Template kinds and the shared template view

use super::{
    clean, CaseTemplate, Entity, ModelError, ModelResult, OutcomeTemplate, ReportTemplate,
    SituationSchema, Status,
};
use crate::graph::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The four entity kinds that carry a schema
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemplateKind {
    SituationSchema,
    #[default]
    CaseTemplate,
    OutcomeTemplate,
    ReportTemplate,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 4] = [
        TemplateKind::SituationSchema,
        TemplateKind::CaseTemplate,
        TemplateKind::OutcomeTemplate,
        TemplateKind::ReportTemplate,
    ];

    /// Category label of the kind
    pub fn category(&self) -> &'static str {
        match self {
            TemplateKind::SituationSchema => SituationSchema::CATEGORY,
            TemplateKind::CaseTemplate => CaseTemplate::CATEGORY,
            TemplateKind::OutcomeTemplate => OutcomeTemplate::CATEGORY,
            TemplateKind::ReportTemplate => ReportTemplate::CATEGORY,
        }
    }

    /// Route segment of the kind
    pub fn path(&self) -> &'static str {
        match self {
            TemplateKind::SituationSchema => SituationSchema::PATH,
            TemplateKind::CaseTemplate => CaseTemplate::PATH,
            TemplateKind::OutcomeTemplate => OutcomeTemplate::PATH,
            TemplateKind::ReportTemplate => ReportTemplate::PATH,
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

/// Accepts the category name (`CaseTemplate`) or the route segment (`case_template`)
impl FromStr for TemplateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TemplateKind::ALL
            .into_iter()
            .find(|kind| kind.category() == s || kind.path() == s)
            .ok_or_else(|| format!("Unexpected schema type: {}", s))
    }
}

/// Common view over the template entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub schema_def: Option<String>,
    pub narrative: String,
    #[serde(default)]
    pub status: Option<Status>,
}

impl Template {
    /// Read a stored record of any template kind
    pub fn from_record(kind: TemplateKind, record: Record) -> ModelResult<Self> {
        serde_json::from_value(Value::Object(clean(record))).map_err(|source| ModelError::Invalid {
            category: kind.category(),
            source,
        })
    }

    pub fn status(&self) -> Status {
        self.status.unwrap_or_default()
    }
}
