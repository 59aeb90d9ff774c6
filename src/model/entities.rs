//! Entity definitions

use super::{Entity, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! entity {
    ($ty:ident, $path:literal) => {
        impl Entity for $ty {
            const CATEGORY: &'static str = stringify!($ty);
            const PATH: &'static str = $path;

            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

/// Templates share one shape; only the category differs.
macro_rules! template_entity {
    ($(#[$doc:meta])* $ty:ident, $path:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct $ty {
            pub id: String,
            #[serde(default)]
            pub prompt: Option<String>,
            /// JSON Schema, stored as text
            #[serde(default)]
            pub schema_def: Option<String>,
            pub narrative: String,
            #[serde(default = "draft")]
            pub status: Option<Status>,
        }

        entity!($ty, $path);
    };
}

fn draft() -> Option<Status> {
    Some(Status::Draft)
}

/// A person involved in a process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// An organization where persons work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Organization {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mission_statement: Option<String>,
    #[serde(default)]
    pub base_narrative: Option<String>,
    #[serde(default)]
    pub subunits: Option<Vec<String>>,
    #[serde(default)]
    pub casebook: Option<Vec<String>>,
    pub rulebook: Rulebook,
    pub considered_rules: Rulebook,
}

/// Rules an organization follows; embedded, never stored alone
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rulebook {
    #[serde(default = "draft")]
    pub status: Option<Status>,
    #[serde(default)]
    pub rules: Option<Vec<String>>,
}

/// A client case, described by narratives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Case {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub narratives: Option<Vec<String>>,
    pub idealized: bool,
    #[serde(default)]
    pub selected_template: Option<String>,
    #[serde(default)]
    pub considered_templates: Option<Vec<String>>,
    /// Narrative ids forming the generic brief
    pub brief: Vec<String>,
    #[serde(default)]
    pub outcome: Option<Vec<String>>,
    #[serde(default)]
    pub outcome_analysis: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Report {
    pub id: String,
    pub narrative: String,
    #[serde(default)]
    pub evaluations: Option<Vec<Evaluation>>,
    #[serde(default)]
    pub based_on: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub process: Option<String>,
    #[serde(default)]
    pub superseded_by: Option<String>,
    #[serde(default)]
    pub situation_schema: Option<String>,
}

template_entity!(
    /// Schema describing a situation a rule applies to
    SituationSchema,
    "situation_schema"
);
template_entity!(
    /// Schema a case narrative is classified against
    CaseTemplate,
    "case_template"
);
template_entity!(OutcomeTemplate, "outcome_template");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportTemplate {
    pub id: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub schema_def: Option<String>,
    pub narrative: String,
    #[serde(default = "draft")]
    pub status: Option<Status>,
    #[serde(default)]
    pub objectives: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Objective {
    pub id: String,
    pub addresses: String,
    #[serde(default)]
    pub standard_of_evaluation: Option<String>,
    #[serde(default)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgramTemplate {
    pub id: String,
    pub name: String,
    pub narrative: String,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
    #[serde(default)]
    pub subprocesses: Option<Vec<String>>,
    #[serde(default)]
    pub follows_process: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Role {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Free text describing a case, written by one or more people
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Narrative {
    pub id: String,
    #[serde(default)]
    pub authors: Option<Vec<String>>,
    #[serde(default = "draft")]
    pub status: Option<Status>,
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl Narrative {
    /// Text used in prompts: the content, else the title
    pub fn text(&self) -> &str {
        self.content
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Criterion {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Evaluation {
    pub id: String,
    pub objective: String,
    pub value: f64,
    pub achieved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Skill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

entity!(Person, "person");
entity!(Organization, "organization");
entity!(Case, "case");
entity!(Report, "report");
entity!(Rule, "rule");
entity!(ReportTemplate, "report_template");
entity!(Objective, "objective");
entity!(ProgramTemplate, "program_template");
entity!(Role, "role");
entity!(Narrative, "narrative");
entity!(Criterion, "criterion");
entity!(Evaluation, "evaluation");
entity!(Skill, "skill");

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_status_defaults_to_draft() {
        let template: SituationSchema = serde_json::from_value(json!({
            "id": "a1111",
            "narrative": "n1",
            "schema_def": "{\"type\": \"object\"}"
        }))
        .unwrap();
        assert_eq!(template.status, Some(Status::Draft));
        assert_eq!(SituationSchema::CATEGORY, "SituationSchema");
        assert_eq!(SituationSchema::PATH, "situation_schema");
    }

    #[test]
    fn test_organization_embeds_rulebooks() {
        let org: Organization = serde_json::from_value(json!({
            "id": "o1",
            "name": "Guild",
            "rulebook": {"rules": ["r1"]},
            "considered_rules": {"status": "current"}
        }))
        .unwrap();
        assert_eq!(org.rulebook.status, Some(Status::Draft));
        assert_eq!(org.rulebook.rules, Some(vec!["r1".to_string()]));
        assert_eq!(org.considered_rules.status, Some(Status::Current));
    }

    #[test]
    fn test_case_requires_brief_and_idealized() {
        let missing = serde_json::from_value::<Case>(json!({"id": "c1", "name": "Case"}));
        assert!(missing.is_err());

        let case: Case = serde_json::from_value(json!({
            "id": "c1", "name": "Case", "idealized": false, "brief": ["n1"]
        }))
        .unwrap();
        assert!(case.selected_template.is_none());
        assert_eq!(case.brief, vec!["n1"]);
    }

    #[test]
    fn test_narrative_text_fallback() {
        let mut narrative: Narrative = serde_json::from_value(json!({
            "id": "n1",
            "when": "2025-03-01T10:00:00Z",
            "title": "Ad hoc processes"
        }))
        .unwrap();
        assert_eq!(narrative.text(), "Ad hoc processes");

        narrative.content = Some("This client is a small local company.".to_string());
        assert_eq!(narrative.text(), "This client is a small local company.");
    }

    #[test]
    fn test_report_embeds_evaluations() {
        let report: Report = serde_json::from_value(json!({
            "id": "rep1",
            "narrative": "n1",
            "evaluations": [{"id": "e1", "objective": "o1", "value": 0.8, "achieved": true}]
        }))
        .unwrap();
        assert_eq!(report.evaluations.unwrap()[0].value, 0.8);
    }
}
