use async_trait::async_trait;
use processieve::graph::{GraphStore, Record};
use processieve::llm::{CompletionBackend, CompletionRequest, LlmError, LlmResult};
use processieve::model::{as_record, Case, Entity, TemplateKind, CATEGORIES};
use processieve::sieve::{Sieve, SieveError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

const SIZE_SCHEMA: &str = r#"{
  "title": "Organization profile",
  "type": "object",
  "properties": {
    "numberOfBusinessUnits": {"type": "integer", "minimum": 1},
    "geographicDistribution": {"type": "string", "enum": ["Centralized", "Regional", "Global"]},
    "willingnessToShareKnowledge": {"type": "boolean"}
  },
  "required": ["numberOfBusinessUnits", "willingnessToShareKnowledge"]
}"#;

/// Answers by response schema name and remembers every request
#[derive(Default)]
struct ScriptedBackend {
    answers: HashMap<String, LlmResult<String>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    fn answer(mut self, schema_name: &str, answer: Value) -> Self {
        self.answers.insert(schema_name.to_string(), Ok(answer.to_string()));
        self
    }

    fn raw(mut self, schema_name: &str, answer: &str) -> Self {
        self.answers.insert(schema_name.to_string(), Ok(answer.to_string()));
        self
    }

    fn fail(mut self, schema_name: &str) -> Self {
        self.answers
            .insert(schema_name.to_string(), Err(LlmError::ApiError("rate limited".to_string())));
        self
    }

    fn prompts(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|r| r.prompt.clone()).collect()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<String> {
        self.seen.lock().unwrap().push(request.clone());
        let name = request
            .response_schema
            .as_ref()
            .map(|s| s.name.clone())
            .unwrap_or_default();
        match self.answers.get(&name) {
            Some(Ok(answer)) => Ok(answer.clone()),
            Some(Err(e)) => Err(LlmError::ApiError(e.to_string())),
            None => Err(LlmError::ApiError(format!("no scripted answer for {}", name))),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

fn record(value: Value) -> Record {
    as_record(value).unwrap()
}

fn template(id: &str, status: &str) -> Record {
    record(json!({
        "id": id,
        "narrative": "n1",
        "prompt": format!("Template {} instructions.", id),
        "schema_def": SIZE_SCHEMA,
        "status": status
    }))
}

fn profile(units: i64, confidence: Value) -> Value {
    json!({
        "record": {
            "numberOfBusinessUnits": units,
            "geographicDistribution": "Regional",
            "willingnessToShareKnowledge": true
        },
        "confidence": confidence
    })
}

fn setup(records: Vec<(&str, Record)>, backend: ScriptedBackend) -> (Sieve, Arc<RwLock<GraphStore>>, Arc<ScriptedBackend>) {
    let mut store = GraphStore::new();
    store.create_id_constraints(CATEGORIES.iter().copied()).unwrap();
    for (category, record) in records {
        store.insert(category, record).unwrap();
    }
    store.commit().unwrap();

    let store = Arc::new(RwLock::new(store));
    let backend = Arc::new(backend);
    let sieve = Sieve::new(Arc::clone(&store), backend.clone());
    (sieve, store, backend)
}

#[tokio::test]
async fn test_ranking_orders_by_confidence() {
    let backend = ScriptedBackend::default()
        .answer("CaseTemplate_low", profile(2, json!(0.2)))
        .answer("CaseTemplate_high", profile(12, json!(0.9)))
        .answer("CaseTemplate_mid", profile(5, json!(0.6)));
    let (sieve, _, _) = setup(
        vec![
            ("CaseTemplate", template("low", "current")),
            ("CaseTemplate", template("high", "current")),
            ("CaseTemplate", template("mid", "current")),
        ],
        backend,
    );

    let ranked = sieve
        .evaluate_many("Twelve business units across regions.", TemplateKind::CaseTemplate, false)
        .await
        .unwrap();
    let ids: Vec<&str> = ranked.iter().map(|e| e.template_id.as_str()).collect();
    assert_eq!(ids, vec!["high", "mid", "low"]);
    assert_eq!(ranked[0].record["numberOfBusinessUnits"], json!(12));
    assert_eq!(ranked[0].kind, TemplateKind::CaseTemplate);
}

#[tokio::test]
async fn test_ties_keep_catalog_order() {
    let backend = ScriptedBackend::default()
        .answer("CaseTemplate_b", profile(1, json!(0.5)))
        .answer("CaseTemplate_a", profile(1, json!(0.5)));
    let (sieve, _, _) = setup(
        vec![
            ("CaseTemplate", template("b", "current")),
            ("CaseTemplate", template("a", "current")),
        ],
        backend,
    );

    let ranked = sieve.evaluate_many("text", TemplateKind::CaseTemplate, false).await.unwrap();
    let ids: Vec<&str> = ranked.iter().map(|e| e.template_id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[tokio::test]
async fn test_failed_candidates_are_skipped() {
    let backend = ScriptedBackend::default()
        .answer("CaseTemplate_ok", profile(3, json!(0.4)))
        .fail("CaseTemplate_down")
        .raw("CaseTemplate_garbled", "I think it fits well.");
    let (sieve, _, _) = setup(
        vec![
            ("CaseTemplate", template("ok", "current")),
            ("CaseTemplate", template("down", "current")),
            ("CaseTemplate", template("garbled", "current")),
        ],
        backend,
    );

    let ranked = sieve.evaluate_many("text", TemplateKind::CaseTemplate, false).await.unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].template_id, "ok");

    assert!(matches!(
        sieve.evaluate_one("text", "down", TemplateKind::CaseTemplate).await,
        Err(SieveError::Llm(_))
    ));
    assert!(matches!(
        sieve.evaluate_one("text", "garbled", TemplateKind::CaseTemplate).await,
        Err(SieveError::InvalidAnswer(_))
    ));
}

#[tokio::test]
async fn test_answer_parsing_tolerances() {
    let fenced = format!("```json\n{}\n```", profile(4, json!(1.7)));
    let backend = ScriptedBackend::default()
        .raw("CaseTemplate_fenced", &fenced)
        .answer(
            "CaseTemplate_bare",
            json!({"numberOfBusinessUnits": 4.0, "willingnessToShareKnowledge": false}),
        )
        .answer(
            "CaseTemplate_wrong",
            json!({"record": {"numberOfBusinessUnits": 3, "geographicDistribution": "Mars", "willingnessToShareKnowledge": true}}),
        );
    let (sieve, _, _) = setup(
        vec![
            ("CaseTemplate", template("fenced", "current")),
            ("CaseTemplate", template("bare", "current")),
            ("CaseTemplate", template("wrong", "current")),
        ],
        backend,
    );

    // Out-of-range confidence is clamped
    let fenced = sieve.evaluate_one("text", "fenced", TemplateKind::CaseTemplate).await.unwrap();
    assert_eq!(fenced.score, 1.0);

    // A bare record counts as fully confident; optional fields fall back to null
    let bare = sieve.evaluate_one("text", "bare", TemplateKind::CaseTemplate).await.unwrap();
    assert_eq!(bare.score, 1.0);
    assert_eq!(bare.record["numberOfBusinessUnits"], json!(4));
    assert_eq!(bare.record["geographicDistribution"], Value::Null);

    // Values violating the schema are rejected
    assert!(matches!(
        sieve.evaluate_one("text", "wrong", TemplateKind::CaseTemplate).await,
        Err(SieveError::InvalidAnswer(_))
    ));
}

#[tokio::test]
async fn test_prompt_carries_template_instructions() {
    let backend = ScriptedBackend::default().answer("SituationSchema_s1", profile(1, json!(0.3)));
    let (sieve, _, backend) = setup(vec![("SituationSchema", template("s1", "current"))], backend);

    sieve
        .evaluate_one("A small bakery.", "s1", TemplateKind::SituationSchema)
        .await
        .unwrap();
    let prompts = backend.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("Template s1 instructions."));
    assert!(prompts[0].contains("A small bakery."));
}

#[tokio::test]
async fn test_evaluate_case_ranks_and_stores() {
    let backend = ScriptedBackend::default()
        .answer("CaseTemplate_guild", profile(12, json!(0.8)))
        .answer("CaseTemplate_central", profile(1, json!(0.3)));
    let (sieve, store, backend) = setup(
        vec![
            ("Narrative", record(json!({"id": "brief", "when": "2025-03-01T10:00:00Z", "content": "Automation program."}))),
            ("Narrative", record(json!({"id": "n1", "when": "2025-03-02T10:00:00Z", "title": "Twelve units, global."}))),
            ("CaseTemplate", template("central", "current")),
            ("CaseTemplate", template("guild", "current")),
            ("CaseTemplate", template("draft", "draft")),
            (
                "Case",
                record(json!({"id": "c1", "name": "Logistics", "idealized": false, "brief": ["brief"], "narratives": ["n1"]})),
            ),
        ],
        backend,
    );

    let case = sieve.evaluate_case("c1").await.unwrap();
    assert_eq!(case.selected_template.as_deref(), Some("guild"));
    assert_eq!(
        case.considered_templates,
        Some(vec!["guild".to_string(), "central".to_string()])
    );
    let analysis: Value = serde_json::from_str(case.outcome_analysis.as_deref().unwrap()).unwrap();
    assert_eq!(analysis["numberOfBusinessUnits"], json!(12));

    let prompt = &backend.prompts()[0];
    assert!(prompt.contains("First the generic brief:\n\nAutomation program."));
    assert!(prompt.contains("Twelve units, global."));

    let stored = store.read().await.find_one(Case::CATEGORY, "c1").unwrap();
    assert_eq!(Case::from_record(stored).unwrap(), case);
}

#[tokio::test]
async fn test_evaluate_case_with_selected_template() {
    let backend = ScriptedBackend::default().answer("CaseTemplate_chosen", profile(7, json!(0.1)));
    let (sieve, _, backend) = setup(
        vec![
            ("Narrative", record(json!({"id": "n1", "when": "2025-03-02T10:00:00Z", "content": "Seven units."}))),
            ("CaseTemplate", template("chosen", "draft")),
            ("CaseTemplate", template("other", "current")),
            (
                "Case",
                record(json!({"id": "c1", "name": "Pinned", "idealized": true, "brief": [], "narratives": ["n1"], "selected_template": "chosen"})),
            ),
        ],
        backend,
    );

    let case = sieve.evaluate_case("c1").await.unwrap();
    assert_eq!(case.selected_template.as_deref(), Some("chosen"));
    assert_eq!(case.considered_templates, None);
    assert!(case.outcome_analysis.unwrap().contains("\"numberOfBusinessUnits\":7"));

    // Only the pinned template was asked
    assert_eq!(backend.prompts().len(), 1);
    assert!(backend.prompts()[0].contains("This is a description of a client case. Here is how"));
}

#[tokio::test]
async fn test_evaluate_case_missing_narrative() {
    let (sieve, _, _) = setup(
        vec![(
            "Case",
            record(json!({"id": "c1", "name": "Dangling", "idealized": false, "brief": ["gone"]})),
        )],
        ScriptedBackend::default(),
    );

    assert!(matches!(
        sieve.evaluate_case("c1").await,
        Err(SieveError::Graph(_))
    ));
    assert!(matches!(
        sieve.evaluate_case("nope").await,
        Err(SieveError::Graph(_))
    ));
}

/// Renames the case while its evaluation is waiting on the model
struct RenamingBackend {
    store: Arc<RwLock<GraphStore>>,
}

#[async_trait]
impl CompletionBackend for RenamingBackend {
    async fn complete(&self, _request: &CompletionRequest) -> LlmResult<String> {
        let mut store = self.store.write().await;
        let mut case = store.find_one(Case::CATEGORY, "c1").unwrap();
        case.insert("name".to_string(), json!("Renamed meanwhile"));
        store.update(Case::CATEGORY, "c1", case).unwrap();
        store.commit().unwrap();
        Ok(profile(6, json!(0.7)).to_string())
    }

    fn model(&self) -> &str {
        "renaming"
    }
}

#[tokio::test]
async fn test_evaluate_case_keeps_concurrent_edits() {
    let mut store = GraphStore::new();
    store.create_id_constraints(CATEGORIES.iter().copied()).unwrap();
    store
        .insert(
            "Narrative",
            record(json!({"id": "n1", "when": "2025-03-02T10:00:00Z", "content": "Six units."})),
        )
        .unwrap();
    store.insert("CaseTemplate", template("t1", "current")).unwrap();
    store
        .insert(
            "Case",
            record(json!({"id": "c1", "name": "Original", "idealized": false, "brief": [], "narratives": ["n1"]})),
        )
        .unwrap();
    store.commit().unwrap();
    let store = Arc::new(RwLock::new(store));

    let backend = Arc::new(RenamingBackend {
        store: Arc::clone(&store),
    });
    let sieve = Sieve::new(Arc::clone(&store), backend);

    let case = sieve.evaluate_case("c1").await.unwrap();
    assert_eq!(case.name, "Renamed meanwhile");
    assert_eq!(case.selected_template.as_deref(), Some("t1"));

    let stored = Case::from_record(store.read().await.find_one(Case::CATEGORY, "c1").unwrap()).unwrap();
    assert_eq!(stored.name, "Renamed meanwhile");
    assert_eq!(stored.considered_templates, Some(vec!["t1".to_string()]));
    assert!(stored.outcome_analysis.unwrap().contains("\"numberOfBusinessUnits\":6"));
}
