//! Narrative sieve
//!
//! Compiles stored template schemas into record types, asks the model to
//! fill them from a narrative, and ranks templates by the model's
//! confidence. Compiled artifacts are cached per `(schema_id, kind)`.

pub mod predictor;

pub use predictor::Predictor;

use crate::graph::{Filter, GraphError, GraphStore, Record};
use crate::llm::{CompletionBackend, LlmError};
use crate::model::{Case, Entity, ModelError, Narrative, Status, Template, TemplateKind};
use crate::schema::{compile_str, RecordType, SchemaError};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You classify descriptions of client cases against structured templates. \
     Answer only with JSON matching the response schema.";

#[derive(Error, Debug)]
pub enum SieveError {
    #[error("Could not find {kind} {id}")]
    TemplateNotFound { kind: TemplateKind, id: String },

    #[error("{kind} {id} has no schema")]
    MissingSchema { kind: TemplateKind, id: String },

    #[error("{kind} {id} has an invalid schema: {source}")]
    InvalidSchema {
        kind: TemplateKind,
        id: String,
        #[source]
        source: SchemaError,
    },

    #[error("Invalid model answer for {0}")]
    InvalidAnswer(String),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type SieveResult<T> = Result<T, SieveError>;

type CacheKey = (String, TemplateKind);

/// One template's verdict on a narrative
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluated {
    pub template_id: String,
    pub kind: TemplateKind,
    pub record: Record,
    pub score: f64,
}

/// Compiled artifacts; `generation` moves on every invalidation so a load
/// that raced with one is not cached
#[derive(Default)]
struct SieveCache {
    generation: u64,
    templates: HashMap<CacheKey, Arc<Template>>,
    schemas: HashMap<CacheKey, Arc<RecordType>>,
    predictors: HashMap<CacheKey, Arc<Predictor>>,
}

impl SieveCache {
    fn forget(&mut self, key: &CacheKey) {
        self.templates.remove(key);
        self.schemas.remove(key);
        self.predictors.remove(key);
        self.generation += 1;
    }

    fn forget_all(&mut self) {
        self.templates.clear();
        self.schemas.clear();
        self.predictors.clear();
        self.generation += 1;
    }
}

pub struct Sieve {
    store: Arc<RwLock<GraphStore>>,
    backend: Arc<dyn CompletionBackend>,
    system_prompt: String,
    cache: RwLock<SieveCache>,
}

impl Sieve {
    pub fn new(store: Arc<RwLock<GraphStore>>, backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            store,
            backend,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            cache: RwLock::new(SieveCache::default()),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn backend(&self) -> &Arc<dyn CompletionBackend> {
        &self.backend
    }

    /// Load a stored template, caching it
    pub async fn get_template(&self, schema_id: &str, kind: TemplateKind) -> SieveResult<Arc<Template>> {
        let key = (schema_id.to_string(), kind);
        let generation = {
            let cache = self.cache.read().await;
            if let Some(template) = cache.templates.get(&key) {
                return Ok(template.clone());
            }
            cache.generation
        };

        let record = self
            .store
            .read()
            .await
            .find_one(kind.category(), schema_id)
            .ok_or_else(|| SieveError::TemplateNotFound {
                kind,
                id: schema_id.to_string(),
            })?;
        let template = Arc::new(Template::from_record(kind, record)?);

        let mut cache = self.cache.write().await;
        if cache.generation == generation {
            cache.templates.insert(key, template.clone());
        }
        Ok(template)
    }

    /// Compiled record type of a template, named `{Kind}_{schema_id}`
    pub async fn get_schema(&self, schema_id: &str, kind: TemplateKind) -> SieveResult<Arc<RecordType>> {
        let key = (schema_id.to_string(), kind);
        let generation = {
            let cache = self.cache.read().await;
            if let Some(schema) = cache.schemas.get(&key) {
                return Ok(schema.clone());
            }
            cache.generation
        };

        let template = self.get_template(schema_id, kind).await?;
        let schema_def = template
            .schema_def
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| SieveError::MissingSchema {
                kind,
                id: schema_id.to_string(),
            })?;
        let name = format!("{}_{}", kind, schema_id);
        let schema = Arc::new(compile_str(schema_def, Some(&name)).map_err(|source| {
            SieveError::InvalidSchema {
                kind,
                id: schema_id.to_string(),
                source,
            }
        })?);
        debug!("Compiled {} with {} fields", name, schema.fields.len());

        let mut cache = self.cache.write().await;
        if cache.generation == generation {
            cache.schemas.insert(key, schema.clone());
        }
        Ok(schema)
    }

    pub async fn get_predictor(&self, schema_id: &str, kind: TemplateKind) -> SieveResult<Arc<Predictor>> {
        let key = (schema_id.to_string(), kind);
        let generation = {
            let cache = self.cache.read().await;
            if let Some(predictor) = cache.predictors.get(&key) {
                return Ok(predictor.clone());
            }
            cache.generation
        };

        let schema = self.get_schema(schema_id, kind).await?;
        let template = self.get_template(schema_id, kind).await?;
        let predictor = Arc::new(Predictor::new(schema, template.prompt.clone()));

        let mut cache = self.cache.write().await;
        if cache.generation == generation {
            cache.predictors.insert(key, predictor.clone());
        }
        Ok(predictor)
    }

    /// Drop cached artifacts of one template
    pub async fn invalidate(&self, schema_id: &str, kind: TemplateKind) {
        let key = (schema_id.to_string(), kind);
        self.cache.write().await.forget(&key);
    }

    pub async fn invalidate_all(&self) {
        self.cache.write().await.forget_all();
    }

    pub async fn cached_templates(&self) -> usize {
        self.cache.read().await.templates.len()
    }

    /// Fill one template from a narrative
    pub async fn evaluate_one(&self, text: &str, schema_id: &str, kind: TemplateKind) -> SieveResult<Evaluated> {
        let predictor = self.get_predictor(schema_id, kind).await?;
        let request = predictor.request(&self.system_prompt, text);
        let answer = self.backend.complete(&request).await?;
        let (record, score) = predictor.parse(&answer)?;

        debug!("{} {} scored {:.3}", kind, schema_id, score);
        Ok(Evaluated {
            template_id: schema_id.to_string(),
            kind,
            record,
            score,
        })
    }

    /// Rank every current template of a kind (and drafts when asked).
    ///
    /// Candidates run concurrently; failures are logged and skipped. Ties
    /// keep catalog order.
    pub async fn evaluate_many(&self, text: &str, kind: TemplateKind, include_draft: bool) -> SieveResult<Vec<Evaluated>> {
        let candidates: Vec<String> = {
            let store = self.store.read().await;
            store
                .find(&Filter::category(kind.category()))
                .into_iter()
                .filter_map(|record| Template::from_record(kind, record).ok())
                .filter(|t| match t.status() {
                    Status::Current => true,
                    Status::Draft => include_draft,
                    Status::Superseded => false,
                })
                .map(|t| t.id)
                .collect()
        };
        info!("Ranking {} {} candidates", candidates.len(), kind);

        let outcomes = join_all(candidates.iter().map(|id| self.evaluate_one(text, id, kind))).await;

        let mut ranked = Vec::with_capacity(outcomes.len());
        for (id, outcome) in candidates.iter().zip(outcomes) {
            match outcome {
                Ok(evaluated) => ranked.push(evaluated),
                Err(e) => warn!("Skipping {} {}: {}", kind, id, e),
            }
        }
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(ranked)
    }

    /// Classify a case from its brief and narratives, then store the outcome.
    ///
    /// Only the outcome fields are written back, onto the case as it is
    /// when the model calls finish.
    pub async fn evaluate_case(&self, case_id: &str) -> SieveResult<Case> {
        let (pinned, prompt) = {
            let store = self.store.read().await;
            let case = load_case(&store, case_id)?;
            let brief = narrative_texts(&store, &case.brief)?;
            let narratives = narrative_texts(&store, case.narratives.as_deref().unwrap_or_default())?;
            (case.selected_template, case_prompt(&brief, &narratives))
        };

        let outcome = match pinned {
            Some(template_id) => {
                let evaluated = self.evaluate_one(&prompt, &template_id, TemplateKind::CaseTemplate).await?;
                CaseOutcome::Pinned {
                    analysis: record_text(&evaluated.record),
                }
            }
            None => {
                let ranked = self.evaluate_many(&prompt, TemplateKind::CaseTemplate, false).await?;
                if let Some(best) = ranked.first() {
                    info!("Case {} matched {} ({:.3})", case_id, best.template_id, best.score);
                }
                CaseOutcome::Ranked {
                    considered: ranked.iter().map(|e| e.template_id.clone()).collect(),
                    best: ranked
                        .first()
                        .map(|best| (best.template_id.clone(), record_text(&best.record))),
                }
            }
        };

        let mut store = self.store.write().await;
        let mut case = load_case(&store, case_id)?;
        outcome.apply(&mut case);
        store.update(Case::CATEGORY, case_id, case.to_record()?)?;
        store.commit()?;
        Ok(case)
    }
}

/// What an evaluation sets on a case
enum CaseOutcome {
    Pinned {
        analysis: String,
    },
    Ranked {
        considered: Vec<String>,
        best: Option<(String, String)>,
    },
}

impl CaseOutcome {
    fn apply(self, case: &mut Case) {
        match self {
            CaseOutcome::Pinned { analysis } => case.outcome_analysis = Some(analysis),
            CaseOutcome::Ranked { considered, best } => {
                case.considered_templates = Some(considered);
                if let Some((template_id, analysis)) = best {
                    case.selected_template = Some(template_id);
                    case.outcome_analysis = Some(analysis);
                }
            }
        }
    }
}

fn load_case(store: &GraphStore, case_id: &str) -> SieveResult<Case> {
    let record = store.find_one(Case::CATEGORY, case_id).ok_or_else(|| GraphError::NotFound {
        category: Case::CATEGORY.to_string(),
        id: case_id.to_string(),
    })?;
    Ok(Case::from_record(record)?)
}

fn narrative_texts(store: &GraphStore, ids: &[String]) -> SieveResult<Vec<String>> {
    ids.iter()
        .map(|id| {
            let record = store.find_one(Narrative::CATEGORY, id).ok_or_else(|| GraphError::NotFound {
                category: Narrative::CATEGORY.to_string(),
                id: id.clone(),
            })?;
            Ok(Narrative::from_record(record)?.text().to_string())
        })
        .collect()
}

fn case_prompt(brief: &[String], narratives: &[String]) -> String {
    let described = narratives.join("\n\n");
    if brief.is_empty() {
        format!(
            "This is a description of a client case. Here is how it was described by various people:\n\n{}",
            described
        )
    } else {
        format!(
            "This is a description of a client case. First the generic brief:\n\n{}\n\n\
             And then how it was described by various people:\n\n{}",
            brief.join("\n\n"),
            described
        )
    }
}

fn record_text(record: &Record) -> String {
    serde_json::Value::Object(record.clone()).to_string()
}
