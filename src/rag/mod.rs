//! Retrieval-augmented answers over stored narratives

pub mod index;

pub use index::VectorIndex;

use crate::embed::{EmbedError, EmbedPipeline};
use crate::graph::{Filter, GraphStore};
use crate::llm::{CompletionBackend, CompletionRequest, LlmError};
use crate::model::{Entity, Narrative};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum RagError {
    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Nothing indexed yet")]
    EmptyIndex,

    #[error("k must be between 1 and {max}, got {got}")]
    InvalidTopK { got: usize, max: usize },
}

pub type RagResult<T> = Result<T, RagError>;

/// Largest number of chunks a single query may retrieve
pub const MAX_TOP_K: usize = 64;

const ANSWER_SYSTEM_PROMPT: &str =
    "Answer questions about client cases using only the provided context. \
     Say so when the context does not contain the answer.";

#[derive(Debug, Clone)]
struct IndexedChunk {
    narrative_id: String,
    text: String,
}

#[derive(Default)]
struct RagState {
    index: Option<VectorIndex>,
    chunks: Vec<IndexedChunk>,
}

/// A chunk returned by retrieval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Retrieved {
    pub narrative_id: String,
    pub text: String,
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<Retrieved>,
}

pub struct RagEngine {
    pipeline: EmbedPipeline,
    backend: Arc<dyn CompletionBackend>,
    dimension: Option<usize>,
    state: RwLock<RagState>,
}

impl RagEngine {
    pub fn new(pipeline: EmbedPipeline, backend: Arc<dyn CompletionBackend>, dimension: Option<usize>) -> Self {
        Self {
            pipeline,
            backend,
            dimension,
            state: RwLock::new(RagState::default()),
        }
    }

    pub async fn chunk_count(&self) -> usize {
        self.state.read().await.chunks.len()
    }

    /// Rebuild the index from every narrative's title and content.
    /// Returns the number of chunks indexed.
    pub async fn index_narratives(&self, store: &RwLock<GraphStore>) -> RagResult<usize> {
        let narratives: Vec<(String, String)> = {
            let store = store.read().await;
            store
                .find(&Filter::category(Narrative::CATEGORY))
                .into_iter()
                .filter_map(|record| match Narrative::from_record(record) {
                    Ok(n) => Some(n),
                    Err(e) => {
                        warn!("Skipping narrative: {}", e);
                        None
                    }
                })
                .map(|n| {
                    let text = narrative_document(&n);
                    (n.id, text)
                })
                .filter(|(_, text)| !text.trim().is_empty())
                .collect()
        };

        let dimension = match self.dimension {
            Some(d) => d,
            None => self.pipeline.detect_dimension().await?,
        };

        let mut index = VectorIndex::new(dimension);
        let mut chunks = Vec::new();
        for (narrative_id, text) in narratives {
            for chunk in self.pipeline.process_text(&text).await? {
                index.add(chunks.len(), &chunk.embedding)?;
                chunks.push(IndexedChunk {
                    narrative_id: narrative_id.clone(),
                    text: chunk.text,
                });
            }
        }

        let count = chunks.len();
        *self.state.write().await = RagState {
            index: Some(index),
            chunks,
        };
        info!("Indexed {} narrative chunks", count);
        Ok(count)
    }

    /// The `k` chunks closest to the question
    pub async fn retrieve(&self, question: &str, k: usize) -> RagResult<Vec<Retrieved>> {
        check_top_k(k)?;
        let query = self
            .pipeline
            .embed(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::ApiError("No embedding for question".to_string()))?;

        let state = self.state.read().await;
        let index = match &state.index {
            Some(index) if !index.is_empty() => index,
            _ => return Err(RagError::EmptyIndex),
        };

        Ok(index
            .search(&query, k)?
            .into_iter()
            .filter_map(|(id, distance)| {
                state.chunks.get(id).map(|chunk| Retrieved {
                    narrative_id: chunk.narrative_id.clone(),
                    text: chunk.text.clone(),
                    distance,
                })
            })
            .collect())
    }

    /// Answer a question from the retrieved context
    pub async fn answer(&self, question: &str, k: usize) -> RagResult<RagAnswer> {
        let sources = self.retrieve(question, k).await?;
        let context = sources
            .iter()
            .map(|s| format!("[{}]\n{}", s.narrative_id, s.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        let request = CompletionRequest::text(format!("Context:\n{}\n\nQuestion: {}", context, question))
            .with_system(ANSWER_SYSTEM_PROMPT);
        let answer = self.backend.complete(&request).await?;

        Ok(RagAnswer { answer, sources })
    }
}

pub fn check_top_k(k: usize) -> RagResult<()> {
    if k == 0 || k > MAX_TOP_K {
        return Err(RagError::InvalidTopK { got: k, max: MAX_TOP_K });
    }
    Ok(())
}

/// Title and content of a narrative as one document
fn narrative_document(narrative: &Narrative) -> String {
    [narrative.title.as_deref(), narrative.content.as_deref()]
        .into_iter()
        .flatten()
        .filter(|s| !s.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbedConfig;
    use crate::llm::{LlmProvider, MockBackend};
    use serde_json::json;

    fn engine() -> RagEngine {
        let config = EmbedConfig {
            provider: LlmProvider::Mock,
            ..EmbedConfig::default()
        };
        let pipeline = EmbedPipeline::new(&config, None).unwrap();
        RagEngine::new(pipeline, Arc::new(MockBackend::new()), None)
    }

    fn store() -> RwLock<GraphStore> {
        let mut store = GraphStore::new();
        for (id, title, content) in [
            ("n1", "Local bakery", "A small local company with no automation expertise and ad hoc processes."),
            ("n2", "Logistics group", "A multinational with a central automation guild and mature tooling."),
        ] {
            let record = json!({"id": id, "when": "2025-03-01T10:00:00Z", "title": title, "content": content});
            store.insert("Narrative", record.as_object().cloned().unwrap()).unwrap();
        }
        RwLock::new(store)
    }

    #[tokio::test]
    async fn test_retrieve_before_indexing() {
        let err = engine().retrieve("anything", 3).await.unwrap_err();
        assert!(matches!(err, RagError::EmptyIndex));
    }

    #[tokio::test]
    async fn test_index_and_retrieve() {
        let engine = engine();
        let count = engine.index_narratives(&store()).await.unwrap();
        assert_eq!(count, 2);
        assert_eq!(engine.chunk_count().await, 2);

        let hits = engine.retrieve("small local company ad hoc", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].narrative_id, "n1");
        assert!(hits[0].text.starts_with("Local bakery"));
    }

    #[tokio::test]
    async fn test_answer_uses_backend() {
        let engine = engine();
        engine.index_narratives(&store()).await.unwrap();
        let answer = engine.answer("Who has a guild?", 2).await.unwrap();
        assert_eq!(answer.answer, crate::llm::mock::MOCK_TEXT_ANSWER);
        assert_eq!(answer.sources.len(), 2);
    }

    #[tokio::test]
    async fn test_retrieve_rejects_out_of_range_k() {
        let engine = engine();
        engine.index_narratives(&store()).await.unwrap();

        for k in [0, MAX_TOP_K + 1, usize::MAX] {
            let err = engine.retrieve("guild", k).await.unwrap_err();
            assert!(matches!(err, RagError::InvalidTopK { got, .. } if got == k));
        }
        // More than indexed is fine
        assert_eq!(engine.retrieve("guild", MAX_TOP_K).await.unwrap().len(), 2);
    }

    #[test]
    fn test_narrative_document() {
        let narrative: Narrative = serde_json::from_value(json!({
            "id": "n1", "when": "2025-03-01T10:00:00Z", "content": "Only content"
        }))
        .unwrap();
        assert_eq!(narrative_document(&narrative), "Only content");
    }
}
