//! Embedding pipeline
//!
//! Splits text into overlapping chunks and embeds them for retrieval.

pub mod client;

pub use client::EmbeddingClient;

use crate::config::EmbedConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;

/// Embed errors
#[derive(Error, Debug)]
pub enum EmbedError {
    /// API error from LLM provider
    #[error("LLM API error: {0}")]
    ApiError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type EmbedResult<T> = Result<T, EmbedError>;

const PROBE_TEXT: &str = "This is a test sentence.";

/// A chunk of text with its embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    /// The text content
    pub text: String,
    /// The embedding vector
    pub embedding: Vec<f32>,
    /// Metadata about the chunk (e.g., offset, source)
    pub metadata: HashMap<String, String>,
}

/// Pipeline for processing text into embeddings
pub struct EmbedPipeline {
    chunk_size: usize,
    chunk_overlap: usize,
    client: EmbeddingClient,
}

impl EmbedPipeline {
    pub fn new(config: &EmbedConfig, api_key: Option<String>) -> EmbedResult<Self> {
        if config.chunk_size == 0 || config.chunk_overlap >= config.chunk_size {
            return Err(EmbedError::ConfigError(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        let client = EmbeddingClient::new(config, api_key)?;
        Ok(Self {
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            client,
        })
    }

    /// Embed a probe sentence to learn the vector size
    pub async fn detect_dimension(&self) -> EmbedResult<usize> {
        let probe = self.client.generate_embeddings(&[PROBE_TEXT.to_string()]).await?;
        let dimension = probe
            .first()
            .map(Vec::len)
            .filter(|d| *d > 0)
            .ok_or_else(|| EmbedError::ApiError("Empty embedding for probe text".to_string()))?;
        info!("Detected embedding dimension: {}", dimension);
        Ok(dimension)
    }

    /// Embed free-standing texts, one vector each
    pub async fn embed(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        self.client.generate_embeddings(texts).await
    }

    /// Process text into one or more chunks with embeddings
    pub async fn process_text(&self, text: &str) -> EmbedResult<Vec<TextChunk>> {
        let texts = self.split_text(text);
        let embeddings = self.client.generate_embeddings(&texts).await?;
        if embeddings.len() != texts.len() {
            return Err(EmbedError::ApiError(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        Ok(texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (text, embedding))| {
                let mut metadata = HashMap::new();
                metadata.insert("chunk_index".to_string(), i.to_string());
                TextChunk {
                    text,
                    embedding,
                    metadata,
                }
            })
            .collect())
    }

    /// Character-based splitter with overlap; never cuts inside a UTF-8 sequence
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = boundaries.len() - 1;

        if char_count <= self.chunk_size {
            return vec![text.to_string()];
        }

        let step = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let end = std::cmp::min(start + self.chunk_size, char_count);
            chunks.push(text[boundaries[start]..boundaries[end]].to_string());
            if end == char_count {
                break;
            }
            start += step;
        }
        chunks
    }
}
