//! Chat-completion client
//!
//! Structured requests carry a JSON Schema the answer has to match; plain
//! requests return free text.

pub mod client;
pub mod mock;

pub use client::ChatClient;
pub use mock::MockBackend;

use crate::config::LlmConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM API error: {0}")]
    ApiError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type LlmResult<T> = Result<T, LlmError>;

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    /// OpenAI-compatible endpoint
    Cohere,
    Ollama,
    /// Offline answers for tests and demos
    Mock,
}

impl LlmProvider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "https://api.openai.com/v1",
            LlmProvider::Cohere => "https://api.cohere.ai/compatibility/v1",
            LlmProvider::Ollama => "http://localhost:11434",
            LlmProvider::Mock => "",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LlmProvider::OpenAI => "openai",
            LlmProvider::Cohere => "cohere",
            LlmProvider::Ollama => "ollama",
            LlmProvider::Mock => "mock",
        };
        f.write_str(name)
    }
}

impl FromStr for LlmProvider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAI),
            "cohere" => Ok(LlmProvider::Cohere),
            "ollama" => Ok(LlmProvider::Ollama),
            "mock" => Ok(LlmProvider::Mock),
            other => Err(LlmError::ConfigError(format!("Unknown provider: {}", other))),
        }
    }
}

/// Named schema constraining a structured answer
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: Value,
    /// Ask the provider to enforce the schema exactly
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub response_schema: Option<ResponseSchema>,
}

impl CompletionRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            response_schema: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_schema(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.response_schema = Some(ResponseSchema {
            name: name.into(),
            schema,
            strict: true,
        });
        self
    }

    /// Like `with_schema`, for schemas with open objects or untyped values
    /// that strict mode rejects
    pub fn with_loose_schema(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.response_schema = Some(ResponseSchema {
            name: name.into(),
            schema,
            strict: false,
        });
        self
    }
}

/// Anything that can answer a completion request
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<String>;

    /// Model identifier, for logs and status
    fn model(&self) -> &str;
}

/// Build the backend named by the configuration
pub fn backend_from_config(config: &LlmConfig) -> LlmResult<Arc<dyn CompletionBackend>> {
    match config.provider {
        LlmProvider::Mock => Ok(Arc::new(MockBackend::new())),
        _ => Ok(Arc::new(ChatClient::new(config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_parsing() {
        assert_eq!("Cohere".parse::<LlmProvider>().unwrap(), LlmProvider::Cohere);
        assert_eq!("mock".parse::<LlmProvider>().unwrap(), LlmProvider::Mock);
        assert!("gemini".parse::<LlmProvider>().is_err());
        assert_eq!(LlmProvider::OpenAI.to_string(), "openai");
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::text("hello")
            .with_system("be brief")
            .with_schema("Answer", json!({"type": "object"}));
        assert_eq!(request.system.as_deref(), Some("be brief"));
        assert_eq!(request.response_schema.unwrap().name, "Answer");
    }

    #[test]
    fn test_backend_from_config() {
        let config = LlmConfig {
            provider: LlmProvider::Mock,
            ..LlmConfig::default()
        };
        let backend = backend_from_config(&config).unwrap();
        assert_eq!(backend.model(), "mock");
    }
}
