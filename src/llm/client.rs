//! HTTP chat-completion client

use super::{CompletionBackend, CompletionRequest, LlmError, LlmProvider, LlmResult, ResponseSchema};
use crate::config::LlmConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a careful analyst of organizational processes.";

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

pub struct ChatClient {
    client: Client,
    config: LlmConfig,
    api_base_url: String,
}

impl ChatClient {
    pub fn new(config: &LlmConfig) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConfigError(e.to_string()))?;

        let api_base_url = config
            .api_base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string());

        Ok(Self {
            client,
            config: config.clone(),
            api_base_url,
        })
    }

    fn messages<'a>(&'a self, request: &'a CompletionRequest) -> Vec<Message<'a>> {
        let system = request
            .system
            .as_deref()
            .or(self.config.system_prompt.as_deref())
            .unwrap_or(DEFAULT_SYSTEM_PROMPT);
        vec![
            Message { role: "system", content: system },
            Message { role: "user", content: &request.prompt },
        ]
    }

    /// OpenAI and Cohere share the `/chat/completions` contract
    async fn openai_chat(&self, request: &CompletionRequest) -> LlmResult<String> {
        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            messages: Vec<Message<'a>>,
            temperature: f32,
            #[serde(skip_serializing_if = "Option::is_none")]
            response_format: Option<Value>,
        }

        #[derive(Deserialize)]
        struct Response {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MessageContent,
        }

        #[derive(Deserialize)]
        struct MessageContent {
            content: Option<String>,
        }

        let api_key = self.config.api_key.as_ref().ok_or_else(|| {
            LlmError::ConfigError(format!("{} requires an API key", self.config.provider))
        })?;

        let response_format = request.response_schema.as_ref().map(response_format);

        let url = format!("{}/chat/completions", self.api_base_url);
        debug!("POST {} (model {})", url, self.config.model);
        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&Request {
                model: &self.config.model,
                messages: self.messages(request),
                temperature: self.config.temperature,
                response_format,
            })
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::ApiError(format!(
                "{} error {}: {}",
                self.config.provider, status, text
            )));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| LlmError::SerializationError(e.to_string()))?;
        Ok(result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn ollama_chat(&self, request: &CompletionRequest) -> LlmResult<String> {
        #[derive(Serialize)]
        struct Options {
            temperature: f32,
        }

        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            messages: Vec<Message<'a>>,
            stream: bool,
            #[serde(skip_serializing_if = "Option::is_none")]
            format: Option<&'a Value>,
            options: Options,
        }

        #[derive(Deserialize)]
        struct Response {
            message: MessageContent,
        }

        #[derive(Deserialize)]
        struct MessageContent {
            content: String,
        }

        let url = format!("{}/api/chat", self.api_base_url);
        debug!("POST {} (model {})", url, self.config.model);
        let resp = self
            .client
            .post(&url)
            .json(&Request {
                model: &self.config.model,
                messages: self.messages(request),
                stream: false,
                format: request.response_schema.as_ref().map(|rs| &rs.schema),
                options: Options {
                    temperature: self.config.temperature,
                },
            })
            .send()
            .await
            .map_err(|e| LlmError::NetworkError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(LlmError::ApiError(format!("Ollama error: {}", resp.status())));
        }

        let result: Response = resp
            .json()
            .await
            .map_err(|e| LlmError::SerializationError(e.to_string()))?;
        Ok(result.message.content)
    }
}

/// OpenAI-style `response_format` for a named schema
fn response_format(rs: &ResponseSchema) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {"name": rs.name, "strict": rs.strict, "schema": rs.schema}
    })
}

#[async_trait]
impl CompletionBackend for ChatClient {
    async fn complete(&self, request: &CompletionRequest) -> LlmResult<String> {
        match self.config.provider {
            LlmProvider::OpenAI | LlmProvider::Cohere => self.openai_chat(request).await,
            LlmProvider::Ollama => self.ollama_chat(request).await,
            LlmProvider::Mock => Err(LlmError::ConfigError(
                "Mock provider has no HTTP client".to_string(),
            )),
        }
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
