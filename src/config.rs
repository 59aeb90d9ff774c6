//! Application configuration
//!
//! Loaded from a YAML file, then overridden by environment variables and
//! finally by command-line flags (applied in `main`).

use crate::llm::LlmProvider;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_FILE: &str = "processieve.yaml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    pub embed: EmbedConfig,
    pub drive: DriveConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub address: String,
    /// Port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory for persistence (None = in-memory only)
    pub data_path: Option<String>,
}

/// Chat-completion settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// The LLM provider to use
    pub provider: LlmProvider,
    /// Model name (e.g., "command-a-03-2025", "llama3")
    pub model: String,
    /// API Key
    pub api_key: Option<String>,
    /// API Base URL (defaults per provider)
    pub api_base_url: Option<String>,
    /// System prompt for structured evaluations
    pub system_prompt: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Cohere,
            model: "command-a-03-2025".to_string(),
            api_key: None,
            api_base_url: None,
            system_prompt: None,
            timeout_secs: 60,
            temperature: 0.0,
        }
    }
}

/// Embedding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// The embedding provider to use
    pub provider: LlmProvider,
    /// Model name (e.g., "embed-english-v3.0", "nomic-embed-text")
    pub model: String,
    /// API Key (falls back to the chat key)
    pub api_key: Option<String>,
    /// API Base URL (defaults per provider)
    pub api_base_url: Option<String>,
    /// Chunk size for text splitting, in characters
    pub chunk_size: usize,
    /// Overlap between chunks, in characters
    pub chunk_overlap: usize,
    /// Vector dimension; detected with a probe request when unset
    pub dimension: Option<usize>,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Cohere,
            model: "embed-english-v3.0".to_string(),
            api_key: None,
            api_base_url: None,
            chunk_size: 1024,
            chunk_overlap: 128,
            dimension: None,
        }
    }
}

/// Google Drive settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// OAuth bearer token for the Drive, Docs and Sheets APIs
    pub access_token: Option<String>,
    /// Address documents are shared with when a request names none
    pub share_email: Option<String>,
    pub api_base_url: String,
    pub docs_base_url: String,
    pub sheets_base_url: String,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            share_email: None,
            api_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            docs_base_url: "https://docs.googleapis.com/v1".to_string(),
            sheets_base_url: "https://sheets.googleapis.com/v4".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from a YAML file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> ConfigResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply the process environment
    pub fn apply_env(&mut self) -> ConfigResult<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a variable lookup
    pub fn apply_vars<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("PROCESSIEVE_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(provider) = lookup("PROCESSIEVE_LLM_PROVIDER") {
            let provider: LlmProvider = provider.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PROCESSIEVE_LLM_PROVIDER".to_string(),
                value: provider.clone(),
            })?;
            self.llm.provider = provider;
            self.embed.provider = provider;
        }
        if let Some(dir) = lookup("PROCESSIEVE_DATA_DIR") {
            self.storage.data_path = Some(dir);
        }
        if let Some(port) = lookup("PROCESSIEVE_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PROCESSIEVE_PORT".to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(token) = lookup("GOOGLE_ACCESS_TOKEN") {
            self.drive.access_token = Some(token);
        }
        Ok(())
    }

    /// Embedding key, falling back to the chat key
    pub fn embed_api_key(&self) -> Option<String> {
        self.embed.api_key.clone().or_else(|| self.llm.api_key.clone())
    }
}
