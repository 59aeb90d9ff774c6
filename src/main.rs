use anyhow::Context;
use clap::Parser;
use processieve::config::{AppConfig, DEFAULT_CONFIG_FILE};
use processieve::drive::DriveClient;
use processieve::embed::EmbedPipeline;
use processieve::graph::GraphStore;
use processieve::llm::{backend_from_config, LlmProvider};
use processieve::model::CATEGORIES;
use processieve::rag::RagEngine;
use processieve::sieve::Sieve;
use processieve::{AppState, HttpServer};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// ProcesSieve server
#[derive(Parser, Debug)]
#[command(name = "processieve", version, about)]
struct Args {
    /// YAML configuration file
    #[arg(long, short, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Bind address
    #[arg(long)]
    address: Option<String>,

    /// Listen port
    #[arg(long, short)]
    port: Option<u16>,

    /// Data directory (in-memory when unset)
    #[arg(long)]
    data_dir: Option<String>,

    /// Chat and embedding provider (openai, cohere, ollama, mock)
    #[arg(long)]
    provider: Option<LlmProvider>,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(address) = &self.address {
            config.server.address = address.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = &self.data_dir {
            config.storage.data_path = Some(dir.clone());
        }
        if let Some(provider) = self.provider {
            config.llm.provider = provider;
            config.embed.provider = provider;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("ProcesSieve v{}", processieve::version());

    let mut config = AppConfig::load(&args.config)?;
    config.apply_env()?;
    args.apply(&mut config);

    let mut store = match &config.storage.data_path {
        Some(path) => GraphStore::open(path).with_context(|| format!("opening data directory {}", path))?,
        None => {
            info!("No data directory configured, records are kept in memory");
            GraphStore::new()
        }
    };
    store.create_id_constraints(CATEGORIES.iter().copied())?;
    info!("Loaded {} records", store.node_count());
    let store = Arc::new(RwLock::new(store));

    let backend = backend_from_config(&config.llm)?;
    info!("Using {} model {}", config.llm.provider, backend.model());

    let mut sieve = Sieve::new(Arc::clone(&store), Arc::clone(&backend));
    if let Some(prompt) = &config.llm.system_prompt {
        sieve = sieve.with_system_prompt(prompt.clone());
    }

    let pipeline = EmbedPipeline::new(&config.embed, config.embed_api_key())?;
    let rag = RagEngine::new(pipeline, backend, config.embed.dimension);
    let drive = DriveClient::new(config.drive.clone())?;

    let state = AppState::new(store, sieve, rag, drive);
    HttpServer::new(state, config.server.address.clone(), config.server.port)
        .start()
        .await?;

    Ok(())
}
