//! ProcesSieve
//!
//! A graph-backed store for cases, narratives and the templates used to
//! classify them, served over a REST API.
//!
//! # Architecture
//!
//! - [`graph`]: category-tagged records held in memory, staged writes
//!   committed to RocksDB ([`persistence`]), id uniqueness per category
//!   ([`index`])
//! - [`model`]: typed entities validated from JSON records
//! - [`schema`]: compiles JSON Schema documents stored on templates into
//!   runtime record types
//! - [`sieve`]: asks a chat model to fill those record types from free
//!   text and ranks templates by the model's confidence
//! - [`rag`]: retrieval over narratives with an HNSW index
//! - [`drive`]: Google Docs and Sheets in a shared folder
//! - [`http`]: axum router under `/api` plus the browser page
//!
//! ## Example Usage
//!
//! ```rust
//! use processieve::graph::{Filter, GraphStore};
//! use processieve::model::{dump, Entity, Person};
//!
//! let mut store = GraphStore::new();
//! let person = Person {
//!     id: "maparent".to_string(),
//!     name: "Marc-Antoine Parent".to_string(),
//!     email: "maparent@example.com".to_string(),
//! };
//! let tagged = dump(&person).unwrap();
//! assert_eq!(tagged["category"], "Person");
//!
//! store.insert(Person::CATEGORY, person.to_record().unwrap()).unwrap();
//! store.commit().unwrap();
//! assert_eq!(store.find(&Filter::category("Person")).len(), 1);
//! ```

pub mod config;
pub mod drive;
pub mod embed;
pub mod graph;
pub mod http;
pub mod index;
pub mod llm;
pub mod model;
pub mod persistence;
pub mod rag;
pub mod schema;
pub mod sieve;
pub mod workflow;

pub use config::{AppConfig, ConfigError};
pub use graph::{Filter, GraphError, GraphStore, Record};
pub use http::{router, AppState, HttpServer};
pub use llm::{CompletionBackend, CompletionRequest, LlmError, LlmProvider};
pub use model::{Entity, TemplateKind};
pub use rag::{RagEngine, RagError};
pub use sieve::{Evaluated, Sieve, SieveError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.1.0");
    }
}
