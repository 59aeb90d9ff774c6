//! Dynamic record types compiled from JSON Schema
//!
//! Templates store their schema as text. At runtime the schema is compiled
//! into a [`RecordType`], which validates model answers, renders the strict
//! JSON Schema sent as a structured-output constraint, and builds
//! placeholder instances for offline runs.

pub mod compiler;
pub mod record;

pub use compiler::{compile, compile_str};
pub use record::{FieldDef, FieldType, RecordType};

use thiserror::Error;

/// Schema compilation and validation errors
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Schema text is not JSON
    #[error("Schema is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Root must describe an object
    #[error("Schema root must be an object schema")]
    NotAnObject,

    /// Structural problem in the schema document
    #[error("Malformed schema at {path}: {message}")]
    Malformed { path: String, message: String },

    /// A value does not fit the compiled type
    #[error("Validation failed at {path}: {message}")]
    Validation { path: String, message: String },
}

pub type SchemaResult<T> = Result<T, SchemaError>;

impl SchemaError {
    pub(crate) fn malformed(path: &str, message: impl Into<String>) -> Self {
        SchemaError::Malformed {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid(path: &str, message: impl Into<String>) -> Self {
        SchemaError::Validation {
            path: path.to_string(),
            message: message.into(),
        }
    }
}
