//! Mapping of domain errors to HTTP responses

use crate::drive::DriveError;
use crate::graph::GraphError;
use crate::model::ModelError;
use crate::rag::RagError;
use crate::sieve::SieveError;
use crate::workflow::WorkflowError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{}: {}", self.status, self.message);
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<GraphError> for ApiError {
    fn from(e: GraphError) -> Self {
        let status = match &e {
            GraphError::NotFound { .. } => StatusCode::NOT_FOUND,
            GraphError::ConstraintViolation { .. } => StatusCode::CONFLICT,
            GraphError::MissingId(_) => StatusCode::BAD_REQUEST,
            GraphError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        Self::bad_request(e.to_string())
    }
}

impl From<SieveError> for ApiError {
    fn from(e: SieveError) -> Self {
        match e {
            SieveError::TemplateNotFound { .. } => Self::not_found(e.to_string()),
            SieveError::MissingSchema { .. } | SieveError::InvalidSchema { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            SieveError::InvalidAnswer(_) | SieveError::Llm(_) => Self::bad_gateway(e.to_string()),
            SieveError::Graph(e) => e.into(),
            SieveError::Model(e) => e.into(),
        }
    }
}

impl From<RagError> for ApiError {
    fn from(e: RagError) -> Self {
        match e {
            RagError::Embed(_) | RagError::Llm(_) => Self::bad_gateway(e.to_string()),
            RagError::EmptyIndex => Self::not_found(e.to_string()),
            RagError::InvalidTopK { .. } => Self::bad_request(e.to_string()),
            RagError::DimensionMismatch { .. } => Self::internal(e.to_string()),
        }
    }
}

impl From<DriveError> for ApiError {
    fn from(e: DriveError) -> Self {
        match e {
            DriveError::InvalidFolderUrl(_) => Self::bad_request(e.to_string()),
            DriveError::FolderNotSet => Self::new(StatusCode::CONFLICT, e.to_string()),
            DriveError::MissingToken => Self::new(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
            DriveError::Api { .. } | DriveError::Network(_) | DriveError::Serialization(_) => {
                Self::bad_gateway(e.to_string())
            }
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        Self::bad_request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TemplateKind;

    #[test]
    fn test_status_mapping() {
        let not_found: ApiError = GraphError::NotFound {
            category: "Case".into(),
            id: "c1".into(),
        }
        .into();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let conflict: ApiError = GraphError::ConstraintViolation {
            category: "Case".into(),
            id: "c1".into(),
        }
        .into();
        assert_eq!(conflict.status, StatusCode::CONFLICT);

        let id_changed: ApiError = ModelError::IdChanged.into();
        assert_eq!(id_changed.status, StatusCode::BAD_REQUEST);
        assert_eq!(id_changed.message, "Do not change the Id");

        let missing: ApiError = SieveError::MissingSchema {
            kind: TemplateKind::CaseTemplate,
            id: "t1".into(),
        }
        .into();
        assert_eq!(missing.status, StatusCode::UNPROCESSABLE_ENTITY);

        let nested: ApiError = SieveError::Graph(GraphError::MissingId("Case".into())).into();
        assert_eq!(nested.status, StatusCode::BAD_REQUEST);

        let upstream: ApiError = SieveError::InvalidAnswer("t1".into()).into();
        assert_eq!(upstream.status, StatusCode::BAD_GATEWAY);
    }
}
