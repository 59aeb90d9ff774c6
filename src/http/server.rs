//! HTTP server for the REST API and the browser page

use super::entities::entity_routes;
use super::handler::*;
use crate::drive::DriveClient;
use crate::graph::GraphStore;
use crate::model::{
    Case, CaseTemplate, Criterion, Evaluation, Narrative, Objective, Organization, OutcomeTemplate, Person,
    ProgramTemplate, Report, ReportTemplate, Role, Rule, SituationSchema, Skill,
};
use crate::rag::RagEngine;
use crate::sieve::Sieve;
use crate::workflow::Workflow;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state of every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<GraphStore>>,
    pub sieve: Arc<Sieve>,
    pub rag: Arc<RagEngine>,
    pub drive: Arc<RwLock<DriveClient>>,
    pub workflow: Arc<RwLock<Workflow>>,
}

impl AppState {
    pub fn new(store: Arc<RwLock<GraphStore>>, sieve: Sieve, rag: RagEngine, drive: DriveClient) -> Self {
        Self {
            store,
            sieve: Arc::new(sieve),
            rag: Arc::new(rag),
            drive: Arc::new(RwLock::new(drive)),
            workflow: Arc::new(RwLock::new(Workflow::new())),
        }
    }
}

/// The full application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api", get(root_handler))
        .route("/api/status", get(status_handler))
        .merge(entity_routes::<Person>())
        .merge(entity_routes::<Organization>())
        .merge(entity_routes::<Case>())
        .merge(entity_routes::<Report>())
        .merge(entity_routes::<Rule>())
        .merge(entity_routes::<SituationSchema>())
        .merge(entity_routes::<CaseTemplate>())
        .merge(entity_routes::<OutcomeTemplate>())
        .merge(entity_routes::<ReportTemplate>())
        .merge(entity_routes::<Objective>())
        .merge(entity_routes::<ProgramTemplate>())
        .merge(entity_routes::<Role>())
        .merge(entity_routes::<Narrative>())
        .merge(entity_routes::<Criterion>())
        .merge(entity_routes::<Evaluation>())
        .merge(entity_routes::<Skill>())
        .route("/api/case/:id/evaluate", post(evaluate_case_handler))
        .route("/api/sieve/evaluate", post(sieve_evaluate_handler))
        .route("/api/sieve/rank", post(sieve_rank_handler))
        .route("/api/sieve/schema/:kind/:id", get(sieve_schema_handler))
        .route("/api/rag/index", post(rag_index_handler))
        .route("/api/rag/query", post(rag_query_handler))
        .route("/api/drive/folder", post(drive_folder_handler))
        .route("/api/drive/document", post(drive_document_handler))
        .route("/api/drive/spreadsheet", post(drive_spreadsheet_handler))
        .route("/api/drive/files", get(drive_files_handler))
        .route("/api/workflow", get(workflow_handler))
        .route("/api/workflow/stage", post(workflow_stage_handler))
        .route("/api/export", get(export_handler))
        .route("/api/import", post(import_handler))
        .route("/api/clear", post(clear_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// HTTP server managing the API and static assets
pub struct HttpServer {
    state: AppState,
    address: String,
    port: u16,
}

impl HttpServer {
    pub fn new(state: AppState, address: impl Into<String>, port: u16) -> Self {
        Self {
            state,
            address: address.into(),
            port,
        }
    }

    /// Start the HTTP server
    pub async fn start(self) -> std::io::Result<()> {
        let addr = format!("{}:{}", self.address, self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!("ProcesSieve available at http://{}", addr);

        axum::serve(listener, router(self.state)).await
    }
}
