//! HTTP handlers for the sieve, retrieval, Drive and workflow APIs

use super::error::{ApiError, ApiResult};
use super::server::AppState;
use crate::graph::{Filter, Record};
use crate::model::{as_record, split_category, tag, validate, Case, ModelError, TemplateKind, CATEGORIES};
use crate::rag::{check_top_k, RagAnswer};
use crate::sieve::Evaluated;
use crate::workflow::WorkflowView;
use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse},
    Json,
};
use rust_embed::RustEmbed;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(RustEmbed)]
#[folder = "src/http/static/"]
struct Assets;

/// Serve the single-page UI
pub async fn index_handler() -> ApiResult<impl IntoResponse> {
    let page = Assets::get("index.html").ok_or_else(|| ApiError::not_found("index.html is not bundled"))?;
    let html = String::from_utf8_lossy(page.data.as_ref()).into_owned();
    Ok(Html(html))
}

pub async fn root_handler() -> Json<Value> {
    Json(json!({ "Hello": "World" }))
}

/// Handler for system status
pub async fn status_handler(State(state): State<AppState>) -> Json<Value> {
    let store = state.store.read().await;
    Json(json!({
        "status": "healthy",
        "version": crate::VERSION,
        "model": state.sieve.backend().model(),
        "storage": {
            "persistent": store.is_persistent(),
            "records": store.node_count(),
            "categories": store.category_counts(),
        },
        "sieve": {
            "cached_templates": state.sieve.cached_templates().await,
        },
        "rag": {
            "chunks": state.rag.chunk_count().await,
        }
    }))
}

pub async fn evaluate_case_handler(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Case>> {
    let case = state.sieve.evaluate_case(&id).await?;
    Ok(Json(case))
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub text: String,
    pub schema_id: String,
    #[serde(default)]
    pub kind: TemplateKind,
}

pub async fn sieve_evaluate_handler(
    State(state): State<AppState>,
    Json(payload): Json<EvaluateRequest>,
) -> ApiResult<Json<Evaluated>> {
    let evaluated = state
        .sieve
        .evaluate_one(&payload.text, &payload.schema_id, payload.kind)
        .await?;
    Ok(Json(evaluated))
}

#[derive(Debug, Deserialize)]
pub struct RankRequest {
    pub text: String,
    #[serde(default)]
    pub kind: TemplateKind,
    #[serde(default)]
    pub include_draft: bool,
}

pub async fn sieve_rank_handler(
    State(state): State<AppState>,
    Json(payload): Json<RankRequest>,
) -> ApiResult<Json<Vec<Evaluated>>> {
    let ranked = state
        .sieve
        .evaluate_many(&payload.text, payload.kind, payload.include_draft)
        .await?;
    Ok(Json(ranked))
}

/// The compiled record type of a template, as a strict JSON Schema
pub async fn sieve_schema_handler(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    let kind: TemplateKind = kind.parse().map_err(|e: String| ApiError::bad_request(e))?;
    let record_type = state.sieve.get_schema(&id, kind).await?;
    Ok(Json(json!({
        "name": record_type.name,
        "description": record_type.description,
        "schema": record_type.to_json_schema(),
    })))
}

pub async fn rag_index_handler(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let chunks = state.rag.index_narratives(&state.store).await?;
    Ok(Json(json!({ "chunks": chunks })))
}

fn default_k() -> usize {
    4
}

#[derive(Debug, Deserialize)]
pub struct RagQueryRequest {
    pub question: String,
    #[serde(default = "default_k")]
    pub k: usize,
}

/// Answer a question; builds the index first when it is empty
pub async fn rag_query_handler(
    State(state): State<AppState>,
    Json(payload): Json<RagQueryRequest>,
) -> ApiResult<Json<RagAnswer>> {
    check_top_k(payload.k)?;
    if state.rag.chunk_count().await == 0 {
        state.rag.index_narratives(&state.store).await?;
    }
    let answer = state.rag.answer(&payload.question, payload.k).await?;
    Ok(Json(answer))
}

#[derive(Debug, Deserialize)]
pub struct FolderRequest {
    pub url: String,
}

pub async fn drive_folder_handler(
    State(state): State<AppState>,
    Json(payload): Json<FolderRequest>,
) -> ApiResult<Json<Value>> {
    let mut drive = state.drive.write().await;
    let folder = drive.set_folder(&payload.url).await?.clone();
    let files = drive.check_folder_access().await?;
    Ok(Json(json!({ "folder": folder, "files": files })))
}

#[derive(Debug, Deserialize)]
pub struct DocumentRequest {
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub share_email: Option<String>,
}

pub async fn drive_document_handler(
    State(state): State<AppState>,
    Json(payload): Json<DocumentRequest>,
) -> ApiResult<Json<Value>> {
    let drive = state.drive.read().await;
    let share_email = payload.share_email.as_deref().or(drive.share_email());
    let url = drive.create_document(&payload.title, &payload.text, share_email).await?;
    Ok(Json(json!({ "url": url })))
}

#[derive(Debug, Deserialize)]
pub struct SpreadsheetRequest {
    pub title: String,
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
    #[serde(default)]
    pub share_email: Option<String>,
}

pub async fn drive_spreadsheet_handler(
    State(state): State<AppState>,
    Json(payload): Json<SpreadsheetRequest>,
) -> ApiResult<Json<Value>> {
    let drive = state.drive.read().await;
    let share_email = payload.share_email.as_deref().or(drive.share_email());
    let url = drive.create_spreadsheet(&payload.title, &payload.rows, share_email).await?;
    Ok(Json(json!({ "url": url })))
}

pub async fn drive_files_handler(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let drive = state.drive.read().await;
    let files = drive.check_folder_access().await?;
    Ok(Json(json!({ "folder": drive.folder(), "files": files })))
}

pub async fn workflow_handler(State(state): State<AppState>) -> Json<WorkflowView> {
    Json(state.workflow.read().await.view())
}

#[derive(Debug, Deserialize)]
pub struct StageRequest {
    pub index: i64,
}

pub async fn workflow_stage_handler(
    State(state): State<AppState>,
    Json(payload): Json<StageRequest>,
) -> ApiResult<Json<WorkflowView>> {
    let mut workflow = state.workflow.write().await;
    let stage = workflow.set_stage(payload.index)?;
    info!("Moved to stage: {}", stage);
    Ok(Json(workflow.view()))
}

/// Every record, tagged with its category
pub async fn export_handler(State(state): State<AppState>) -> Json<Vec<Record>> {
    let store = state.store.read().await;
    Json(
        CATEGORIES
            .iter()
            .flat_map(|category| {
                store
                    .find(&Filter::category(*category))
                    .into_iter()
                    .map(move |record| tag(category, record))
            })
            .collect(),
    )
}

/// Upsert a list of tagged records; all are validated before any is written
pub async fn import_handler(State(state): State<AppState>, Json(body): Json<Vec<Value>>) -> ApiResult<Json<Value>> {
    let records = body
        .into_iter()
        .map(|value| {
            let (category, fields) = split_category(as_record(value)?)
                .ok_or_else(|| ModelError::UnknownCategory("<missing>".to_string()))?;
            let fields = validate(&category, fields)?;
            Ok((category, fields))
        })
        .collect::<Result<Vec<_>, ModelError>>()?;

    let imported = records.len();
    {
        let mut store = state.store.write().await;
        for (category, fields) in records {
            store.store(&category, fields)?;
        }
        store.commit()?;
    }
    state.sieve.invalidate_all().await;

    info!("Imported {} records", imported);
    Ok(Json(json!({ "imported": imported })))
}

/// Remove every record
pub async fn clear_handler(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let removed = {
        let mut store = state.store.write().await;
        let removed = store.node_count();
        store.clear()?;
        removed
    };
    state.sieve.invalidate_all().await;

    info!("Cleared {} records", removed);
    Ok(Json(json!({ "removed": removed })))
}
