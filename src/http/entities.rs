//! CRUD routes shared by every entity

use super::error::{ApiError, ApiResult};
use super::server::AppState;
use crate::graph::{Filter, Record};
use crate::model::{as_record, clean, merge_patch, Entity, TemplateKind};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::Value;
use tracing::info;

/// `GET|POST /api/{path}` and `GET|PATCH|DELETE /api/{path}/:id`
pub fn entity_routes<E: Entity>() -> Router<AppState> {
    Router::new()
        .route(&format!("/api/{}", E::PATH), get(list::<E>).post(create::<E>))
        .route(
            &format!("/api/{}/:id", E::PATH),
            get(fetch::<E>).patch(update::<E>).delete(remove::<E>),
        )
}

fn not_found<E: Entity>(id: &str) -> ApiError {
    ApiError::not_found(format!("{} {} not found", E::CATEGORY, id))
}

/// Drop compiled schemas when a template changes
async fn template_changed<E: Entity>(state: &AppState, id: &str) {
    if let Ok(kind) = E::CATEGORY.parse::<TemplateKind>() {
        state.sieve.invalidate(id, kind).await;
    }
}

async fn list<E: Entity>(State(state): State<AppState>) -> Json<Vec<Record>> {
    let store = state.store.read().await;
    Json(store.find(&Filter::category(E::CATEGORY)).into_iter().map(clean).collect())
}

async fn fetch<E: Entity>(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Record>> {
    let store = state.store.read().await;
    store
        .find_one(E::CATEGORY, &id)
        .map(|record| Json(clean(record)))
        .ok_or_else(|| not_found::<E>(&id))
}

async fn create<E: Entity>(State(state): State<AppState>, Json(body): Json<Value>) -> ApiResult<Json<Record>> {
    let entity = E::from_record(as_record(body)?)?;
    let stored = {
        let mut store = state.store.write().await;
        let stored = store.insert(E::CATEGORY, entity.to_record()?)?;
        store.commit()?;
        stored
    };
    template_changed::<E>(&state, entity.id()).await;

    info!("Created {} {}", E::CATEGORY, entity.id());
    Ok(Json(stored))
}

async fn update<E: Entity>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Record>> {
    let patch = as_record(body)?;
    let stored = {
        let mut store = state.store.write().await;
        let current = store.find_one(E::CATEGORY, &id).ok_or_else(|| not_found::<E>(&id))?;
        let entity: E = merge_patch(&id, current, patch)?;
        let stored = store.update(E::CATEGORY, &id, entity.to_record()?)?;
        store.commit()?;
        stored
    };
    template_changed::<E>(&state, &id).await;

    Ok(Json(stored))
}

async fn remove<E: Entity>(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    {
        let mut store = state.store.write().await;
        store.delete(E::CATEGORY, &id)?;
        store.commit()?;
    }
    template_changed::<E>(&state, &id).await;

    info!("Deleted {} {}", E::CATEGORY, id);
    Ok(StatusCode::NO_CONTENT)
}
