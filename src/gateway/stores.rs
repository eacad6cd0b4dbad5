//! Store and item routes. Each handler runs authenticate → authorize → validate → mutate.

use super::pipeline::{json_body, require};
use super::AppState;
use crate::auth::Role;
use crate::error::ApiError;
use crate::inventory::validate;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::Value;

type ApiResult = Result<(StatusCode, Json<Value>), ApiError>;

/// Run a blocking inventory call off the async executor.
async fn blocking<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&crate::inventory::InventoryStore) -> Result<T, crate::inventory::InventoryError>
        + Send
        + 'static,
    T: Send + 'static,
{
    let inventory = state.inventory.clone();
    let joined = tokio::task::spawn_blocking(move || op(&inventory)).await;
    match joined {
        Ok(result) => Ok(result?),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(ApiError::Internal(anyhow::anyhow!("inventory task failed: {e}"))),
    }
}

/// GET /store — every store with its items (reader).
pub async fn handle_list_stores(State(state): State<AppState>, headers: HeaderMap) -> ApiResult {
    require(&state, &headers, Role::Reader)?;

    let stores = blocking(&state, |inv| inv.list_stores()).await?;
    Ok((StatusCode::OK, Json(serde_json::json!({ "stores": stores }))))
}

/// POST /store — create an empty store (writer).
pub async fn handle_create_store(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    let caller = require(&state, &headers, Role::Writer)?;
    let body = json_body(body)?;
    let name = validate::store_payload(&body).map_err(ApiError::Validation)?;

    let store = blocking(&state, move |inv| inv.create_store(&name)).await?;
    tracing::debug!(caller = %caller.username, store = %store.name, "Handled store create");
    Ok((StatusCode::CREATED, Json(serde_json::to_value(&store).map_err(anyhow::Error::from)?)))
}

/// POST /store/{name}/item — add an item to an existing store (writer).
pub async fn handle_create_item(
    State(state): State<AppState>,
    Path(store_name): Path<String>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    require(&state, &headers, Role::Writer)?;
    let body = json_body(body)?;
    let (item_name, ip) = validate::item_payload(&body).map_err(ApiError::Validation)?;

    let item = blocking(&state, move |inv| inv.create_item(&store_name, &item_name, &ip)).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::to_value(&item).map_err(anyhow::Error::from)?),
    ))
}

/// PUT|PATCH /store/{name} — rename, keeping identity and items (writer).
pub async fn handle_rename_store(
    State(state): State<AppState>,
    Path(store_name): Path<String>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult {
    require(&state, &headers, Role::Writer)?;
    let body = json_body(body)?;
    let new_name = validate::rename_payload(&body)
        .ok_or_else(|| ApiError::InvalidArgument("new name required".into()))?;

    let store = blocking(&state, move |inv| inv.rename_store(&store_name, &new_name)).await?;
    Ok((StatusCode::OK, Json(serde_json::to_value(&store).map_err(anyhow::Error::from)?)))
}

/// DELETE /store/{name} — remove a store and its items (admin).
pub async fn handle_delete_store(
    State(state): State<AppState>,
    Path(store_name): Path<String>,
    headers: HeaderMap,
) -> ApiResult {
    let caller = require(&state, &headers, Role::Admin)?;

    let name = store_name.clone();
    blocking(&state, move |inv| inv.delete_store(&name))
        .await
        .map_err(|e| match e {
            // DELETE keeps its capitalised 404 text; create-item and rename use "store not found".
            ApiError::NotFound(_) => ApiError::NotFound("Store not found".into()),
            other => other,
        })?;
    tracing::info!(caller = %caller.username, store = %store_name, "Store removed via API");
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "message": "Store deleted" })),
    ))
}
