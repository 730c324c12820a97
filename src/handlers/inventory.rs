use axum::{extract::State, http::StatusCode, Json};
use tracing::{debug, info};

use super::invalid_reference;
use crate::{
    error::AppResult,
    extract::{AppJson, AppPath, AppQuery},
    models::{InventoryItem, InventoryItemPayload, LowStockParams, NewInventoryItem},
    AppState,
};

async fn ensure_product(state: &AppState, new: &NewInventoryItem) -> AppResult<()> {
    state
        .repos
        .products
        .get(new.product_id)
        .await
        .map(|_| ())
        .map_err(invalid_reference("product", new.product_id))
}

// ── List ──────────────────────────────────────────────────────────────────────

pub async fn list_items(State(state): State<AppState>) -> AppResult<Json<Vec<InventoryItem>>> {
    Ok(Json(state.repos.inventory.list().await?))
}

// ── Create ────────────────────────────────────────────────────────────────────

pub async fn create_item(
    State(state): State<AppState>,
    AppJson(payload): AppJson<InventoryItemPayload>,
) -> AppResult<(StatusCode, Json<InventoryItem>)> {
    let new = payload.validate()?;
    ensure_product(&state, &new).await?;

    let item = state.repos.inventory.create(&new).await?;

    info!(id = item.id, product_id = item.product_id, quantity = item.quantity, "Created inventory item");
    Ok((StatusCode::CREATED, Json(item)))
}

// ── Get by ID ─────────────────────────────────────────────────────────────────

pub async fn get_item(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<InventoryItem>> {
    Ok(Json(state.repos.inventory.get(id).await?))
}

// ── Update ────────────────────────────────────────────────────────────────────

pub async fn update_item(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<InventoryItemPayload>,
) -> AppResult<Json<InventoryItem>> {
    let existing = state.repos.inventory.get(id).await?;
    let new = payload.merge(&existing)?;
    if new.product_id != existing.product_id {
        ensure_product(&state, &new).await?;
    }

    let item = state.repos.inventory.update(id, &new).await?;

    info!(id, quantity = item.quantity, "Updated inventory item");
    Ok(Json(item))
}

// ── Delete ────────────────────────────────────────────────────────────────────

pub async fn delete_item(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<StatusCode> {
    state.repos.inventory.delete(id).await?;

    info!(id, "Deleted inventory item");
    Ok(StatusCode::NO_CONTENT)
}

// ── Low stock ─────────────────────────────────────────────────────────────────

pub async fn low_stock(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<LowStockParams>,
) -> AppResult<Json<Vec<InventoryItem>>> {
    let threshold = params.threshold();
    let items = state.repos.inventory.low_stock(threshold).await?;

    debug!(threshold, count = items.len(), "Low stock query");
    Ok(Json(items))
}
