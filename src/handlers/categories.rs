use axum::{extract::State, http::StatusCode, Json};
use tracing::info;

use crate::{
    error::AppResult,
    extract::{AppJson, AppPath},
    models::{Category, CategoryPayload},
    AppState,
};

// ── List ──────────────────────────────────────────────────────────────────────

pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    let categories = state.repos.categories.list().await?;
    Ok(Json(categories))
}

// ── Create ────────────────────────────────────────────────────────────────────

pub async fn create_category(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CategoryPayload>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let new = payload.validate()?;
    let category = state.repos.categories.create(&new).await?;

    info!(id = category.id, name = %category.name, "Created category");
    Ok((StatusCode::CREATED, Json(category)))
}

// ── Get by ID ─────────────────────────────────────────────────────────────────

pub async fn get_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Category>> {
    Ok(Json(state.repos.categories.get(id).await?))
}

// ── Update ────────────────────────────────────────────────────────────────────

pub async fn update_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<CategoryPayload>,
) -> AppResult<Json<Category>> {
    let existing = state.repos.categories.get(id).await?;
    let category = state
        .repos
        .categories
        .update(id, &payload.merge(&existing)?)
        .await?;

    info!(id, "Updated category");
    Ok(Json(category))
}

// ── Delete ────────────────────────────────────────────────────────────────────

pub async fn delete_category(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<StatusCode> {
    state.repos.categories.delete(id).await?;

    info!(id, "Deleted category and its products");
    Ok(StatusCode::NO_CONTENT)
}
