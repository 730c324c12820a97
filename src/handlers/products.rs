use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use serde_json::json;
use tracing::{info, warn};

use super::invalid_reference;
use crate::{
    error::{AppError, AppResult},
    extract::{AppJson, AppMultipart, AppPath},
    media::{sniff_image_type, PRODUCT_UPLOAD_DIR},
    models::{NewProduct, Product, ProductPayload, StockUpdate},
    AppState,
};

async fn ensure_category(state: &AppState, new: &NewProduct) -> AppResult<()> {
    state
        .repos
        .categories
        .get(new.category_id)
        .await
        .map(|_| ())
        .map_err(invalid_reference("category", new.category_id))
}

// ── List ──────────────────────────────────────────────────────────────────────

pub async fn list_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    let products = state
        .repos
        .products
        .list()
        .await?
        .into_iter()
        .map(|p| p.with_media_url(&state.media))
        .collect();
    Ok(Json(products))
}

// ── Create ────────────────────────────────────────────────────────────────────

pub async fn create_product(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ProductPayload>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let new = payload.validate()?;
    ensure_category(&state, &new).await?;

    let product = state.repos.products.create(&new).await?;

    info!(id = product.id, name = %product.name, "Created product");
    Ok((StatusCode::CREATED, Json(product.with_media_url(&state.media))))
}

// ── Get by ID ─────────────────────────────────────────────────────────────────

pub async fn get_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Product>> {
    let product = state.repos.products.get(id).await?;
    Ok(Json(product.with_media_url(&state.media)))
}

// ── Update ────────────────────────────────────────────────────────────────────

pub async fn update_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<ProductPayload>,
) -> AppResult<Json<Product>> {
    let existing = state.repos.products.get(id).await?;
    let new = payload.merge(&existing)?;
    if new.category_id != existing.category_id {
        ensure_category(&state, &new).await?;
    }

    let product = state.repos.products.update(id, &new).await?;

    info!(id, "Updated product");
    Ok(Json(product.with_media_url(&state.media)))
}

// ── Delete ────────────────────────────────────────────────────────────────────

pub async fn delete_product(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<StatusCode> {
    let product = state.repos.products.get(id).await?;
    state.repos.products.delete(id).await?;

    if let Some(image) = product.image {
        if let Err(err) = state.media.remove(&image).await {
            warn!(id, path = %image, error = %err, "Failed to remove product image");
        }
    }

    info!(id, "Deleted product");
    Ok(StatusCode::NO_CONTENT)
}

// ── Stock ─────────────────────────────────────────────────────────────────────

/// Adds `quantity` to the product's inventory, creating the item on first use.
/// The body is optional; without one the item is only created.
pub async fn update_stock(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    body: Bytes,
) -> AppResult<Json<serde_json::Value>> {
    state.repos.products.get(id).await?;
    let quantity = StockUpdate::from_body(&body)?.quantity()?;

    let item = state.repos.inventory.add_stock(id, quantity).await?;

    info!(
        product_id = id,
        added = quantity,
        quantity = item.quantity,
        "Updated stock"
    );
    Ok(Json(json!({ "status": "stock updated" })))
}

// ── Image ─────────────────────────────────────────────────────────────────────

pub async fn upload_image(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppMultipart(mut multipart): AppMultipart,
) -> AppResult<Json<Product>> {
    let existing = state.repos.products.get(id).await?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await?;
        upload = Some((file_name, bytes));
    }

    let (file_name, bytes) = upload
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| AppError::BadRequest("image: No file was submitted.".to_string()))?;
    if sniff_image_type(&bytes).is_none() {
        return Err(AppError::BadRequest(
            "image: Upload a valid image. The file you uploaded was either not an image or a corrupted image."
                .to_string(),
        ));
    }

    let path = state.media.save(PRODUCT_UPLOAD_DIR, &file_name, &bytes).await?;
    let product = match state.repos.products.set_image(id, Some(&path)).await {
        Ok(product) => product,
        Err(err) => {
            let _ = state.media.remove(&path).await;
            return Err(err);
        }
    };

    if let Some(old) = existing.image {
        if let Err(err) = state.media.remove(&old).await {
            warn!(id, path = %old, error = %err, "Failed to remove replaced product image");
        }
    }

    info!(id, path = %path, "Stored product image");
    Ok(Json(product.with_media_url(&state.media)))
}
