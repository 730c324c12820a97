use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    extract::{AppMultipart, AppPath},
    generation::{AdvertRequest, UploadedImage},
    models::Advertisement,
    AppState,
};

// ── Generate ──────────────────────────────────────────────────────────────────

/// Multipart fields: `ad_description`, `img_description` and an optional
/// `image` file. Unknown fields are ignored.
pub async fn generate_advertisement(
    State(state): State<AppState>,
    AppMultipart(mut multipart): AppMultipart,
) -> AppResult<(StatusCode, Json<Advertisement>)> {
    let mut ad_description = None;
    let mut img_description = None;
    let mut image = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "ad_description" => ad_description = Some(field.text().await?),
            "img_description" => img_description = Some(field.text().await?),
            "image" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await?;
                if !bytes.is_empty() {
                    image = Some(UploadedImage {
                        file_name,
                        bytes: bytes.to_vec(),
                    });
                }
            }
            _ => {}
        }
    }

    let request = AdvertRequest::new(ad_description, img_description, image)?;
    let advertisement = state.generator.generate(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(advertisement.with_media_url(&state.media)),
    ))
}

// ── Read ──────────────────────────────────────────────────────────────────────

pub async fn list_advertisements(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Advertisement>>> {
    let ads = state
        .repos
        .advertisements
        .list()
        .await?
        .into_iter()
        .map(|ad| ad.with_media_url(&state.media))
        .collect();
    Ok(Json(ads))
}

pub async fn get_advertisement(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> AppResult<Json<Advertisement>> {
    let ad = state.repos.advertisements.get(id).await?;
    Ok(Json(ad.with_media_url(&state.media)))
}
