pub mod advertisements;
pub mod categories;
pub mod inventory;
pub mod products;

use axum::{http::StatusCode, Json};
use serde_json::json;

use crate::error::AppError;

pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok", "service": "listing-service" })))
}

/// Turns a lookup miss on a referenced record into a field error on the referencing one.
fn invalid_reference(field: &str, id: i64) -> impl FnOnce(AppError) -> AppError + '_ {
    move |err| match err {
        AppError::NotFound(_) => AppError::BadRequest(format!(
            "{}: Invalid pk \"{}\" - object does not exist.",
            field, id
        )),
        other => other,
    }
}
