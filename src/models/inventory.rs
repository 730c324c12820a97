use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::Validate;

use super::validation::check;
use crate::error::{AppError, AppResult};

/// Stock record for a product, joined with the product name for responses.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: i64,
    #[serde(rename = "product")]
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub location: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInventoryItem {
    pub product_id: i64,
    pub quantity: i32,
    pub location: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct InventoryItemPayload {
    #[validate(required(message = "This field is required."))]
    pub product: Option<i64>,
    pub quantity: Option<i32>,
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub location: Option<String>,
}

impl InventoryItemPayload {
    pub fn validate(self) -> AppResult<NewInventoryItem> {
        check(&self)?;

        Ok(NewInventoryItem {
            product_id: self.product.unwrap_or_default(),
            quantity: self.quantity.unwrap_or(0),
            location: self.location.unwrap_or_default(),
        })
    }

    pub fn merge(self, existing: &InventoryItem) -> AppResult<NewInventoryItem> {
        InventoryItemPayload {
            product: self.product.or(Some(existing.product_id)),
            quantity: self.quantity.or(Some(existing.quantity)),
            location: self.location.or_else(|| Some(existing.location.clone())),
        }
        .validate()
    }
}

// ── Custom actions ───────────────────────────────────────────────────────────

/// Body of `POST /products/:id/update_stock`. The quantity may be sent as a
/// number or as a numeric string; a missing quantity means 0, an explicit
/// `null` is rejected.
#[derive(Debug, Default, Deserialize)]
pub struct StockUpdate {
    #[serde(default, deserialize_with = "present")]
    pub quantity: Option<Value>,
}

/// Keeps an explicit `null` as `Some(Value::Null)` instead of folding it into `None`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl StockUpdate {
    /// Parses a JSON body; an empty one is the same as `{}`.
    pub fn from_body(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|err| {
            AppError::BadRequest(format!("Failed to parse the request body as JSON: {}", err))
        })
    }

    pub fn quantity(&self) -> AppResult<i32> {
        match &self.quantity {
            None => Ok(0),
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(|| invalid_quantity(n)),
            Some(Value::String(s)) => s.trim().parse::<i32>().map_err(|_| invalid_quantity(s)),
            Some(other) => Err(invalid_quantity(other)),
        }
    }
}

fn invalid_quantity(raw: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!(
        "invalid literal for quantity: '{}' is not an integer",
        raw
    ))
}

#[derive(Debug, Deserialize)]
pub struct LowStockParams {
    pub threshold: Option<i32>,
}

impl LowStockParams {
    pub const DEFAULT_THRESHOLD: i32 = 10;

    pub fn threshold(&self) -> i32 {
        self.threshold.unwrap_or(Self::DEFAULT_THRESHOLD)
    }
}
