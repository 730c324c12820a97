use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError};

use super::validation::{check, invalid, not_blank};
use crate::error::{AppError, AppResult};
use crate::media::MediaStorage;

/// Free-form key/value product attributes.
pub type Specifications = Map<String, Value>;

/// Largest price representable with 10 digits, 2 of them fractional.
const MAX_PRICE_EXCLUSIVE: i64 = 100_000_000;

/// Core product entity. `specifications` holds the persisted JSON text, read
/// through `get_specifications`. Writes go through `set_specifications`, or
/// `encode_specifications` when binding a column directly.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(rename = "category")]
    pub category_id: i64,
    pub description: String,
    pub price: Decimal,
    pub condition: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_specifications")]
    pub specifications: String,
    pub stock: i32,
    pub image: Option<String>,
}

impl Product {
    pub fn get_specifications(&self) -> serde_json::Result<Specifications> {
        serde_json::from_str(&self.specifications)
    }

    pub fn set_specifications(&mut self, specs: &Specifications) {
        self.specifications = encode_specifications(specs);
    }

    /// Swaps the stored image path for its public URL before the record leaves the service.
    pub fn with_media_url(mut self, media: &MediaStorage) -> Self {
        self.image = self.image.map(|path| media.url(&path));
        self
    }
}

pub fn encode_specifications(specs: &Specifications) -> String {
    Value::Object(specs.clone()).to_string()
}

/// Emits the specifications as a JSON object rather than a quoted string.
fn serialize_specifications<S: Serializer>(raw: &str, serializer: S) -> Result<S::Ok, S::Error> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => value.serialize(serializer),
        Err(_) => serializer.serialize_str(raw),
    }
}

// ── Request payloads ─────────────────────────────────────────────────────────

/// Specifications arrive either as an object or as JSON text encoding one.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SpecificationsInput {
    Object(Specifications),
    Text(String),
}

impl SpecificationsInput {
    fn parse(&self) -> Result<Specifications, &'static str> {
        match self {
            SpecificationsInput::Object(map) => Ok(map.clone()),
            SpecificationsInput::Text(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err("Expected a JSON object."),
                Err(_) => Err("Value must be valid JSON."),
            },
        }
    }
}

fn specifications_object(input: &SpecificationsInput) -> Result<(), ValidationError> {
    input
        .parse()
        .map(|_| ())
        .map_err(|message| invalid("specifications", message))
}

/// Validated column values for an insert or a full update.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub category_id: i64,
    pub description: String,
    pub price: Decimal,
    pub condition: String,
    pub specifications: Specifications,
    pub stock: i32,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ProductPayload {
    #[validate(
        required(message = "This field is required."),
        length(max = 200, message = "Ensure this field has no more than 200 characters."),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    #[validate(required(message = "This field is required."))]
    pub category: Option<i64>,
    #[validate(required(message = "This field is required."), custom(function = "not_blank"))]
    pub description: Option<String>,
    #[validate(required(message = "This field is required."), custom(function = "price_fits"))]
    pub price: Option<Decimal>,
    #[validate(
        required(message = "This field is required."),
        length(max = 50, message = "Ensure this field has no more than 50 characters."),
        custom(function = "not_blank")
    )]
    pub condition: Option<String>,
    #[validate(custom(function = "specifications_object"))]
    pub specifications: Option<SpecificationsInput>,
    pub stock: Option<i32>,
}

impl ProductPayload {
    pub fn validate(self) -> AppResult<NewProduct> {
        check(&self)?;

        let specifications = match &self.specifications {
            Some(input) => input
                .parse()
                .map_err(|err| AppError::BadRequest(format!("specifications: {}", err)))?,
            None => Specifications::new(),
        };

        Ok(NewProduct {
            name: self.name.unwrap_or_default(),
            category_id: self.category.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            price: self.price.map(stored_price).unwrap_or_default(),
            condition: self.condition.unwrap_or_default(),
            specifications,
            stock: self.stock.unwrap_or(0),
        })
    }

    pub fn merge(self, existing: &Product) -> AppResult<NewProduct> {
        ProductPayload {
            name: self.name.or_else(|| Some(existing.name.clone())),
            category: self.category.or(Some(existing.category_id)),
            description: self
                .description
                .or_else(|| Some(existing.description.clone())),
            price: self.price.or(Some(existing.price)),
            condition: self.condition.or_else(|| Some(existing.condition.clone())),
            specifications: self.specifications.or_else(|| {
                Some(match existing.get_specifications() {
                    Ok(map) => SpecificationsInput::Object(map),
                    Err(_) => SpecificationsInput::Text(existing.specifications.clone()),
                })
            }),
            stock: self.stock.or(Some(existing.stock)),
        }
        .validate()
    }
}

fn price_fits(price: &Decimal) -> Result<(), ValidationError> {
    let normalized = price.normalize();
    if normalized.is_sign_negative() && !normalized.is_zero() {
        return Err(invalid("min_value", "Ensure this value is greater than or equal to 0."));
    }
    if normalized.scale() > 2 {
        return Err(invalid("max_decimal_places", "Ensure that there are no more than 2 decimal places."));
    }
    if normalized.trunc().abs() >= Decimal::from(MAX_PRICE_EXCLUSIVE) {
        return Err(invalid("max_digits", "Ensure that there are no more than 10 digits in total."));
    }
    Ok(())
}

fn stored_price(price: Decimal) -> Decimal {
    let mut stored = price.normalize();
    stored.rescale(2);
    stored
}
