use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validation::{check, not_blank};
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// Validated column values for an insert or a full update.
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
}

/// Body of create / update requests. Every field is optional on the wire so
/// that partial updates and "field is required" messages share one type.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CategoryPayload {
    #[validate(
        required(message = "This field is required."),
        length(max = 100, message = "Ensure this field has no more than 100 characters."),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
    pub description: Option<String>,
}

impl CategoryPayload {
    pub fn validate(self) -> AppResult<NewCategory> {
        check(&self)?;
        Ok(NewCategory {
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
        })
    }

    /// Fills absent fields from `existing`, then validates the result.
    pub fn merge(self, existing: &Category) -> AppResult<NewCategory> {
        CategoryPayload {
            name: self.name.or_else(|| Some(existing.name.clone())),
            description: self
                .description
                .or_else(|| Some(existing.description.clone())),
        }
        .validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_is_optional() {
        let new = CategoryPayload {
            name: Some("Vehicles".into()),
            description: None,
        }
        .validate()
        .unwrap();
        assert_eq!(new.description, "");
    }

    #[test]
    fn name_is_required_and_bounded() {
        let msg = CategoryPayload::default().validate().unwrap_err().to_string();
        assert_eq!(msg, "name: This field is required.");

        let msg = CategoryPayload {
            name: Some("x".repeat(101)),
            description: None,
        }
        .validate()
        .unwrap_err()
        .to_string();
        assert!(msg.starts_with("name: Ensure this field has no more than 100"), "{}", msg);
    }

    #[test]
    fn merge_keeps_untouched_fields() {
        let existing = Category {
            id: 1,
            name: "Furniture".into(),
            description: "Chairs and tables".into(),
        };
        let merged = CategoryPayload {
            name: Some("Home".into()),
            description: None,
        }
        .merge(&existing)
        .unwrap();
        assert_eq!(merged.name, "Home");
        assert_eq!(merged.description, "Chairs and tables");
    }
}
