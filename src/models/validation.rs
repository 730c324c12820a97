use std::borrow::Cow;

use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{AppError, AppResult};

/// Runs the derived checks and reports every failing field in a single 400.
pub fn check(payload: &impl Validate) -> AppResult<()> {
    payload
        .validate()
        .map_err(|errors| AppError::BadRequest(describe(&errors)))
}

fn describe(errors: &ValidationErrors) -> String {
    let mut messages: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, field_errors)| {
            field_errors.iter().map(move |error| {
                let message = error.message.as_deref().unwrap_or(error.code.as_ref());
                format!("{}: {}", field, message)
            })
        })
        .collect();
    messages.sort();
    messages.join("; ")
}

pub fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Required text must carry something other than whitespace.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(invalid("blank", "This field may not be blank."));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Shelf {
        #[validate(
            required(message = "This field is required."),
            length(max = 3, message = "Ensure this field has no more than 3 characters."),
            custom(function = "not_blank")
        )]
        label: Option<String>,
        #[validate(required(message = "This field is required."))]
        aisle: Option<i64>,
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let shelf = Shelf {
            label: None,
            aisle: None,
        };
        let msg = check(&shelf).unwrap_err().to_string();
        assert_eq!(
            msg,
            "aisle: This field is required.; label: This field is required."
        );
    }

    #[test]
    fn length_is_counted_in_chars() {
        let shelf = |label: &str| Shelf {
            label: Some(label.to_string()),
            aisle: Some(1),
        };
        assert!(check(&shelf("ñññ")).is_ok());
        let msg = check(&shelf("ññññ")).unwrap_err().to_string();
        assert!(msg.contains("no more than 3 characters"), "{}", msg);
    }

    #[test]
    fn whitespace_is_blank() {
        assert!(not_blank("   ").is_err());
        assert!(not_blank(" a ").is_ok());
        let shelf = Shelf {
            label: Some("  ".to_string()),
            aisle: Some(1),
        };
        let msg = check(&shelf).unwrap_err().to_string();
        assert_eq!(msg, "label: This field may not be blank.");
    }
}
