use std::borrow::Cow;
use validator::{ValidationError, ValidationErrors};

pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    match value.trim().is_empty() {
        false => Ok(()),
        true => Err(ValidationError::new("BLANK").with_message(Cow::from("Must not be blank"))),
    }
}

/// First human readable message out of a set of field errors.
pub fn first_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errors| errors.iter())
        .find_map(|error| error.message.as_ref().map(|message| message.to_string()))
        .unwrap_or_else(|| String::from("Invalid input"))
}
