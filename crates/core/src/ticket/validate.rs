//! Field bounds for ticket content.
//!
//! The service enforces these on every write; clients call the same
//! functions to flag problems before submitting.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 255;

/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LEN: usize = 5000;

/// Maximum email address length in characters.
pub const MAX_EMAIL_LEN: usize = 255;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be at most {max} characters (got {len})")]
    TooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
}

fn check_length(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::TooLong { field, max, len });
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    check_length("title", title, MAX_TITLE_LEN)
}

pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    check_length("description", description, MAX_DESCRIPTION_LEN)
}

pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    check_length("email", email, MAX_EMAIL_LEN)?;
    if !EMAIL_RE.is_match(email) {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

/// Truncate to at most `max` characters, on a char boundary.
pub fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
