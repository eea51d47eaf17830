// models/src/validation.rs

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{ValidationError, ValidationResult};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\w+([.-]?\w+)*@\w+([.-]?\w+)*(\.\w{2,3})+$").expect("email pattern compiles")
});

pub const MIN_PASSWORD_LEN: usize = 6;

/// Schema check for an inbound payload. Runs before any authorization or
/// persistence step and yields the checked form the services consume.
pub trait Validate {
    type Valid;

    fn validate(self) -> ValidationResult<Self::Valid>;
}

/// Fails with every field whose flag is set.
pub(crate) fn require(checks: &[(&str, bool)]) -> ValidationResult<()> {
    let missing: Vec<&str> = checks
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(field, _)| *field)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::missing(missing))
    }
}

pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Rejects a present-but-blank text patch; absent is fine.
pub(crate) fn not_blank_if_present(field: &str, value: &Option<String>) -> ValidationResult<()> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ValidationError::invalid(field, "must not be blank")),
        _ => Ok(()),
    }
}

pub fn check_email(email: &str) -> ValidationResult<()> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(ValidationError::invalid("email", "not a valid email address"))
    }
}

pub fn check_password(password: &str) -> ValidationResult<()> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ValidationError::invalid(
            "password",
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        ))
    }
}
