use crate::error::{Error, Result};

/// Trims whitespace and rejects empty strings.
///
/// # Errors
///
/// Returns `Error::InvalidUrl` if nothing is left after trimming.
pub fn validate_non_empty(input: &str) -> Result<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_url("input cannot be empty"));
    }
    Ok(trimmed)
}
