//! # Validation Utilities
//!
//! Input validation helpers.

/// Validate that two values differ.
pub fn validate_distinct(a: &str, b: &str, field_a: &str, field_b: &str) -> Result<(), String> {
    if a == b {
        Err(format!("{} and {} must be different", field_a, field_b))
    } else {
        Ok(())
    }
}

/// Validate an opaque identifier that will travel in a URL path segment.
///
/// Rejects `.`/`..`, path and query delimiters, whitespace and control characters.
pub fn validate_identifier(value: &str, field: &str) -> Result<(), String> {
    if value == "." || value == ".." {
        return Err(format!("{} is not a valid identifier", field));
    }
    if value
        .chars()
        .any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control())
    {
        return Err(format!("{} contains invalid characters", field));
    }
    Ok(())
}
