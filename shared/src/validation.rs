//! Field-level validation utilities for the stock ledger
//!
//! The quantity rules live in [`crate::ledger`]; this module only checks
//! identifier formats and free-text fields.

/// Parse a location name of the form `<block>-<position>` (e.g. `A-07`)
pub fn parse_location_name(name: &str) -> Result<(String, u32), &'static str> {
    let (block, position) = name
        .split_once('-')
        .ok_or("Location name must be <block>-<position>, e.g. A-07")?;

    if block.is_empty() || block.len() > 4 {
        return Err("Location block must be 1-4 characters");
    }
    if !block.chars().all(|c| c.is_ascii_uppercase()) {
        return Err("Location block must be uppercase letters");
    }
    if position.is_empty() || !position.chars().all(|c| c.is_ascii_digit()) {
        return Err("Location position must be numeric");
    }

    let position: u32 = position
        .parse()
        .map_err(|_| "Location position is out of range")?;
    if position == 0 {
        return Err("Location position starts at 1");
    }

    Ok((block.to_string(), position))
}

/// Validate batch code format (uppercase alphanumeric segments joined by '-')
pub fn validate_batch_code(code: &str) -> Result<(), &'static str> {
    if code.is_empty() {
        return Err("Batch code is required");
    }
    if code.len() > 64 {
        return Err("Batch code must be at most 64 characters");
    }
    if code.starts_with('-') || code.ends_with('-') || code.contains("--") {
        return Err("Batch code segments must not be empty");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Batch code must be uppercase alphanumeric with dashes");
    }
    Ok(())
}

/// Validate location code format
pub fn validate_location_code(code: &str) -> Result<(), &'static str> {
    if code.trim().is_empty() {
        return Err("Location code is required");
    }
    if code.chars().any(char::is_whitespace) {
        return Err("Location code must not contain whitespace");
    }
    Ok(())
}

/// Trim free text; blank input becomes `None`
pub fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A reason is present when it has any non-whitespace content
pub fn has_reason(reason: Option<&str>) -> bool {
    reason.is_some_and(|r| !r.trim().is_empty())
}
