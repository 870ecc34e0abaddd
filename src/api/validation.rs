//! Input validation for API requests.
//!
//! Each validator checks a single field and returns a human-readable message
//! on failure. Handlers collect these into an `ApiError` with the
//! `ValidationErrorBuilder` from the `error` module.

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 64;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;
pub const TITLE_MAX_LEN: usize = 200;

/// Validate a username (3-64 chars, alphanumeric with `_` and `-`)
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    let len = username.chars().count();
    if len < USERNAME_MIN_LEN {
        return Err(format!(
            "Username is too short (min {} characters)",
            USERNAME_MIN_LEN
        ));
    }
    if len > USERNAME_MAX_LEN {
        return Err(format!(
            "Username is too long (max {} characters)",
            USERNAME_MAX_LEN
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(
            "Username may only contain letters, digits, underscores and dashes".to_string(),
        );
    }

    Ok(())
}

/// Validate a password's length. No composition rules are enforced.
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    let len = password.chars().count();
    if len < PASSWORD_MIN_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN_LEN
        ));
    }
    if len > PASSWORD_MAX_LEN {
        return Err(format!(
            "Password must be at most {} characters",
            PASSWORD_MAX_LEN
        ));
    }

    Ok(())
}

/// Validate a workout title
pub fn validate_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Title is required".to_string());
    }

    if title.chars().count() > TITLE_MAX_LEN {
        return Err(format!("Title is too long (max {} characters)", TITLE_MAX_LEN));
    }

    Ok(())
}

/// Validate an exercise name
pub fn validate_exercise_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Exercise name is required".to_string());
    }
    Ok(())
}

/// Validate that a count or measure is not negative
pub fn validate_non_negative(value: i32) -> Result<(), String> {
    if value < 0 {
        return Err("Must not be negative".to_string());
    }
    Ok(())
}

/// Validate an optional count; absent values are always valid
pub fn validate_optional_non_negative(value: Option<i32>) -> Result<(), String> {
    value.map_or(Ok(()), validate_non_negative)
}

/// Validate an optional weight; absent values are always valid
pub fn validate_weight(weight: Option<f64>) -> Result<(), String> {
    match weight {
        Some(w) if !w.is_finite() => Err("Weight must be a finite number".to_string()),
        Some(w) if w < 0.0 => Err("Must not be negative".to_string()),
        _ => Ok(()),
    }
}

/// Parse a path id; only integers >= 1 are valid resource ids
pub fn parse_id(raw: &str) -> Result<i64, String> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err("Invalid id parameter".to_string()),
    }
}
