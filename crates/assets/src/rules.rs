use tania_core::DomainError;

pub(crate) const MAX_NAME_LEN: usize = 100;

/// Trimmed name, non-empty and at most [`MAX_NAME_LEN`] characters.
pub(crate) fn name(what: &str, raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{what} name cannot be empty")));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "{what} name is longer than {MAX_NAME_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn positive(what: &str, value: f64) -> Result<(), DomainError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(DomainError::validation(format!("{what} must be greater than zero")));
    }
    Ok(())
}

pub(crate) fn non_negative(what: &str, value: f64) -> Result<(), DomainError> {
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::validation(format!("{what} cannot be negative")));
    }
    Ok(())
}
