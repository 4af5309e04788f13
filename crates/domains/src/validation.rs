//! Input rules shared by the services and the credential adapter.

use crate::error::{AuthFailure, DomainError, Result};

pub const MIN_PASSWORD_LEN: usize = 6;

/// Loose structural check: one `@`, a non-empty local part and a dotted domain.
pub fn validate_email(email: &str) -> Result<()> {
    let mut parts = email.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(AuthFailure::InvalidEmail.into());
    };
    let domain_ok = domain.contains('.') && domain.split('.').all(|label| !label.is_empty());
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(AuthFailure::InvalidEmail.into());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthFailure::WeakPassword.into());
    }
    Ok(())
}

/// Trims `value` and rejects it when nothing is left.
pub fn require_text(value: &str, message: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(message));
    }
    Ok(trimmed.to_string())
}
