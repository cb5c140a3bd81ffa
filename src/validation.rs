use crate::error::{AppError, AppResult};

// =============================================================================
// Validation Constants
// =============================================================================

/// Maximum length of an email address (RFC 5321 path limit).
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length of the local part (before `@`).
pub const MAX_EMAIL_LOCAL_LENGTH: usize = 64;

/// Minimum password length accepted by the login form and the CLI.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum password length.
///
/// Argon2 accepts longer input, but hashing megabyte passwords on every
/// login attempt is an easy way to burn CPU.
pub const MAX_PASSWORD_LENGTH: usize = 1024;

/// Maximum length for first and last names.
pub const MAX_NAME_LENGTH: usize = 100;

/// Characters allowed in the local part besides ASCII alphanumerics.
const LOCAL_SPECIALS: &str = ".!#$%&'*+/=?^_`{|}~-";

/// Validate an email address.
///
/// This is a pragmatic check, not a full RFC 5322 parser:
/// - Total length between 3 and 254 characters
/// - Exactly one `@` with a non-empty local part of at most 64 characters
/// - Local part uses alphanumerics and the usual specials, no leading,
///   trailing or doubled dots
/// - Domain has at least two dot-separated labels of alphanumerics and
///   hyphens, none starting or ending with a hyphen
pub fn validate_email(email: &str) -> AppResult<()> {
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(AppError::Validation(format!(
            "Email cannot exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(AppError::Validation(
            "Email must contain an '@'".to_string(),
        ));
    };

    if domain.contains('@') {
        return Err(AppError::Validation(
            "Email must contain a single '@'".to_string(),
        ));
    }

    validate_email_local(local)?;
    validate_email_domain(domain)?;

    Ok(())
}

fn validate_email_local(local: &str) -> AppResult<()> {
    if local.is_empty() || local.len() > MAX_EMAIL_LOCAL_LENGTH {
        return Err(AppError::Validation(format!(
            "Email local part must be between 1 and {MAX_EMAIL_LOCAL_LENGTH} characters"
        )));
    }

    if local.starts_with('.') || local.ends_with('.') || local.contains("..") {
        return Err(AppError::Validation(
            "Email local part has misplaced dots".to_string(),
        ));
    }

    if let Some((i, c)) = local
        .char_indices()
        .find(|&(_, c)| !c.is_ascii_alphanumeric() && !LOCAL_SPECIALS.contains(c))
    {
        return Err(AppError::Validation(format!(
            "Email contains invalid character '{}' at position {i}",
            c.escape_debug()
        )));
    }

    Ok(())
}

fn validate_email_domain(domain: &str) -> AppResult<()> {
    let labels: Vec<&str> = domain.split('.').collect();

    if labels.len() < 2 {
        return Err(AppError::Validation(
            "Email domain must contain a dot".to_string(),
        ));
    }

    for label in labels {
        let valid = !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

        if !valid {
            return Err(AppError::Validation(format!(
                "Email domain label '{}' is invalid",
                label.escape_debug()
            )));
        }
    }

    Ok(())
}

/// Validate a password's length (counted in characters, not bytes).
pub fn validate_password(password: &str) -> AppResult<()> {
    let len = password.chars().count();

    if len < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    if len > MAX_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password cannot exceed {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Validate a person's first or last name.
///
/// Rules:
/// - Must not be blank
/// - At most 100 characters
/// - No control characters
pub fn validate_name(name: &str, field: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "{field} cannot exceed {MAX_NAME_LENGTH} characters"
        )));
    }

    if let Some(pos) = name.chars().position(|c| c.is_control()) {
        return Err(AppError::Validation(format!(
            "{field} contains invalid control character at position {pos}"
        )));
    }

    Ok(())
}

/// Canonical form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
