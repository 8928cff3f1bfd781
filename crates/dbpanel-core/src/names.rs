//! Identifier and password validation.
//!
//! Database names double as artifact file stems, so the alphabet is kept
//! to `[A-Za-z0-9_]`: no separators, no dots, nothing that can escape the
//! artifact directory.

use crate::error::{PanelError, PanelResult};

/// Minimum identifier length.
pub const MIN_NAME_LEN: usize = 3;
/// Maximum identifier length.
pub const MAX_NAME_LEN: usize = 64;
/// Minimum password length.
pub const MIN_PASSWORD_LEN: usize = 8;
/// Maximum password length.
pub const MAX_PASSWORD_LEN: usize = 128;

/// Validate a database or user name. `kind` names the field in the error.
pub fn validate_identifier(kind: &'static str, value: &str) -> PanelResult<()> {
    let len = value.len();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return Err(PanelError::InvalidName {
            kind,
            reason: format!("must be {MIN_NAME_LEN}-{MAX_NAME_LEN} characters, got {len}"),
        });
    }
    if let Some(bad) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(PanelError::InvalidName {
            kind,
            reason: format!("character {bad:?} is not allowed (use A-Z, a-z, 0-9, _)"),
        });
    }
    Ok(())
}

/// Returns `true` when `value` would pass [`validate_identifier`].
pub fn is_valid_identifier(value: &str) -> bool {
    validate_identifier("name", value).is_ok()
}

/// Validate password length. Strength policy is the caller's concern.
pub fn validate_password(password: &str) -> PanelResult<()> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(PanelError::InvalidArgument(format!(
            "password must be {MIN_PASSWORD_LEN}-{MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
