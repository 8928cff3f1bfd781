//! Inspection token primitives.
//!
//! A token is 32 bytes from the system CSPRNG rendered as URL-safe base64
//! without padding (43 characters, 256 bits of entropy), so it can be
//! dropped straight into a URL path segment.
//!
//! Only [`digest`] of a token is ever persisted. A leaked control store
//! therefore yields no redeemable tokens.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use ring::digest::{SHA256, digest as sha256};

use crate::crypto::random_bytes;
use crate::error::Result;

/// Number of random bytes in a token.
pub const TOKEN_BYTES: usize = 32;

/// Generate a fresh, unguessable token string.
///
/// # Errors
///
/// Returns [`crate::VaultError::RandomFailed`] if the system CSPRNG fails.
pub fn generate() -> Result<String> {
    let bytes = random_bytes(TOKEN_BYTES)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// SHA-256 digest of `token`, base64 encoded, used as the lookup key.
pub fn digest(token: &str) -> String {
    let hash = sha256(&SHA256, token.as_bytes());
    STANDARD_NO_PAD.encode(hash.as_ref())
}
