//! Salted credential hashing using the `ring` crate.
//!
//! Tenant passwords are never stored. What the control store keeps is a
//! self-describing PHC-like string:
//!
//! ```text
//! pbkdf2-sha256$<iterations>$<base64 salt>$<base64 hash>
//! ```
//!
//! Embedding the iteration count lets the work factor be raised later
//! without invalidating existing hashes.
//!
//! # Security Notes
//!
//! - Every hash gets a fresh 256-bit random salt, so hashing the same
//!   password twice yields different strings.
//! - Verification goes through `ring::pbkdf2::verify`, which compares in
//!   constant time.

use std::num::NonZeroU32;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{Result, VaultError};

/// Length of the PBKDF2 salt in bytes.
pub const SALT_LEN: usize = 32;

/// Length of the derived hash in bytes.
pub const HASH_LEN: usize = 32;

/// PBKDF2 iteration count: 600,000 per OWASP 2023 recommendation for
/// HMAC-SHA256.
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// Scheme tag written as the first field of every stored hash.
const SCHEME: &str = "pbkdf2-sha256";

/// PBKDF2 algorithm: HMAC-SHA256.
static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Hash `password` with a fresh random salt and `iterations` rounds.
///
/// # Errors
///
/// Returns [`VaultError::InvalidParameter`] if `iterations` is zero, or
/// [`VaultError::RandomFailed`] if salt generation fails.
pub fn hash_password(password: &str, iterations: u32) -> Result<String> {
    let rounds = NonZeroU32::new(iterations).ok_or_else(|| VaultError::InvalidParameter {
        reason: "iterations must be non-zero".into(),
    })?;

    let salt = random_bytes(SALT_LEN)?;

    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(PBKDF2_ALG, rounds, &salt, password.as_bytes(), &mut hash);

    tracing::trace!(iterations, "derived credential hash");

    Ok(format!(
        "{SCHEME}${iterations}${}${}",
        BASE64.encode(&salt),
        BASE64.encode(hash)
    ))
}

/// Check `password` against a string produced by [`hash_password`].
///
/// Returns `Ok(false)` on a mismatch and an error only when `stored`
/// cannot be parsed.
pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = ParsedHash::parse(stored)?;
    Ok(pbkdf2::verify(
        PBKDF2_ALG,
        parsed.iterations,
        &parsed.salt,
        password.as_bytes(),
        &parsed.hash,
    )
    .is_ok())
}

/// The decoded fields of a stored hash string.
struct ParsedHash {
    iterations: NonZeroU32,
    salt: Vec<u8>,
    hash: Vec<u8>,
}

impl ParsedHash {
    fn parse(stored: &str) -> Result<Self> {
        let malformed = |reason: &str| VaultError::MalformedHash {
            reason: reason.to_owned(),
        };

        let mut parts = stored.split('$');
        let (Some(scheme), Some(iterations), Some(salt), Some(hash), None) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(malformed("expected four '$'-separated fields"));
        };

        if scheme != SCHEME {
            return Err(malformed("unknown scheme"));
        }

        let iterations = iterations
            .parse::<u32>()
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| malformed("invalid iteration count"))?;
        let salt = BASE64
            .decode(salt)
            .map_err(|_| malformed("invalid salt encoding"))?;
        let hash = BASE64
            .decode(hash)
            .map_err(|_| malformed("invalid hash encoding"))?;

        Ok(Self {
            iterations,
            salt,
            hash,
        })
    }
}

// ---------------------------------------------------------------------------
// Random bytes
// ---------------------------------------------------------------------------

/// Generate `len` cryptographically secure random bytes.
///
/// # Errors
///
/// Returns [`VaultError::RandomFailed`] if the system CSPRNG fails.
pub fn random_bytes(len: usize) -> Result<Vec<u8>> {
    let rng = SystemRandom::new();
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf).map_err(|_| VaultError::RandomFailed {
        reason: "system CSPRNG unavailable".into(),
    })?;
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
