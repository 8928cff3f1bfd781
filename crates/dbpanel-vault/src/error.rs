//! Vault error types.
//!
//! Every public function in this crate returns [`VaultError`]. The
//! variants never carry secret material.

/// Unified error type for dbpanel's cryptographic primitives.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The system CSPRNG failed to produce bytes.
    #[error("random generation failed: {reason}")]
    RandomFailed { reason: String },

    /// A stored credential hash could not be parsed.
    #[error("malformed credential hash: {reason}")]
    MalformedHash { reason: String },

    /// A hashing parameter was out of range (e.g. zero iterations).
    #[error("invalid hashing parameter: {reason}")]
    InvalidParameter { reason: String },
}

/// Convenience alias used throughout the vault crate.
pub type Result<T> = std::result::Result<T, VaultError>;
