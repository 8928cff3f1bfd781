//! Cryptographic primitives for dbpanel.
//!
//! Nothing in this crate touches storage; it only turns secrets into
//! values that are safe to persist.
//!
//! # Modules
//!
//! - [`crypto`]: salted PBKDF2-HMAC-SHA256 credential hashing and
//!   constant-time verification.
//! - [`token`]: URL-safe random inspection tokens and their SHA-256
//!   digests.
//! - [`error`]: unified error types.
//!
//! # Quick Start
//!
//! ```rust
//! use dbpanel_vault::{crypto, token};
//!
//! # fn example() -> dbpanel_vault::Result<()> {
//! let stored = crypto::hash_password("supersafe123", 1_000)?;
//! assert!(crypto::verify_password("supersafe123", &stored)?);
//!
//! let issued = token::generate()?;
//! let digest = token::digest(&issued);
//! assert_ne!(issued, digest);
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod error;
pub mod token;

pub use error::{Result, VaultError};
