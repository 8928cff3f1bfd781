//! Error types for the dbpanel-core crate.
//!
//! [`PanelError`] is the closed set of outcomes every lifecycle and
//! access-control operation can produce. The transport layer matches on
//! it to pick a status code; nothing here is stringly typed.

use std::fmt;
use std::path::PathBuf;

use dbpanel_store::StoreError;
use dbpanel_vault::VaultError;
use thiserror::Error;

/// Alias for `Result<T, PanelError>`.
pub type PanelResult<T> = Result<T, PanelError>;

/// Errors produced by the panel core.
#[derive(Debug, Error)]
pub enum PanelError {
    /// A managed database with this name is already registered.
    #[error("database {name} already exists")]
    AlreadyExists { name: String },

    /// No managed database with this name is registered.
    #[error("database {name} not found")]
    NotFound { name: String },

    /// An inspection token was rejected.
    #[error("invalid token: {0}")]
    InvalidToken(TokenRejection),

    /// The physical artifact of a managed database is missing or could not
    /// be opened, created or removed. Metadata and storage disagree.
    #[error("artifact {} unavailable: {reason}", path.display())]
    ArtifactUnavailable { path: PathBuf, reason: String },

    /// A database or user name is outside the allowed alphabet or length.
    #[error("invalid {kind}: {reason}")]
    InvalidName { kind: &'static str, reason: String },

    /// Any other argument failed validation (e.g. password length).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Control store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Credential hashing or token generation failure.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// Filesystem failure outside of a specific artifact.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for PanelError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(StoreError::Sqlite(err))
    }
}

impl From<tokio::task::JoinError> for PanelError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Store(StoreError::from(err))
    }
}

/// Why an inspection token was not redeemed.
///
/// All four reasons surface as [`PanelError::InvalidToken`]; callers facing
/// untrusted clients should use [`TokenRejection::public_message`] rather
/// than the `Display` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    /// No live token with this value exists (never issued, or revoked by
    /// deleting its database).
    NotFound,
    /// The token was already redeemed once.
    AlreadyUsed,
    /// The token's expiry instant has passed.
    Expired,
    /// The token is valid but its database artifact is gone.
    ArtifactMissing,
}

impl TokenRejection {
    /// Message that is safe to show the presenter of the token.
    ///
    /// Not-found, expired and artifact-missing are merged so a client cannot
    /// test whether a guessed token ever existed.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::AlreadyUsed => "token already used",
            Self::NotFound | Self::Expired | Self::ArtifactMissing => {
                "token is invalid or expired"
            }
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "token not found",
            Self::AlreadyUsed => "token already used",
            Self::Expired => "token is expired",
            Self::ArtifactMissing => "managed database artifact does not exist",
        }
    }
}

impl fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
