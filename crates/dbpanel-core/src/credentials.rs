//! Credential store.
//!
//! One salted PBKDF2 hash per managed database lives in the `credentials`
//! table, keyed by database name and cascading with its registry row.
//! Plaintext passwords never reach the control store or the logs.
//!
//! Hashing is deliberately slow, so [`CredentialStore::hash`] runs on the
//! blocking pool *before* the registry takes the control store lock; the
//! row-level helpers below only ever see finished hashes.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::instrument;

use dbpanel_store::Database;
use dbpanel_vault::crypto;

use crate::error::{PanelError, PanelResult};

/// Hashes, stores and verifies per-database credentials.
#[derive(Clone)]
pub struct CredentialStore {
    db: Database,
    iterations: u32,
}

impl CredentialStore {
    /// Create a credential store hashing with `iterations` PBKDF2 rounds.
    pub fn new(db: Database, iterations: u32) -> Self {
        Self { db, iterations }
    }

    /// Hash `password` on the blocking pool.
    pub async fn hash(&self, password: &str) -> PanelResult<String> {
        let password = password.to_owned();
        let iterations = self.iterations;
        let hash =
            tokio::task::spawn_blocking(move || crypto::hash_password(&password, iterations))
                .await??;
        Ok(hash)
    }

    /// Check `password` against the stored credential of `db_name`.
    ///
    /// Fails with [`PanelError::NotFound`] if the database has no
    /// credential.
    #[instrument(skip(self, password))]
    pub async fn verify(&self, db_name: &str, password: &str) -> PanelResult<bool> {
        let stored = self
            .stored_hash(db_name)
            .await?
            .ok_or_else(|| PanelError::NotFound {
                name: db_name.to_owned(),
            })?;
        let password = password.to_owned();
        let valid =
            tokio::task::spawn_blocking(move || crypto::verify_password(&password, &stored))
                .await??;
        Ok(valid)
    }

    /// The stored hash string for `db_name`, if any.
    pub async fn stored_hash(&self, db_name: &str) -> PanelResult<Option<String>> {
        let db_name = db_name.to_owned();
        let hash = self
            .db
            .execute(move |conn| Ok(select_hash(conn, &db_name)?))
            .await?;
        Ok(hash)
    }
}

// ── row helpers (run inside registry transactions) ──────────────────

/// Insert the credential for a freshly registered database.
pub(crate) fn insert(conn: &Connection, db_name: &str, password_hash: &str) -> PanelResult<()> {
    conn.execute(
        "INSERT INTO credentials (db_name, password_hash, updated_at) VALUES (?1, ?2, ?3)",
        params![db_name, password_hash, Utc::now().timestamp_millis()],
    )?;
    Ok(())
}

/// Replace the credential of `db_name`. Returns `false` if none existed.
pub(crate) fn replace(conn: &Connection, db_name: &str, password_hash: &str) -> PanelResult<bool> {
    let updated = conn.execute(
        "UPDATE credentials SET password_hash = ?2, updated_at = ?3 WHERE db_name = ?1",
        params![db_name, password_hash, Utc::now().timestamp_millis()],
    )?;
    Ok(updated == 1)
}

fn select_hash(conn: &Connection, db_name: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT password_hash FROM credentials WHERE db_name = ?1",
        [db_name],
        |row| row.get(0),
    )
    .optional()
}
