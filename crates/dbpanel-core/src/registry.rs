//! Managed database registry.
//!
//! The registry is the single writer of `managed_databases` rows and the
//! sole owner of the name → artifact mapping. Each operation runs its
//! check-then-act sequence inside one control store transaction, and
//! sequences the artifact side effect around the commit:
//!
//! - **create** inserts the record, then allocates the artifact, then
//!   commits. A failed commit discards the new artifact.
//! - **delete** commits the removal of the record (with its credential and
//!   every token scoped to it) first, then unlinks the artifact. If the
//!   unlink fails, the error is surfaced and the leftover file shows up in
//!   [`Registry::reconcile`].
//!
//! Audit entries are appended after the commit and never roll anything
//! back.

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use dbpanel_store::Database;

use crate::artifact::ArtifactStore;
use crate::audit::{AuditAction, AuditLog};
use crate::credentials::{self, CredentialStore};
use crate::error::{PanelError, PanelResult};
use crate::names;
use crate::tokens;

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// Registry metadata of one managed database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedDatabase {
    /// Unique name; also the artifact file stem.
    pub db_name: String,
    /// Owning user name.
    pub user: String,
    /// When the database was provisioned.
    pub created_at: DateTime<Utc>,
}

/// Outcome of [`Registry::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Records whose artifact file is missing. Reported, not repaired.
    pub missing_artifacts: Vec<String>,
    /// Names with an artifact or journal file on disk but no record.
    pub orphaned_artifacts: Vec<String>,
    /// How many of the orphaned files were removed.
    pub removed_orphans: usize,
}

impl ReconcileReport {
    /// Whether metadata and storage agreed before the sweep.
    pub fn is_consistent(&self) -> bool {
        self.missing_artifacts.is_empty() && self.orphaned_artifacts.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Registry
// ═══════════════════════════════════════════════════════════════════════

/// Authoritative metadata for managed databases plus their artifacts.
#[derive(Clone)]
pub struct Registry {
    db: Database,
    artifacts: ArtifactStore,
    credentials: CredentialStore,
    audit: AuditLog,
}

impl Registry {
    /// Create a registry over the given collaborators.
    pub fn new(
        db: Database,
        artifacts: ArtifactStore,
        credentials: CredentialStore,
        audit: AuditLog,
    ) -> Self {
        Self {
            db,
            artifacts,
            credentials,
            audit,
        }
    }

    /// The artifact store this registry manages.
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Provision a managed database: artifact, credential and record.
    ///
    /// Fails with [`PanelError::AlreadyExists`] if `name` is taken. The
    /// existence check and the insert happen under one transaction, so of
    /// several concurrent creators of the same name exactly one succeeds.
    #[instrument(skip(self, password))]
    pub async fn create(
        &self,
        name: &str,
        user: &str,
        password: &str,
    ) -> PanelResult<ManagedDatabase> {
        names::validate_identifier("database name", name)?;
        names::validate_identifier("user name", user)?;
        names::validate_password(password)?;

        // Hash outside the critical section.
        let password_hash = self.credentials.hash(password).await?;

        let record = ManagedDatabase {
            db_name: name.to_owned(),
            user: user.to_owned(),
            // Stored with millisecond precision.
            created_at: Utc::now().trunc_subsecs(3),
        };
        let artifacts = self.artifacts.clone();
        let pending = record.clone();

        self.db
            .transaction(move |tx| -> PanelResult<()> {
                if lookup_user(&tx, &pending.db_name)?.is_some() {
                    return Err(PanelError::AlreadyExists {
                        name: pending.db_name,
                    });
                }

                tx.execute(
                    "INSERT INTO managed_databases (db_name, db_user, created_at) VALUES (?1, ?2, ?3)",
                    params![
                        pending.db_name,
                        pending.user,
                        pending.created_at.timestamp_millis()
                    ],
                )?;
                credentials::insert(&tx, &pending.db_name, &password_hash)?;

                artifacts.create(&pending.db_name)?;

                if let Err(e) = tx.commit() {
                    artifacts.discard(&pending.db_name);
                    return Err(e.into());
                }
                Ok(())
            })
            .await?;

        info!(db_name = %record.db_name, user = %record.user, "managed database created");
        self.audit
            .record(
                AuditAction::Create,
                &record.db_name,
                Some(&record.user),
                "database and credential created",
            )
            .await;
        Ok(record)
    }

    /// Delete a managed database, its credential, its tokens and its
    /// artifact.
    ///
    /// Fails with [`PanelError::NotFound`] if `name` is unknown. If the
    /// metadata was removed but the artifact could not be, returns
    /// [`PanelError::ArtifactUnavailable`]; the name is then free again
    /// once [`Registry::reconcile`] has cleaned up the file.
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> PanelResult<()> {
        let target = name.to_owned();
        let (user, revoked) = self
            .db
            .transaction(move |tx| -> PanelResult<(String, usize)> {
                let Some(user) = lookup_user(&tx, &target)? else {
                    return Err(PanelError::NotFound { name: target });
                };
                let revoked = tokens::revoke_all(&tx, &target)?;
                // Credentials cascade via the foreign key.
                tx.execute(
                    "DELETE FROM managed_databases WHERE db_name = ?1",
                    [&target],
                )?;
                tx.commit()?;
                Ok((user, revoked))
            })
            .await?;

        match self.artifacts.remove(name).await {
            Ok(removed) => {
                if !removed {
                    warn!(db_name = name, "deleted record had no artifact on disk");
                }
                info!(db_name = name, revoked_tokens = revoked, "managed database deleted");
                self.audit
                    .record(
                        AuditAction::Delete,
                        name,
                        Some(&user),
                        &format!("database deleted, {revoked} token(s) revoked"),
                    )
                    .await;
                Ok(())
            }
            Err(err) => {
                error!(db_name = name, %err, "record deleted but artifact removal failed");
                self.audit
                    .record(
                        AuditAction::Delete,
                        name,
                        Some(&user),
                        &format!("record deleted, artifact removal failed: {err}"),
                    )
                    .await;
                Err(err)
            }
        }
    }

    /// Replace the credential of `name`. The artifact is not touched.
    #[instrument(skip(self, new_password))]
    pub async fn rotate_credential(&self, name: &str, new_password: &str) -> PanelResult<()> {
        names::validate_password(new_password)?;
        let password_hash = self.credentials.hash(new_password).await?;

        let target = name.to_owned();
        let user = self
            .db
            .transaction(move |tx| -> PanelResult<String> {
                let Some(user) = lookup_user(&tx, &target)? else {
                    return Err(PanelError::NotFound { name: target });
                };
                if !credentials::replace(&tx, &target, &password_hash)? {
                    // A record without a credential row; heal it.
                    credentials::insert(&tx, &target, &password_hash)?;
                }
                tx.commit()?;
                Ok(user)
            })
            .await?;

        info!(db_name = name, "credential rotated");
        self.audit
            .record(AuditAction::Rotate, name, Some(&user), "credential rotated")
            .await;
        Ok(())
    }

    /// All managed databases, newest first.
    pub async fn list(&self) -> PanelResult<Vec<ManagedDatabase>> {
        let rows = self
            .db
            .execute(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT db_name, db_user, created_at FROM managed_databases \
                     ORDER BY created_at DESC, id DESC",
                )?;
                let rows = stmt
                    .query_map([], map_database_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(rows)
    }

    /// Fetch one managed database, or `None`.
    pub async fn get(&self, name: &str) -> PanelResult<Option<ManagedDatabase>> {
        let name = name.to_owned();
        let row = self
            .db
            .execute(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT db_name, db_user, created_at FROM managed_databases WHERE db_name = ?1",
                        [&name],
                        map_database_row,
                    )
                    .optional()?)
            })
            .await?;
        Ok(row)
    }

    /// Artifact path of a registered database.
    pub async fn artifact_path(&self, name: &str) -> PanelResult<PathBuf> {
        match self.get(name).await? {
            Some(_) => Ok(self.artifacts.path_for(name)),
            None => Err(PanelError::NotFound {
                name: name.to_owned(),
            }),
        }
    }

    /// Compare records with artifact files and remove orphaned files.
    ///
    /// Runs under the control store lock so no create or delete can
    /// interleave with the sweep.
    pub async fn reconcile(&self) -> PanelResult<ReconcileReport> {
        let artifacts = self.artifacts.clone();
        let (report, removed) = self
            .db
            .transaction(move |tx| -> PanelResult<(ReconcileReport, Vec<String>)> {
                let records: BTreeSet<String> = {
                    let mut stmt = tx.prepare("SELECT db_name FROM managed_databases")?;
                    let names = stmt
                        .query_map([], |row| row.get(0))?
                        .collect::<Result<_, _>>()?;
                    names
                };
                // A stray journal is an orphan as well: it would be replayed
                // into a database later created under the same name.
                let mut on_disk = artifacts.list_names()?;
                on_disk.extend(artifacts.list_side_file_names()?);

                let mut report = ReconcileReport {
                    missing_artifacts: records
                        .iter()
                        .filter(|name| !artifacts.exists(name))
                        .cloned()
                        .collect(),
                    orphaned_artifacts: on_disk.difference(&records).cloned().collect(),
                    removed_orphans: 0,
                };

                let mut removed = Vec::new();
                for name in &report.orphaned_artifacts {
                    match artifacts.remove_blocking(name) {
                        Ok(_) => removed.push(name.clone()),
                        Err(err) => warn!(db_name = %name, %err, "failed to remove orphaned artifact"),
                    }
                }
                report.removed_orphans = removed.len();
                tx.commit()?;
                Ok((report, removed))
            })
            .await?;

        for name in &report.missing_artifacts {
            error!(
                db_name = %name,
                path = %self.artifacts.path_for(name).display(),
                "registered database has no artifact"
            );
        }
        for name in &removed {
            self.audit
                .record(AuditAction::Reconcile, name, None, "orphaned artifact removed")
                .await;
        }

        info!(
            missing = report.missing_artifacts.len(),
            orphaned = report.orphaned_artifacts.len(),
            removed = report.removed_orphans,
            "reconciliation finished"
        );
        Ok(report)
    }
}

// ── row helpers ──────────────────────────────────────────────────────

/// Owning user of `name`, or `None` if it is not registered.
pub(crate) fn lookup_user(conn: &Connection, name: &str) -> PanelResult<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT db_user FROM managed_databases WHERE db_name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?)
}

fn map_database_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ManagedDatabase> {
    Ok(ManagedDatabase {
        db_name: row.get(0)?,
        user: row.get(1)?,
        created_at: DateTime::from_timestamp_millis(row.get(2)?).unwrap_or_default(),
    })
}

// ── tests ────────────────────────────────────────────────────────────
