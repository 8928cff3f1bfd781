//! Append-only audit trail.
//!
//! Every mutating operation appends one [`AuditEntry`] after its primary
//! effect has committed. Entries are never updated or deleted; their
//! identity is the autoincrement sequence number.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace, warn};

use dbpanel_store::Database;

use crate::error::PanelResult;

/// The kind of action an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A managed database and its credential were created.
    Create,
    /// A managed database was deleted.
    Delete,
    /// A credential was rotated.
    Rotate,
    /// An inspection token was issued.
    IssueToken,
    /// An inspection token was redeemed.
    RedeemToken,
    /// An orphaned artifact was removed by reconciliation.
    Reconcile,
    /// Spent or expired tokens were purged.
    PurgeTokens,
}

impl AuditAction {
    /// Tag stored in the `action` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Rotate => "rotate",
            Self::IssueToken => "issue_token",
            Self::RedeemToken => "redeem_token",
            Self::Reconcile => "reconcile",
            Self::PurgeTokens => "purge_tokens",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonically increasing sequence number.
    pub id: i64,
    /// Action tag, e.g. `create`.
    pub action: String,
    /// Target database name (`*` for store-wide actions).
    pub db_name: String,
    /// Acting or owning user, if known.
    pub user: Option<String>,
    /// Free-text detail.
    pub detail: Option<String>,
    /// When the entry was appended.
    pub created_at: DateTime<Utc>,
}

/// Shared append-only sink over the `audit_log` table.
#[derive(Clone)]
pub struct AuditLog {
    db: Database,
}

impl AuditLog {
    /// Create an audit log backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append an entry.
    #[instrument(skip(self, detail))]
    pub async fn append(
        &self,
        action: AuditAction,
        db_name: &str,
        user: Option<&str>,
        detail: Option<&str>,
    ) -> PanelResult<()> {
        let db_name = db_name.to_owned();
        let user = user.map(str::to_owned);
        let detail = detail.map(str::to_owned);
        let now = Utc::now().timestamp_millis();

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO audit_log (action, db_name, db_user, detail, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![action.as_str(), db_name, user, detail, now],
                )?;
                Ok(())
            })
            .await?;

        trace!(%action, "audit entry recorded");
        Ok(())
    }

    /// Append an entry after the primary action already succeeded.
    ///
    /// Failures are logged and swallowed: the action is not rolled back
    /// because the audit write failed.
    pub async fn record(
        &self,
        action: AuditAction,
        db_name: &str,
        user: Option<&str>,
        detail: &str,
    ) {
        if let Err(err) = self.append(action, db_name, user, Some(detail)).await {
            warn!(%action, db_name, %err, "failed to write audit entry");
        }
    }

    /// Most recent entries first, at most `limit`.
    pub async fn list(&self, limit: usize) -> PanelResult<Vec<AuditEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let entries = self
            .db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, action, db_name, db_user, detail, created_at \
                     FROM audit_log ORDER BY id DESC LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map([limit], map_audit_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;
        Ok(entries)
    }
}

fn map_audit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEntry> {
    Ok(AuditEntry {
        id: row.get(0)?,
        action: row.get(1)?,
        db_name: row.get(2)?,
        user: row.get(3)?,
        detail: row.get(4)?,
        created_at: DateTime::from_timestamp_millis(row.get(5)?).unwrap_or_default(),
    })
}
