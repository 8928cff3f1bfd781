//! Single-use, short-lived inspection tokens.
//!
//! # Lifecycle
//!
//! ```text
//!            issue
//!              │
//!              ▼
//!           Issued ──── validate ───▶ Redeemed
//!              │
//!              ├──── now ≥ expiry ──▶ Expired
//!              │
//!              └── database delete ─▶ Revoked (row removed)
//! ```
//!
//! Redeemed, Expired and Revoked are terminal. Expiry is evaluated lazily
//! at validation time; nothing sweeps in the background. Expired or spent
//! rows stay inert until their database is deleted or
//! [`TokenManager::purge_spent`] runs.
//!
//! Only the SHA-256 digest of a token is stored, and redemption is a
//! single transaction: find, check, flip `used` from 0 to 1. Of two
//! concurrent redeemers of the same token exactly one wins; the other
//! sees [`TokenRejection::AlreadyUsed`].

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use dbpanel_store::Database;
use dbpanel_vault::token;

use crate::artifact::ArtifactStore;
use crate::audit::{AuditAction, AuditLog};
use crate::error::{PanelError, PanelResult, TokenRejection};
use crate::registry;

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A freshly issued token. The plaintext exists only here.
#[derive(Clone, Serialize)]
pub struct IssuedToken {
    /// The bearer token, URL safe.
    pub token: String,
    /// Database the token is scoped to.
    pub db_name: String,
    /// Instant after which the token no longer validates.
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"<redacted>")
            .field("db_name", &self.db_name)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Result of a successful redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redemption {
    /// Database the token was scoped to.
    pub db_name: String,
    /// Resolved artifact path of that database.
    pub artifact_path: PathBuf,
}

/// State of a stored token row at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenState {
    Issued,
    Redeemed,
    Expired,
}

impl TokenState {
    fn classify(used: bool, expires_at_ms: i64, now_ms: i64) -> Self {
        if used {
            Self::Redeemed
        } else if now_ms >= expires_at_ms {
            Self::Expired
        } else {
            Self::Issued
        }
    }
}

struct TokenRow {
    id: i64,
    db_name: String,
    expires_at: i64,
    used: bool,
}

// ═══════════════════════════════════════════════════════════════════════
//  TokenManager
// ═══════════════════════════════════════════════════════════════════════

/// Issues and redeems inspection tokens. Sole owner of `access_tokens`.
#[derive(Clone)]
pub struct TokenManager {
    db: Database,
    artifacts: ArtifactStore,
    audit: AuditLog,
    default_ttl: Duration,
}

impl TokenManager {
    /// Create a manager whose tokens live `default_ttl_secs` by default.
    pub fn new(
        db: Database,
        artifacts: ArtifactStore,
        audit: AuditLog,
        default_ttl_secs: u64,
    ) -> Self {
        Self {
            db,
            artifacts,
            audit,
            default_ttl: ttl_from_secs(default_ttl_secs),
        }
    }

    /// Issue a token for `db_name` with the default lifetime.
    pub async fn issue(&self, db_name: &str) -> PanelResult<IssuedToken> {
        self.issue_with_ttl(db_name, self.default_ttl).await
    }

    /// Issue a token for `db_name` valid for `ttl`.
    ///
    /// Fails with [`PanelError::NotFound`] if the database is not
    /// registered. A zero `ttl` yields a token that never validates.
    /// Lifetimes above ten years are clamped; an expiry that falls outside
    /// the representable range is [`PanelError::InvalidArgument`].
    #[instrument(skip(self))]
    pub async fn issue_with_ttl(&self, db_name: &str, ttl: Duration) -> PanelResult<IssuedToken> {
        let now = Utc::now();
        let expires_at = now
            .checked_add_signed(ttl.min(ttl_from_secs(MAX_TTL_SECS)))
            .ok_or_else(|| PanelError::InvalidArgument(format!("token lifetime {ttl} out of range")))?;
        let plaintext = token::generate()?;
        let token_hash = token::digest(&plaintext);
        let target = db_name.to_owned();

        let user = self
            .db
            .transaction(move |tx| -> PanelResult<String> {
                let Some(user) = registry::lookup_user(&tx, &target)? else {
                    return Err(PanelError::NotFound { name: target });
                };
                tx.execute(
                    "INSERT INTO access_tokens (token_hash, db_name, expires_at, used, created_at) \
                     VALUES (?1, ?2, ?3, 0, ?4)",
                    params![
                        token_hash,
                        target,
                        expires_at.timestamp_millis(),
                        now.timestamp_millis()
                    ],
                )?;
                tx.commit()?;
                Ok(user)
            })
            .await?;

        info!(db_name, %expires_at, "inspection token issued");
        self.audit
            .record(
                AuditAction::IssueToken,
                db_name,
                Some(&user),
                &format!("short-lived inspection token issued, expires {expires_at}"),
            )
            .await;

        Ok(IssuedToken {
            token: plaintext,
            db_name: db_name.to_owned(),
            expires_at,
        })
    }

    /// Redeem `token`: validate it and consume it in one step.
    ///
    /// Fails with [`PanelError::InvalidToken`] if the token is unknown,
    /// revoked, already used, expired, or its artifact is missing. In the
    /// last case the token is left unconsumed.
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> PanelResult<Redemption> {
        let token_hash = token::digest(token);
        let artifacts = self.artifacts.clone();

        let outcome = self
            .db
            .transaction(move |tx| -> PanelResult<(Redemption, String)> {
                let reject = |reason| Err(PanelError::InvalidToken(reason));

                let Some(row) = select_token(&tx, &token_hash)? else {
                    return reject(TokenRejection::NotFound);
                };

                // A token whose database is gone is revoked even if its row
                // survived.
                let Some(user) = registry::lookup_user(&tx, &row.db_name)? else {
                    return reject(TokenRejection::NotFound);
                };

                match TokenState::classify(row.used, row.expires_at, Utc::now().timestamp_millis())
                {
                    TokenState::Redeemed => return reject(TokenRejection::AlreadyUsed),
                    TokenState::Expired => return reject(TokenRejection::Expired),
                    TokenState::Issued => {}
                }

                if !artifacts.exists(&row.db_name) {
                    return reject(TokenRejection::ArtifactMissing);
                }

                let flipped = tx.execute(
                    "UPDATE access_tokens SET used = 1 WHERE id = ?1 AND used = 0",
                    [row.id],
                )?;
                if flipped != 1 {
                    return reject(TokenRejection::AlreadyUsed);
                }
                tx.commit()?;

                let artifact_path = artifacts.path_for(&row.db_name);
                Ok((
                    Redemption {
                        db_name: row.db_name,
                        artifact_path,
                    },
                    user,
                ))
            })
            .await;

        let (redemption, user) = match outcome {
            Ok(ok) => ok,
            Err(PanelError::InvalidToken(reason)) => {
                if reason == TokenRejection::ArtifactMissing {
                    warn!(%reason, "token rejected: metadata and storage disagree");
                } else {
                    debug!(%reason, "token rejected");
                }
                return Err(PanelError::InvalidToken(reason));
            }
            Err(err) => return Err(err),
        };

        info!(db_name = %redemption.db_name, "inspection token redeemed");
        self.audit
            .record(
                AuditAction::RedeemToken,
                &redemption.db_name,
                Some(&user),
                "inspection token redeemed",
            )
            .await;
        Ok(redemption)
    }

    /// Hard-delete every token that is redeemed or expired.
    ///
    /// Not required for correctness; it only reclaims inert rows.
    pub async fn purge_spent(&self) -> PanelResult<usize> {
        let now = Utc::now().timestamp_millis();
        let purged = self
            .db
            .execute(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM access_tokens WHERE used = 1 OR expires_at <= ?1",
                    [now],
                )?)
            })
            .await?;

        if purged > 0 {
            info!(purged, "spent inspection tokens purged");
            self.audit
                .record(
                    AuditAction::PurgeTokens,
                    "*",
                    None,
                    &format!("{purged} spent or expired token(s) purged"),
                )
                .await;
        }
        Ok(purged)
    }
}

// ── row helpers ──────────────────────────────────────────────────────

/// Revoke every token scoped to `db_name`. Called by the registry inside
/// its delete transaction.
pub(crate) fn revoke_all(conn: &Connection, db_name: &str) -> PanelResult<usize> {
    Ok(conn.execute("DELETE FROM access_tokens WHERE db_name = ?1", [db_name])?)
}

fn select_token(conn: &Connection, token_hash: &str) -> PanelResult<Option<TokenRow>> {
    Ok(conn
        .query_row(
            "SELECT id, db_name, expires_at, used FROM access_tokens WHERE token_hash = ?1",
            [token_hash],
            |row| {
                Ok(TokenRow {
                    id: row.get(0)?,
                    db_name: row.get(1)?,
                    expires_at: row.get(2)?,
                    used: row.get(3)?,
                })
            },
        )
        .optional()?)
}

/// Longest accepted lifetime; larger values are clamped.
const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn ttl_from_secs(secs: u64) -> Duration {
    Duration::seconds(i64::try_from(secs.min(MAX_TTL_SECS)).unwrap_or_default())
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;
    use crate::registry::Registry;

    struct Fixture {
        _dir: tempfile::TempDir,
        registry: Registry,
        tokens: TokenManager,
        audit: AuditLog,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_and_migrate(dir.path().join("panel.db"))
            .await
            .unwrap();
        let artifacts = ArtifactStore::new(dir.path().join("managed"));
        artifacts.ensure_dir().unwrap();
        let audit = AuditLog::new(db.clone());
        let registry = Registry::new(
            db.clone(),
            artifacts.clone(),
            CredentialStore::new(db.clone(), 1_000),
            audit.clone(),
        );
        let tokens = TokenManager::new(db, artifacts, audit.clone(), 300);
        registry
            .create("tenant_one", "tenant_user", "supersafe123")
            .await
            .unwrap();
        Fixture {
            _dir: dir,
            registry,
            tokens,
            audit,
        }
    }

    fn rejection(result: PanelResult<Redemption>) -> TokenRejection {
        match result {
            Err(PanelError::InvalidToken(reason)) => reason,
            other => panic!("expected InvalidToken, got {other:?}"),
        }
    }

    #[test]
    fn classify_follows_the_state_machine() {
        assert_eq!(TokenState::classify(false, 10, 5), TokenState::Issued);
        assert_eq!(TokenState::classify(false, 10, 10), TokenState::Expired);
        assert_eq!(TokenState::classify(false, 10, 11), TokenState::Expired);
        // Used wins over expired: a spent token reports as already used.
        assert_eq!(TokenState::classify(true, 10, 11), TokenState::Redeemed);
    }

    #[tokio::test]
    async fn issue_uses_default_ttl() {
        let f = fixture().await;
        let before = Utc::now();
        let issued = f.tokens.issue("tenant_one").await.unwrap();
        let after = Utc::now();
        assert!(issued.expires_at >= before + Duration::seconds(300));
        assert!(issued.expires_at <= after + Duration::seconds(300));
        assert_eq!(issued.db_name, "tenant_one");
    }

    #[tokio::test]
    async fn issue_for_unknown_database_is_not_found() {
        let f = fixture().await;
        let err = f.tokens.issue("ghost_db").await.unwrap_err();
        assert!(matches!(err, PanelError::NotFound { .. }));
    }

    #[tokio::test]
    async fn validate_succeeds_exactly_once() {
        let f = fixture().await;
        let issued = f.tokens.issue("tenant_one").await.unwrap();

        let redemption = f.tokens.validate(&issued.token).await.unwrap();
        assert_eq!(redemption.db_name, "tenant_one");
        assert_eq!(
            redemption.artifact_path,
            f.registry.artifacts().path_for("tenant_one")
        );

        assert_eq!(
            rejection(f.tokens.validate(&issued.token).await),
            TokenRejection::AlreadyUsed
        );
    }

    #[tokio::test]
    async fn unknown_token_is_not_found() {
        let f = fixture().await;
        assert_eq!(
            rejection(f.tokens.validate("not-a-real-token").await),
            TokenRejection::NotFound
        );
    }

    #[tokio::test]
    async fn zero_ttl_token_is_expired() {
        let f = fixture().await;
        let issued = f
            .tokens
            .issue_with_ttl("tenant_one", Duration::zero())
            .await
            .unwrap();
        assert_eq!(
            rejection(f.tokens.validate(&issued.token).await),
            TokenRejection::Expired
        );
    }

    #[tokio::test]
    async fn oversized_ttl_is_clamped() {
        let f = fixture().await;
        let before = Utc::now();
        let issued = f
            .tokens
            .issue_with_ttl("tenant_one", Duration::MAX)
            .await
            .unwrap();
        assert!(issued.expires_at >= before + ttl_from_secs(MAX_TTL_SECS));
        assert!(issued.expires_at <= Utc::now() + ttl_from_secs(MAX_TTL_SECS));
        assert!(f.tokens.validate(&issued.token).await.is_ok());
    }

    #[tokio::test]
    async fn out_of_range_ttl_is_invalid_argument() {
        let f = fixture().await;
        let err = f
            .tokens
            .issue_with_ttl("tenant_one", Duration::MIN)
            .await
            .unwrap_err();
        assert!(matches!(err, PanelError::InvalidArgument(_)));
        // Nothing was stored or audited.
        let issued = f
            .audit
            .list(50)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.action == "issue_token")
            .count();
        assert_eq!(issued, 0);
    }

    #[tokio::test]
    async fn delete_revokes_outstanding_tokens() {
        let f = fixture().await;
        let issued = f.tokens.issue("tenant_one").await.unwrap();
        f.registry.delete("tenant_one").await.unwrap();

        assert_eq!(
            rejection(f.tokens.validate(&issued.token).await),
            TokenRejection::NotFound
        );

        // Re-creating the name does not resurrect the old token.
        f.registry
            .create("tenant_one", "tenant_user", "supersafe123")
            .await
            .unwrap();
        assert_eq!(
            rejection(f.tokens.validate(&issued.token).await),
            TokenRejection::NotFound
        );
    }

    #[tokio::test]
    async fn missing_artifact_rejects_without_consuming() {
        let f = fixture().await;
        let issued = f.tokens.issue("tenant_one").await.unwrap();
        let path = f.registry.artifacts().path_for("tenant_one");
        std::fs::remove_file(&path).unwrap();

        assert_eq!(
            rejection(f.tokens.validate(&issued.token).await),
            TokenRejection::ArtifactMissing
        );

        // Once storage is repaired the same token still works.
        std::fs::write(&path, b"").unwrap();
        assert!(f.tokens.validate(&issued.token).await.is_ok());
    }

    #[tokio::test]
    async fn purge_removes_only_spent_tokens() {
        let f = fixture().await;
        let redeemed = f.tokens.issue("tenant_one").await.unwrap();
        f.tokens.validate(&redeemed.token).await.unwrap();
        f.tokens
            .issue_with_ttl("tenant_one", Duration::zero())
            .await
            .unwrap();
        let live = f.tokens.issue("tenant_one").await.unwrap();

        assert_eq!(f.tokens.purge_spent().await.unwrap(), 2);
        assert_eq!(f.tokens.purge_spent().await.unwrap(), 0);
        assert!(f.tokens.validate(&live.token).await.is_ok());

        let purges = f
            .audit
            .list(50)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.action == "purge_tokens")
            .count();
        assert_eq!(purges, 1);
    }

    #[tokio::test]
    async fn issued_token_debug_is_redacted() {
        let f = fixture().await;
        let issued = f.tokens.issue("tenant_one").await.unwrap();
        let debug = format!("{issued:?}");
        assert!(!debug.contains(&issued.token));
        assert!(debug.contains("<redacted>"));
    }
}
