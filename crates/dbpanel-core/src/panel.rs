//! The `Panel` facade: one handle over every lifecycle component.
//!
//! Transports (HTTP, CLI) hold an `Arc<Panel>` or a clone and call the
//! operations below; they never touch the control store directly.

use std::time::Instant;

use chrono::Duration;
use serde::Serialize;
use tracing::{info, instrument};

use dbpanel_store::Database;

use crate::artifact::ArtifactStore;
use crate::audit::{AuditEntry, AuditLog};
use crate::config::PanelConfig;
use crate::credentials::CredentialStore;
use crate::error::PanelResult;
use crate::inspect::InspectionGateway;
use crate::registry::{ManagedDatabase, ReconcileReport, Registry};
use crate::tokens::{IssuedToken, TokenManager};

/// What a redeemed inspection token grants: the table listing of one
/// managed database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inspection {
    pub db_name: String,
    /// User table names, sorted.
    pub tables: Vec<String>,
}

/// Liveness summary of the control store and artifact directory.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    /// The control store answered a query.
    pub control_store: bool,
    /// The artifact directory exists.
    pub managed_dir: bool,
    /// Registered databases; 0 when the control store is down.
    pub databases: usize,
}

impl Health {
    /// Healthy when both the control store and artifact directory are up.
    pub fn is_healthy(&self) -> bool {
        self.control_store && self.managed_dir
    }
}

/// Entry point to the provisioning core.
#[derive(Clone)]
pub struct Panel {
    config: PanelConfig,
    db: Database,
    registry: Registry,
    credentials: CredentialStore,
    tokens: TokenManager,
    audit: AuditLog,
    gateway: InspectionGateway,
}

impl Panel {
    /// Open (or initialise) the control store and artifact directory
    /// described by `config`.
    #[instrument(skip_all, fields(data_dir = %config.data_dir.display()))]
    pub async fn open(config: PanelConfig) -> PanelResult<Self> {
        let started = Instant::now();

        std::fs::create_dir_all(&config.data_dir)?;
        let artifacts = ArtifactStore::new(config.managed_dir_path());
        artifacts.ensure_dir()?;

        let db = Database::open_and_migrate(config.control_db_path()).await?;
        let panel = Self::assemble(config, db, artifacts);

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "panel opened"
        );
        Ok(panel)
    }

    fn assemble(config: PanelConfig, db: Database, artifacts: ArtifactStore) -> Self {
        let audit = AuditLog::new(db.clone());
        let credentials = CredentialStore::new(db.clone(), config.pbkdf2_iterations);
        let registry = Registry::new(
            db.clone(),
            artifacts.clone(),
            credentials.clone(),
            audit.clone(),
        );
        let tokens = TokenManager::new(
            db.clone(),
            artifacts,
            audit.clone(),
            config.token_ttl_secs,
        );
        Self {
            config,
            db,
            registry,
            credentials,
            tokens,
            audit,
            gateway: InspectionGateway::new(),
        }
    }

    /// Effective configuration.
    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Managed database registry, for callers that need artifact paths.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ── lifecycle ──────────────────────────────────────────────────────

    pub async fn create_database(
        &self,
        db_name: &str,
        user: &str,
        password: &str,
    ) -> PanelResult<ManagedDatabase> {
        self.registry.create(db_name, user, password).await
    }

    pub async fn delete_database(&self, db_name: &str) -> PanelResult<()> {
        self.registry.delete(db_name).await
    }

    pub async fn rotate_password(&self, db_name: &str, new_password: &str) -> PanelResult<()> {
        self.registry.rotate_credential(db_name, new_password).await
    }

    /// All managed databases, newest first.
    pub async fn list_databases(&self) -> PanelResult<Vec<ManagedDatabase>> {
        self.registry.list().await
    }

    /// Check a password against the stored credential of `db_name`.
    pub async fn verify_credential(&self, db_name: &str, password: &str) -> PanelResult<bool> {
        self.credentials.verify(db_name, password).await
    }

    // ── inspection ─────────────────────────────────────────────────────

    /// Issue a single-use inspection token with the configured lifetime.
    pub async fn issue_inspection_token(&self, db_name: &str) -> PanelResult<IssuedToken> {
        self.tokens.issue(db_name).await
    }

    /// Issue a single-use inspection token valid for `ttl`.
    pub async fn issue_inspection_token_with_ttl(
        &self,
        db_name: &str,
        ttl: Duration,
    ) -> PanelResult<IssuedToken> {
        self.tokens.issue_with_ttl(db_name, ttl).await
    }

    /// Consume `token` and list the tables of the database it grants.
    ///
    /// The token is spent once validation succeeds, even if the listing
    /// itself then fails.
    pub async fn redeem_inspection_token(&self, token: &str) -> PanelResult<Inspection> {
        let redemption = self.tokens.validate(token).await?;
        let tables = self.gateway.list_tables(&redemption.artifact_path).await?;
        Ok(Inspection {
            db_name: redemption.db_name,
            tables,
        })
    }

    // ── audit & maintenance ────────────────────────────────────────────

    /// Most recent audit entries first, capped at `limit` or the
    /// configured default.
    pub async fn list_audit_log(&self, limit: Option<usize>) -> PanelResult<Vec<AuditEntry>> {
        self.audit
            .list(limit.unwrap_or(self.config.audit_limit))
            .await
    }

    /// Compare registry records with artifacts on disk and remove orphans.
    pub async fn reconcile(&self) -> PanelResult<ReconcileReport> {
        self.registry.reconcile().await
    }

    /// Hard-delete redeemed and expired tokens. Returns how many went.
    pub async fn purge_expired_tokens(&self) -> PanelResult<usize> {
        self.tokens.purge_spent().await
    }

    /// Check the control store and artifact directory.
    pub async fn health(&self) -> Health {
        let databases = self
            .db
            .execute(|conn| {
                let n: i64 =
                    conn.query_row("SELECT COUNT(*) FROM managed_databases", [], |row| {
                        row.get(0)
                    })?;
                Ok(n)
            })
            .await;
        Health {
            control_store: databases.is_ok(),
            managed_dir: self.registry.artifacts().dir().is_dir(),
            databases: databases
                .ok()
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn panel() -> (tempfile::TempDir, Panel) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PanelConfig::with_data_dir(dir.path());
        config.pbkdf2_iterations = 1_000;
        let panel = Panel::open(config).await.unwrap();
        (dir, panel)
    }

    #[tokio::test]
    async fn open_creates_layout() {
        let (dir, panel) = panel().await;
        assert!(dir.path().join("panel.db").is_file());
        assert!(dir.path().join("managed_dbs").is_dir());
        let health = panel.health().await;
        assert!(health.is_healthy());
        assert_eq!(health.databases, 0);
    }

    #[tokio::test]
    async fn reopen_sees_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PanelConfig::with_data_dir(dir.path());
        config.pbkdf2_iterations = 1_000;
        {
            let panel = Panel::open(config.clone()).await.unwrap();
            panel
                .create_database("tenant_one", "tenant_user", "supersafe123")
                .await
                .unwrap();
        }
        let panel = Panel::open(config).await.unwrap();
        let names: Vec<String> = panel
            .list_databases()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.db_name)
            .collect();
        assert_eq!(names, vec!["tenant_one"]);
        assert!(
            panel
                .verify_credential("tenant_one", "supersafe123")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn redeem_lists_tables() {
        let (_dir, panel) = panel().await;
        panel
            .create_database("tenant_one", "tenant_user", "supersafe123")
            .await
            .unwrap();
        let issued = panel.issue_inspection_token("tenant_one").await.unwrap();
        let inspection = panel.redeem_inspection_token(&issued.token).await.unwrap();
        assert_eq!(inspection.db_name, "tenant_one");
        assert!(inspection.tables.is_empty());
    }

    #[tokio::test]
    async fn audit_limit_defaults_to_config() {
        let (_dir, panel) = panel().await;
        panel
            .create_database("tenant_one", "tenant_user", "supersafe123")
            .await
            .unwrap();
        for _ in 0..3 {
            panel.issue_inspection_token("tenant_one").await.unwrap();
        }
        assert_eq!(panel.list_audit_log(None).await.unwrap().len(), 4);
        assert_eq!(panel.list_audit_log(Some(2)).await.unwrap().len(), 2);
    }
}
