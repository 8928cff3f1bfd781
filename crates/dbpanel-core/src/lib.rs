//! # dbpanel-core
//!
//! Tenant database provisioning: lifecycle of managed SQLite databases,
//! their credentials, single-use inspection tokens and an append-only
//! audit trail.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Panel (facade used by HTTP and CLI)                 │
//! ├──────────────┬──────────────┬────────────────────────┤
//! │  Registry    │ TokenManager │  InspectionGateway     │
//! │  (+ Creds)   │              │  (read-only artifacts) │
//! ├──────────────┴──────────────┴────────────────────────┤
//! │  AuditLog                                            │
//! ├──────────────────────────────────────────────────────┤
//! │  dbpanel-store (control store)  │  ArtifactStore     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Every check-then-act sequence (create, delete, rotate, issue, redeem)
//! runs inside one `BEGIN IMMEDIATE` transaction on the control store, so
//! concurrent callers are serialised per operation. Audit entries are
//! written after the primary effect commits and never roll it back.
//!
//! ## Quick start
//!
//! ```ignore
//! use dbpanel_core::{Panel, PanelConfig};
//!
//! let panel = Panel::open(PanelConfig::with_data_dir("data")).await?;
//! panel.create_database("tenant_one", "tenant_user", "supersafe123").await?;
//! let issued = panel.issue_inspection_token("tenant_one").await?;
//! let inspection = panel.redeem_inspection_token(&issued.token).await?;
//! ```

pub mod artifact;
pub mod audit;
pub mod config;
pub mod credentials;
pub mod error;
pub mod inspect;
pub mod names;
pub mod panel;
pub mod registry;
pub mod tokens;

// ── re-exports ───────────────────────────────────────────────────────

pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use config::PanelConfig;
pub use error::{PanelError, PanelResult, TokenRejection};
pub use panel::{Health, Inspection, Panel};
pub use registry::{ManagedDatabase, ReconcileReport};
pub use tokens::{IssuedToken, Redemption};
