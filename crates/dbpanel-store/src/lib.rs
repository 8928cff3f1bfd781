//! # dbpanel-store
//!
//! Control store for dbpanel.
//!
//! A single SQLite database holds every piece of panel metadata: the
//! managed database registry, per-database credentials, inspection
//! tokens and the audit trail. Tenant data never lives here; each
//! managed database is a separate artifact file owned by `dbpanel-core`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Database (rusqlite WAL, one writer)    │
//! │    execute / transaction on the         │
//! │    blocking pool                        │
//! ├─────────────────────────────────────────┤
//! │  Migrations (versioned, transactional)  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use dbpanel_store::Database;
//!
//! let db = Database::open_and_migrate("data/panel.db").await?;
//! let rows: i64 = db
//!     .execute(|conn| Ok(conn.query_row("SELECT count(*) FROM managed_databases", [], |r| r.get(0))?))
//!     .await?;
//! ```

pub mod db;
pub mod error;
pub mod migration;

// ── re-exports ───────────────────────────────────────────────────────

pub use db::Database;
pub use error::{StoreError, StoreResult};
