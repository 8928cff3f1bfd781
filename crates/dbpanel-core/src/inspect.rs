//! Read-only introspection of managed database artifacts.

use std::path::Path;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, instrument};

use crate::error::{PanelError, PanelResult};

/// Opens artifacts read-only and lists their user tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct InspectionGateway;

impl InspectionGateway {
    /// Create a gateway. It holds no state; every call opens the artifact anew.
    pub fn new() -> Self {
        Self
    }

    /// Names of the user tables in the artifact at `path`, sorted.
    ///
    /// SQLite's internal `sqlite_*` tables are excluded. A freshly
    /// provisioned (zero-size) artifact yields an empty list. The artifact
    /// is never written to.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn list_tables(&self, path: &Path) -> PanelResult<Vec<String>> {
        let owned = path.to_path_buf();
        let tables = tokio::task::spawn_blocking(move || read_table_names(&owned)).await??;
        debug!(count = tables.len(), "artifact inspected");
        Ok(tables)
    }
}

fn read_table_names(path: &Path) -> PanelResult<Vec<String>> {
    let unavailable = |e: rusqlite::Error| PanelError::ArtifactUnavailable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if !path.is_file() {
        return Err(PanelError::ArtifactUnavailable {
            path: path.to_path_buf(),
            reason: "file does not exist".into(),
        });
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(unavailable)?;

    let mut stmt = conn
        .prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .map_err(unavailable)?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(unavailable)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(unavailable)?;
    Ok(names)
}
