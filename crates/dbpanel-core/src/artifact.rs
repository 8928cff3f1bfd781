//! Physical artifacts of managed databases.
//!
//! Every managed database owns exactly one SQLite file at
//! `<managed_dir>/<name>.db`. The path is a pure function of the name, so
//! nothing about the artifact needs to be stored in the control store.
//!
//! The synchronous methods are meant to be called from inside a
//! [`dbpanel_store::Database::transaction`] closure, which already runs on
//! the blocking pool while holding the control store lock.

use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{PanelError, PanelResult};
use crate::names;

/// File extension of every artifact.
const ARTIFACT_EXT: &str = "db";

/// Suffixes SQLite appends to the artifact path for its journal files.
const SIDE_FILE_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// Resolves, creates and removes artifact files under one directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `dir`. The directory is not touched until
    /// [`ArtifactStore::ensure_dir`] is called.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the artifact directory if needed.
    pub fn ensure_dir(&self) -> PanelResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// The artifact directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic artifact path for `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{ARTIFACT_EXT}"))
    }

    /// Whether the artifact for `name` exists as a regular file.
    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_file()
    }

    /// Paths of the SQLite journal files that may accompany `name`.
    pub fn side_paths_for(&self, name: &str) -> Vec<PathBuf> {
        SIDE_FILE_SUFFIXES
            .iter()
            .map(|suffix| self.dir.join(format!("{name}.{ARTIFACT_EXT}{suffix}")))
            .collect()
    }

    /// Allocate a zero-size artifact for `name`.
    ///
    /// A zero-length file is a valid, empty SQLite database. Creation uses
    /// `create_new`, so an existing file (an orphan left behind by a crash)
    /// is never silently adopted.
    pub fn create(&self, name: &str) -> PanelResult<PathBuf> {
        let path = self.path_for(name);
        // A stale journal would be replayed into the new database.
        if let Some(stale) = self.side_paths_for(name).into_iter().find(|p| p.exists()) {
            return Err(unavailable(
                &stale,
                "journal file exists without a registry record; run reconcile".into(),
            ));
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => {
                file.sync_all().map_err(|e| unavailable(&path, e.to_string()))?;
                debug!(path = %path.display(), "artifact created");
                Ok(path)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(unavailable(
                &path,
                "file exists without a registry record; run reconcile".into(),
            )),
            Err(e) => Err(unavailable(&path, e.to_string())),
        }
    }

    /// Remove the artifact for `name` without reporting failures.
    ///
    /// Used to undo [`ArtifactStore::create`] when the surrounding
    /// transaction fails to commit.
    pub fn discard(&self, name: &str) {
        let path = self.path_for(name);
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "failed to discard artifact");
        }
    }

    /// Remove the artifact for `name` together with its journal files.
    ///
    /// Returns `Ok(false)` if the main file was already gone.
    pub async fn remove(&self, name: &str) -> PanelResult<bool> {
        let path = self.path_for(name);
        let removed = match tokio::fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(unavailable(&path, e.to_string())),
        };
        for side in self.side_paths_for(name) {
            match tokio::fs::remove_file(&side).await {
                Ok(()) => debug!(path = %side.display(), "journal file removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(unavailable(&side, e.to_string())),
            }
        }
        debug!(path = %path.display(), removed, "artifact removed");
        Ok(removed)
    }

    /// Names of all artifacts on disk, sorted.
    ///
    /// Files whose stem is not a valid identifier (SQLite `-wal`/`-shm`
    /// side files, stray files) are ignored.
    pub fn list_names(&self) -> PanelResult<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.extension().is_none_or(|ext| ext != ARTIFACT_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && names::is_valid_identifier(stem)
            {
                names.insert(stem.to_owned());
            }
        }
        Ok(names)
    }

    /// Stems of journal files on disk (`<stem>.db-wal` and friends), sorted.
    pub fn list_side_file_names(&self) -> PanelResult<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let file_name = entry?.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            for suffix in SIDE_FILE_SUFFIXES {
                if let Some(stem) = file_name
                    .strip_suffix(suffix)
                    .and_then(|rest| rest.strip_suffix(&format!(".{ARTIFACT_EXT}")))
                    && names::is_valid_identifier(stem)
                {
                    names.insert(stem.to_owned());
                }
            }
        }
        Ok(names)
    }

    /// Remove the artifact for `name` and its journal files synchronously.
    /// Returns `Ok(false)` if the main file was already gone.
    pub fn remove_blocking(&self, name: &str) -> PanelResult<bool> {
        let path = self.path_for(name);
        let removed = match std::fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(unavailable(&path, e.to_string())),
        };
        for side in self.side_paths_for(name) {
            match std::fs::remove_file(&side) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(unavailable(&side, e.to_string())),
            }
        }
        Ok(removed)
    }
}

fn unavailable(path: &Path, reason: String) -> PanelError {
    PanelError::ArtifactUnavailable {
        path: path.to_path_buf(),
        reason,
    }
}
