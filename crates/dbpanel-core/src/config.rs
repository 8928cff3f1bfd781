//! Panel configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, TOML
//! parsed by [`PanelConfig::from_toml_str`], and `DBPANEL_*` environment
//! variables.
//!
//! ```toml
//! data_dir = "data"
//! control_db = "panel.db"
//! managed_dir = "managed_dbs"
//! token_ttl_secs = 300
//! audit_limit = 200
//! pbkdf2_iterations = 600000
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PanelError, PanelResult};

/// Default inspection token lifetime in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 300;

/// Default number of audit entries returned by a listing.
pub const DEFAULT_AUDIT_LIMIT: usize = 200;

/// Configuration for the lifecycle core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Root directory for all panel state.
    pub data_dir: PathBuf,
    /// Control store file name, relative to `data_dir`.
    pub control_db: PathBuf,
    /// Directory of managed database artifacts, relative to `data_dir`.
    pub managed_dir: PathBuf,
    /// Lifetime of a freshly issued inspection token.
    pub token_ttl_secs: u64,
    /// Default cap on audit log listings.
    pub audit_limit: usize,
    /// PBKDF2 work factor for new credential hashes.
    pub pbkdf2_iterations: u32,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            control_db: PathBuf::from("panel.db"),
            managed_dir: PathBuf::from("managed_dbs"),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            audit_limit: DEFAULT_AUDIT_LIMIT,
            pbkdf2_iterations: dbpanel_vault::crypto::DEFAULT_ITERATIONS,
        }
    }
}

impl PanelConfig {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> PanelResult<Self> {
        toml::from_str(content).map_err(|e| PanelError::Config(format!("invalid TOML: {e}")))
    }

    /// Apply `DBPANEL_DATA_DIR`, `DBPANEL_TOKEN_TTL_SECS` and
    /// `DBPANEL_PBKDF2_ITERATIONS` from the process environment.
    pub fn apply_env_overrides(&mut self) -> PanelResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) -> PanelResult<()> {
        if let Some(dir) = get("DBPANEL_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(ttl) = get("DBPANEL_TOKEN_TTL_SECS") {
            self.token_ttl_secs = ttl
                .parse()
                .map_err(|e| PanelError::Config(format!("DBPANEL_TOKEN_TTL_SECS: {e}")))?;
        }
        if let Some(iterations) = get("DBPANEL_PBKDF2_ITERATIONS") {
            self.pbkdf2_iterations = iterations
                .parse()
                .map_err(|e| PanelError::Config(format!("DBPANEL_PBKDF2_ITERATIONS: {e}")))?;
        }
        Ok(())
    }

    /// Full path of the control store.
    pub fn control_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.control_db)
    }

    /// Full path of the artifact directory.
    pub fn managed_dir_path(&self) -> PathBuf {
        self.data_dir.join(&self.managed_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PanelConfig::default();
        assert_eq!(config.token_ttl_secs, 300);
        assert_eq!(config.audit_limit, 200);
        assert_eq!(config.control_db_path(), PathBuf::from("data/panel.db"));
        assert_eq!(config.managed_dir_path(), PathBuf::from("data/managed_dbs"));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PanelConfig::from_toml_str("data_dir = \"/srv/panel\"\ntoken_ttl_secs = 60\n")
            .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/panel"));
        assert_eq!(config.token_ttl_secs, 60);
        assert_eq!(config.audit_limit, DEFAULT_AUDIT_LIMIT);
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let err = PanelConfig::from_toml_str("token_ttl_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, PanelError::Config(_)));
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = PanelConfig::default();
        config
            .apply_overrides(|key| match key {
                "DBPANEL_DATA_DIR" => Some("/tmp/panel".into()),
                "DBPANEL_TOKEN_TTL_SECS" => Some("5".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/panel"));
        assert_eq!(config.token_ttl_secs, 5);
        assert_eq!(config.pbkdf2_iterations, dbpanel_vault::crypto::DEFAULT_ITERATIONS);
    }

    #[test]
    fn malformed_override_is_rejected() {
        let mut config = PanelConfig::default();
        let err = config
            .apply_overrides(|key| (key == "DBPANEL_PBKDF2_ITERATIONS").then(|| "many".into()))
            .unwrap_err();
        assert!(matches!(err, PanelError::Config(_)));
    }
}
