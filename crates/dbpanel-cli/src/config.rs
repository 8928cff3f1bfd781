//! Configuration file loading.
//!
//! `config/default.toml` carries the panel settings at the top level and
//! the HTTP settings under `[web]`:
//!
//! ```toml
//! data_dir = "data"
//! token_ttl_secs = 300
//!
//! [web]
//! bind_addr = "127.0.0.1"
//! port = 8080
//! ```
//!
//! A missing file yields defaults. `DBPANEL_*` environment variables
//! (including those from a `.env` file) override the file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use dbpanel_core::PanelConfig;
use dbpanel_web::WebConfig;

/// Everything read from the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    #[serde(flatten)]
    pub panel: PanelConfig,
    pub web: WebConfig,
}

impl FileConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid configuration file")
    }

    /// Load `path` and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Self::from_toml_str(&content)?
        } else {
            debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };
        config.panel.apply_env_overrides()?;
        Ok(config)
    }
}
