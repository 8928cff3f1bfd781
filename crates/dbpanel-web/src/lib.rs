//! HTTP interface for dbpanel.
//!
//! This crate exposes the provisioning core over a small JSON API:
//!
//! - Management endpoints under `/api/databases` for create, delete,
//!   credential rotation and inspection token issuance.
//! - `GET /inspect/{token}`, the only endpoint a token holder calls.
//! - `GET /api/audit-logs` and `GET /api/health` for operators.
//!
//! There is no authentication layer; the server is meant to be bound to a
//! trusted interface.

pub mod api;
pub mod server;
pub mod state;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use server::WebServer;
pub use state::AppState;

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

/// Errors raised while starting or running the server.
#[derive(Debug, Error)]
pub enum WebError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}
