//! Main web server setup and startup.
//!
//! [`WebServer`] composes the Axum router, registers all routes, and starts
//! the HTTP listener.

use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::routing::{delete, get, post};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use dbpanel_core::Panel;

use crate::state::AppState;
use crate::{WebConfig, WebError, api};

/// The dbpanel HTTP server.
pub struct WebServer {
    config: WebConfig,
    state: Arc<AppState>,
}

impl WebServer {
    /// Create a new web server over an opened [`Panel`].
    pub fn new(config: WebConfig, panel: Panel) -> Self {
        let state = Arc::new(AppState { panel });
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Build the Axum router with all routes registered.
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::DELETE])
            .allow_headers(Any);

        Router::new()
            // Managed databases.
            .route(
                "/api/databases",
                get(api::list_databases).post(api::create_database),
            )
            .route("/api/databases/{name}", delete(api::delete_database))
            .route(
                "/api/databases/{name}/password",
                post(api::rotate_password),
            )
            .route(
                "/api/databases/{name}/inspection-token",
                post(api::issue_inspection_token),
            )
            // Token redemption.
            .route("/inspect/{token}", get(api::inspect))
            // Operator endpoints.
            .route("/api/audit-logs", get(api::list_audit_logs))
            .route("/api/health", get(api::health))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Bind the configured address and serve until shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(self) -> Result<(), WebError> {
        let addr = self.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| WebError::Bind {
                addr: addr.clone(),
                source,
            })?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), WebError> {
        let router = self.router();
        match listener.local_addr() {
            Ok(local) => tracing::info!(addr = %local, "starting web server"),
            Err(_) => tracing::info!(addr = %self.addr(), "starting web server"),
        }
        axum::serve(listener, router).await?;
        Ok(())
    }
}
