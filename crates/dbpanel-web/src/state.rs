//! Shared application state for the web server.
//!
//! [`AppState`] is wrapped in an `Arc` and shared across all request
//! handlers. The [`Panel`] inside is itself a cheap handle over the control
//! store, so handlers never hold a lock across an `await`.

use dbpanel_core::Panel;

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// The provisioning core.
    pub panel: Panel,
}
