//! REST API route handlers.
//!
//! Handlers translate JSON bodies into [`Panel`](dbpanel_core::Panel) calls
//! and map [`PanelError`] variants onto status codes in one place,
//! [`error_response`].

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use dbpanel_core::{AuditEntry, ManagedDatabase, PanelError};

use crate::state::AppState;

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Map a core error to a status code and JSON body.
///
/// Token rejections only ever expose their public message, so a client
/// cannot tell a never-issued token from an expired one. Server errors are
/// logged in full and answered with a generic body, since their messages
/// carry filesystem paths.
pub fn error_response(err: &PanelError) -> (StatusCode, Json<Value>) {
    let status = match err {
        PanelError::AlreadyExists { .. } => StatusCode::CONFLICT,
        PanelError::NotFound { .. } => StatusCode::NOT_FOUND,
        PanelError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
        PanelError::InvalidName { .. } | PanelError::InvalidArgument(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PanelError::ArtifactUnavailable { .. }
        | PanelError::Config(_)
        | PanelError::Store(_)
        | PanelError::Vault(_)
        | PanelError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let message = match err {
        PanelError::InvalidToken(reason) => reason.public_message().to_owned(),
        _ if status.is_server_error() => {
            tracing::error!(error = %err, "request failed");
            "internal error".to_owned()
        }
        other => other.to_string(),
    };

    (status, Json(json!({ "error": message })))
}

// ---------------------------------------------------------------------------
// Managed databases
// ---------------------------------------------------------------------------

/// One managed database in a listing.
#[derive(Serialize)]
pub struct DatabaseResponse {
    pub db_name: String,
    pub user: String,
    pub created_at: String,
}

impl From<ManagedDatabase> for DatabaseResponse {
    fn from(db: ManagedDatabase) -> Self {
        Self {
            db_name: db.db_name,
            user: db.user,
            created_at: db.created_at.to_rfc3339(),
        }
    }
}

/// Request body for creating a managed database.
#[derive(Deserialize)]
pub struct CreateDatabaseBody {
    pub db_name: String,
    pub user: String,
    pub password: String,
}

/// Request body for rotating a credential.
#[derive(Deserialize)]
pub struct RotatePasswordBody {
    pub new_password: String,
}

/// GET /api/databases: List managed databases, newest first.
pub async fn list_databases(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.panel.list_databases().await {
        Ok(databases) => {
            let items: Vec<DatabaseResponse> =
                databases.into_iter().map(DatabaseResponse::from).collect();
            (StatusCode::OK, Json(json!({ "items": items })))
        }
        Err(e) => error_response(&e),
    }
}

/// POST /api/databases: Provision a managed database.
pub async fn create_database(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateDatabaseBody>,
) -> impl IntoResponse {
    match state
        .panel
        .create_database(&body.db_name, &body.user, &body.password)
        .await
    {
        Ok(_) => (StatusCode::CREATED, Json(json!({ "status": "created" }))),
        Err(e) => error_response(&e),
    }
}

/// DELETE /api/databases/{name}: Delete a managed database.
pub async fn delete_database(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.panel.delete_database(&name).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "deleted" }))),
        Err(e) => error_response(&e),
    }
}

/// POST /api/databases/{name}/password: Rotate the credential.
pub async fn rotate_password(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(body): Json<RotatePasswordBody>,
) -> impl IntoResponse {
    match state.panel.rotate_password(&name, &body.new_password).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "password_updated" }))),
        Err(e) => error_response(&e),
    }
}

// ---------------------------------------------------------------------------
// Inspection
// ---------------------------------------------------------------------------

/// POST /api/databases/{name}/inspection-token: Issue a single-use token.
pub async fn issue_inspection_token(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.panel.issue_inspection_token(&name).await {
        Ok(issued) => (
            StatusCode::OK,
            Json(json!({
                "url": format!("/inspect/{}", issued.token),
                "token": issued.token,
                "expires_at": issued.expires_at.to_rfc3339(),
            })),
        ),
        Err(e) => error_response(&e),
    }
}

/// GET /inspect/{token}: Redeem a token and list the database's tables.
pub async fn inspect(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    match state.panel.redeem_inspection_token(&token).await {
        Ok(inspection) => (StatusCode::OK, Json(json!(inspection))),
        Err(e) => error_response(&e),
    }
}

// ---------------------------------------------------------------------------
// Audit & health
// ---------------------------------------------------------------------------

/// One audit entry in a listing.
#[derive(Serialize)]
pub struct AuditEntryResponse {
    pub action: String,
    pub db_name: String,
    pub user: Option<String>,
    pub detail: Option<String>,
    pub created_at: String,
}

impl From<AuditEntry> for AuditEntryResponse {
    fn from(entry: AuditEntry) -> Self {
        Self {
            action: entry.action,
            db_name: entry.db_name,
            user: entry.user,
            detail: entry.detail,
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// Query parameters of the audit listing.
#[derive(Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

/// GET /api/audit-logs: Most recent audit entries first.
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> impl IntoResponse {
    match state.panel.list_audit_log(query.limit).await {
        Ok(entries) => {
            let items: Vec<AuditEntryResponse> =
                entries.into_iter().map(AuditEntryResponse::from).collect();
            (StatusCode::OK, Json(json!({ "items": items })))
        }
        Err(e) => error_response(&e),
    }
}

/// GET /api/health: Control store and artifact directory liveness.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.panel.health().await;
    let status = if health.is_healthy() {
        StatusCode::OK
    } else {
        tracing::warn!(?health, "health check failed");
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(json!({
            "status": if health.is_healthy() { "healthy" } else { "degraded" },
            "version": env!("CARGO_PKG_VERSION"),
            "checks": health,
        })),
    )
}
