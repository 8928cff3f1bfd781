//! CLI entry point for dbpanel.
//!
//! This binary provides the `dbpanel` command: `serve` runs the HTTP API,
//! every other subcommand performs one panel operation against the local
//! data directory and prints the result as JSON.

mod cli;
mod config;
mod helpers;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::info;

use dbpanel_core::Panel;
use dbpanel_web::WebServer;

use crate::cli::{Cli, Commands};
use crate::config::FileConfig;
use crate::helpers::{init_tracing, print_json};

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let default_level = match cli.command {
        Commands::Serve { .. } => "info",
        _ => "warn",
    };
    init_tracing(default_level, cli.json);

    let file_config = FileConfig::load(&cli.config)?;
    let panel = Panel::open(file_config.panel.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open panel at {}",
                file_config.panel.data_dir.display()
            )
        })?;

    match cli.command {
        Commands::Serve { bind, port } => {
            let mut web = file_config.web;
            if let Some(bind) = bind {
                web.bind_addr = bind;
            }
            if let Some(port) = port {
                web.port = port;
            }
            cmd_serve(panel, web).await
        }
        Commands::Create {
            name,
            user,
            password,
        } => {
            let created = panel.create_database(&name, &user, &password).await?;
            print_json(&json!({ "status": "created", "database": created }))
        }
        Commands::Delete { name } => {
            panel.delete_database(&name).await?;
            print_json(&json!({ "status": "deleted", "db_name": name }))
        }
        Commands::Rotate { name, password } => {
            panel.rotate_password(&name, &password).await?;
            print_json(&json!({ "status": "password_updated", "db_name": name }))
        }
        Commands::Token { name } => {
            let issued = panel.issue_inspection_token(&name).await?;
            print_json(&json!({
                "url": format!("/inspect/{}", issued.token),
                "token": issued.token,
                "expires_at": issued.expires_at,
            }))
        }
        Commands::Redeem { token } => {
            let inspection = panel
                .redeem_inspection_token(&token)
                .await
                .map_err(|e| match e {
                    dbpanel_core::PanelError::InvalidToken(reason) => {
                        anyhow::anyhow!(reason.public_message())
                    }
                    other => other.into(),
                })?;
            print_json(&inspection)
        }
        Commands::List => {
            let items = panel.list_databases().await?;
            print_json(&json!({ "items": items }))
        }
        Commands::Audit { limit } => {
            let items = panel.list_audit_log(limit).await?;
            print_json(&json!({ "items": items }))
        }
        Commands::Reconcile => {
            let report = panel.reconcile().await?;
            print_json(&report)
        }
        Commands::PurgeTokens => {
            let purged = panel.purge_expired_tokens().await?;
            print_json(&json!({ "purged": purged }))
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: serve
// ---------------------------------------------------------------------------

async fn cmd_serve(panel: Panel, web: dbpanel_web::WebConfig) -> Result<()> {
    let report = panel
        .reconcile()
        .await
        .context("startup reconciliation failed")?;
    if !report.is_consistent() {
        tracing::warn!(
            missing = report.missing_artifacts.len(),
            orphaned = report.orphaned_artifacts.len(),
            "metadata and artifacts disagreed at startup"
        );
    }

    let server = WebServer::new(web, panel);
    info!(addr = %server.addr(), "dbpanel ready");
    server.start().await.context("web server failed")?;
    Ok(())
}
