//! CLI argument definitions for dbpanel.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// dbpanel -- tenant database provisioning.
#[derive(Parser)]
#[command(
    name = "dbpanel",
    version,
    about = "dbpanel -- tenant database provisioning",
    long_about = "Provision per-tenant SQLite databases, manage their credentials, \
                  and hand out single-use inspection tokens. Every command prints \
                  JSON on stdout."
)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API.
    Serve {
        /// Address to bind the HTTP server to.
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on.
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Provision a managed database.
    Create {
        /// Database name.
        name: String,
        /// Owning user name.
        user: String,
        /// Initial password.
        #[arg(long, env = "DBPANEL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Delete a managed database, its credential and its tokens.
    Delete {
        /// Database name.
        name: String,
    },

    /// Rotate the credential of a managed database.
    Rotate {
        /// Database name.
        name: String,
        /// New password.
        #[arg(long, env = "DBPANEL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Issue a single-use inspection token.
    Token {
        /// Database name.
        name: String,
    },

    /// Redeem an inspection token and list the database's tables.
    Redeem {
        /// The token to redeem.
        token: String,
    },

    /// List managed databases, newest first.
    List,

    /// Show the audit trail, newest first.
    Audit {
        /// Maximum number of entries.
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Compare registry records with artifacts on disk and remove orphans.
    Reconcile,

    /// Delete redeemed and expired tokens.
    PurgeTokens,
}
