use clap::{Parser, Subcommand};

/// Sataplan — goal tracking backend with one-time QR access
#[derive(Parser)]
#[command(name = "sataplan", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Port to bind
        #[arg(short, long, default_value = "8000")]
        port: u16,
    },

    /// Manage one-time access tokens
    Token {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a new access token for a goal
    Issue {
        #[arg(long)]
        goal_id: i64,
        /// Seconds until the token expires; omit for use-only expiry
        #[arg(long)]
        ttl_secs: Option<i64>,
    },
    /// List tokens issued for a goal
    List {
        #[arg(long)]
        goal_id: i64,
    },
    /// Revoke an unused token
    Revoke {
        #[arg(long)]
        token_id: String,
    },
}
