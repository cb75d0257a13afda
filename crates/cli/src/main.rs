//! District Vinyl CLI - catalog and account management tools.
//!
//! # Usage
//!
//! ```bash
//! # Insert every product in a catalog file
//! dv-cli seed --file catalog.yaml
//!
//! # Validate a catalog without writing anything
//! dv-cli seed --file catalog.yaml --dry-run
//!
//! # Give an existing account the admin role
//! dv-cli admin promote --email owner@example.com
//!
//! # Take it away again
//! dv-cli admin demote --email owner@example.com
//! ```
//!
//! Both commands talk to the remote data service with `BACKEND_URL` and the
//! service key in `BACKEND_SERVICE_KEY`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use district_vinyl_core::UserRole;

mod commands;

#[derive(Parser)]
#[command(name = "dv-cli")]
#[command(author, version, about = "District Vinyl CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert catalog products into the remote data service
    Seed {
        /// Catalog YAML file
        #[arg(short, long)]
        file: PathBuf,

        /// Validate the catalog without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage admin accounts
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Grant the admin role to an existing account
    Promote {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Return an admin account to the customer role
    Demote {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Seed { file, dry_run } => commands::seed::catalog(&file, dry_run).await?,
        Commands::Admin { action } => match action {
            AdminAction::Promote { email } => {
                commands::admin::set_role(&email, UserRole::Admin).await?;
            }
            AdminAction::Demote { email } => {
                commands::admin::set_role(&email, UserRole::Customer).await?;
            }
        },
    }
    Ok(())
}
