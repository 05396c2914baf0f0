//! Command-line interface.
//!
//! Parses arguments and dispatches to command implementations. Every
//! long-running service (worker, outbox publisher, email intake) is its
//! own subcommand so deployments can scale them independently.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::models::OverrideRequest;

#[derive(Parser)]
#[command(name = "docroute")]
#[command(about = "Insurance document classification and routing pipeline")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to docroute.toml when present)
    #[arg(short, long, global = true, env = "DOCROUTE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Submit a file into the pipeline
    Submit {
        /// File to submit
        file: PathBuf,
        /// Account number, when already known
        #[arg(long)]
        account: Option<String>,
        /// Policyholder name, when already known
        #[arg(long)]
        policyholder: Option<String>,
        /// Policy number, when already known
        #[arg(long)]
        policy: Option<String>,
        /// Claim number, when already known
        #[arg(long)]
        claim: Option<String>,
    },

    /// Run the pipeline worker (extraction, classification, routing)
    Worker,

    /// Run the outbox publisher
    Outbox {
        /// Drain the outbox once and exit instead of polling forever
        #[arg(long)]
        once: bool,
    },

    /// Poll the email inbox and submit attachments
    Intake {
        /// Scan the inbox once and exit
        #[arg(long)]
        once: bool,
    },

    /// Override classification or summary of a settled document
    Override {
        /// Document id
        document_id: String,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        subcategory: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long = "action-items")]
        action_items: Option<String>,
    },

    /// Show a document by id, or list documents by status
    Show {
        /// Document id; omit to list by status
        document_id: Option<String>,
        /// Status filter for listing (pending, processed, ...)
        #[arg(long)]
        status: Option<String>,
        /// Maximum rows when listing
        #[arg(long, default_value = "20")]
        limit: i64,
    },

    /// Manage the classification hierarchy
    Hierarchy {
        #[command(subcommand)]
        command: HierarchyCommands,
    },
}

#[derive(Subcommand)]
enum HierarchyCommands {
    /// Add a department/category/subcategory triple
    Add {
        department: String,
        category: String,
        subcategory: String,
    },
    /// List all known triples
    List,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Migrate => commands::migrate(&config).await,
        Commands::Submit {
            file,
            account,
            policyholder,
            policy,
            claim,
        } => {
            let ctx = commands::AppContext::init(config).await?;
            commands::submit(&ctx, &file, account, policyholder, policy, claim).await
        }
        Commands::Worker => {
            let ctx = commands::AppContext::init(config).await?;
            commands::worker(&ctx).await
        }
        Commands::Outbox { once } => {
            let ctx = commands::AppContext::init(config).await?;
            commands::outbox(&ctx, once).await
        }
        Commands::Intake { once } => {
            let ctx = commands::AppContext::init(config).await?;
            commands::intake(&ctx, once).await
        }
        Commands::Override {
            document_id,
            department,
            category,
            subcategory,
            summary,
            action_items,
        } => {
            let ctx = commands::AppContext::init(config).await?;
            let request = OverrideRequest {
                department,
                category,
                subcategory,
                summary,
                action_items,
            };
            commands::override_document(&ctx, &document_id, &request).await
        }
        Commands::Show {
            document_id,
            status,
            limit,
        } => {
            let ctx = commands::AppContext::init(config).await?;
            commands::show(&ctx, document_id.as_deref(), status.as_deref(), limit).await
        }
        Commands::Hierarchy { command } => {
            let ctx = commands::AppContext::init(config).await?;
            match command {
                HierarchyCommands::Add {
                    department,
                    category,
                    subcategory,
                } => commands::hierarchy_add(&ctx, &department, &category, &subcategory).await,
                HierarchyCommands::List => commands::hierarchy_list(&ctx).await,
            }
        }
    }
}
