use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use logbook::cli::{list, plans, read, scan, search, stats, tag};
use logbook::config::Config;
use logbook::scanner::Scanner;
use logbook::store::SessionStore;

#[derive(Parser)]
#[command(name = "logbook")]
#[command(about = "Coding assistant session log ingestion and indexing")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "logbook.yaml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scan pass over the log root
    Scan,

    /// Run scan passes on the configured interval
    Watch,

    /// List sessions
    List {
        /// Filter by project path substring
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Read a session
    Read {
        /// Session ID (full or prefix)
        session_id: String,

        /// Show tool calls
        #[arg(long)]
        tools: bool,
    },

    /// Full-text search over message content
    Search {
        query: String,

        /// Search prompt history instead of messages
        #[arg(long)]
        prompts: bool,
    },

    /// List imported plans, or show one by name
    Plans {
        /// Plan name (file stem)
        name: Option<String>,
    },

    /// Tag a session by hand
    Tag {
        /// Session ID (full or prefix)
        session_id: String,
        /// Tag label
        label: String,
    },

    /// Show store statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load config
    let config = Config::load(&cli.config)?;

    // Initialize store
    let store = Arc::new(SessionStore::open(&config.database_path())?);

    match cli.command {
        Commands::Scan => {
            let scanner = Arc::new(Scanner::new(config, Arc::clone(&store))?);
            scan::run(&scanner).await?;
        }
        Commands::Watch => {
            let scanner = Arc::new(Scanner::new(config, Arc::clone(&store))?);
            scanner.watch().await?;
        }
        Commands::List { project } => {
            list::run(&store, project.as_deref())?;
        }
        Commands::Read { session_id, tools } => {
            read::run(&store, &session_id, tools)?;
        }
        Commands::Search { query, prompts } => {
            search::run(&store, &query, prompts)?;
        }
        Commands::Plans { name } => {
            plans::run(&store, name.as_deref())?;
        }
        Commands::Tag { session_id, label } => {
            tag::run(&store, &session_id, &label)?;
        }
        Commands::Stats => {
            stats::run(&store)?;
        }
    }

    Ok(())
}
