//! Main Entrypoint for the Teach.it Console Client
//!
//! This binary is responsible for:
//! 1. Parsing the command line.
//! 2. Loading configuration from the environment and applying flag overrides.
//! 3. Initializing logging on stderr.
//! 4. Selecting the tutoring backend.
//! 5. Running the interactive console on stdin/stdout.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use teachit_client::{
    config::{Backend, Config},
    driver::Console,
    state::AppState,
};
use teachit_core::upload::LocalFile;
use tracing::info;

#[derive(Parser)]
#[command(name = "teachit", version)]
#[command(about = "Learn by teaching: explain your notes to a tutor that asks back", long_about = None)]
struct Cli {
    /// Backend origin, overriding TEACHIT_BASE_URL
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Use the in-process offline backend
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload notes, pick a topic, teach it, and get graded
    Teach {
        /// Note files to upload (txt, md, csv, docx, jpg, jpeg, png, gif, webp)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Browse the notes already in the vault
    Vault {
        /// File to open first
        #[arg(long, value_name = "NAME")]
        file: Option<String>,

        /// Analyze the opened file and show it in study mode
        #[arg(long)]
        study: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Parse Command Line ---
    let cli = Cli::parse();

    // --- 2. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(base_url) = &cli.base_url {
        config = config
            .with_base_url(base_url)
            .context("Invalid --base-url")?;
    }
    if cli.offline {
        config.backend = Backend::Offline;
    }

    // --- 3. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 4. Select Backend ---
    let state = AppState::from_config(config).context("Failed to initialize backend")?;
    info!(
        backend = ?state.config.backend,
        base_url = %state.config.base_url,
        timeout_secs = state.config.request_timeout.as_secs(),
        "Client configured. Starting console..."
    );

    // --- 5. Run Console ---
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut console = Console::new(state.service.clone(), input, std::io::stdout());
    match cli.command {
        Commands::Teach { files } => {
            let mut local = Vec::with_capacity(files.len());
            for path in &files {
                local.push(
                    LocalFile::read(path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                );
            }
            console.teach(local).await?;
        }
        Commands::Vault { file, study } => console.browse(file, study).await?,
    }

    info!("Console closed.");
    Ok(())
}
