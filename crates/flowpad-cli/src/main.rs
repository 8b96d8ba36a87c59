//! Flowpad CLI - save, load and edit diagram graphs from the command line

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::{completions, config as config_cmd, diagram};
use config::Config;
use flowpad_session::Session;
use flowpad_storage::{DiagramStore, RedbStore};
use output::{ConsoleNotifier, OutputFormat};

#[derive(Parser)]
#[command(name = "flowpad")]
#[command(author, version, about = "Diagram graph persistence engine")]
pub struct Cli {
    /// Data directory
    #[arg(short, long, env = "FLOWPAD_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Output format: table, json
    #[arg(short, long, global = true)]
    pub format: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the data directory path, falling back to the config file
    pub fn data_dir(&self, config: &Config) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| config.data_dir.clone())
    }

    pub fn format(&self, config: &Config) -> anyhow::Result<OutputFormat> {
        OutputFormat::parse(self.format.as_deref().unwrap_or(&config.format))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage saved diagrams
    Diagram(diagram::DiagramArgs),
    /// Manage configuration
    Config(config_cmd::ConfigArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Application context with storage backend
pub struct AppContext {
    pub store: Arc<RedbStore>,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl AppContext {
    pub fn new(cli: &Cli, config: &Config) -> anyhow::Result<Self> {
        let data_dir = cli.data_dir(config);
        std::fs::create_dir_all(&data_dir)?;

        let db_path = data_dir.join("flowpad.redb");
        tracing::debug!("Using database at: {:?}", db_path);

        let store = RedbStore::open(&db_path)?;

        Ok(Self {
            store: Arc::new(store),
            format: cli.format(config)?,
            quiet: cli.quiet,
        })
    }

    /// Start an editing session over the store
    pub fn session(&self) -> anyhow::Result<Session> {
        let store: Arc<dyn DiagramStore> = self.store.clone();
        let notifier = Arc::new(ConsoleNotifier::new(self.quiet));
        Ok(Session::new(store, notifier)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    tracing::debug!("Starting flowpad CLI");

    // These don't need storage
    match &cli.command {
        Commands::Config(args) => return config_cmd::run(args),
        Commands::Completions(args) => return completions::run(args),
        Commands::Diagram(_) => {}
    }

    let config = Config::load();
    let ctx = AppContext::new(&cli, &config)?;

    if let Commands::Diagram(args) = &cli.command {
        diagram::run(args, &ctx).await?;
    }

    Ok(())
}
