//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use palaver_core::config;

use crate::modes;

mod commands;

#[derive(Parser)]
#[command(name = "palaver")]
#[command(version = "0.1")]
#[command(about = "Terminal chat topics over the Gemini API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override the answer model from config
    #[arg(long)]
    model: Option<String>,

    /// Override the title model from config
    #[arg(long = "title-model")]
    title_model: Option<String>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut config = config::Config::load().context("load config")?;

    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(title_model) = cli.title_model {
        config.title_model = title_model;
    }

    // default to chat mode
    let Some(command) = cli.command else {
        return modes::chat::run(&config).await;
    };

    match command {
        Commands::Config { command } => match command {
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
