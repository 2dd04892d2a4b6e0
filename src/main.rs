use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use concept_highlighter::cli;
use concept_highlighter::config::HighlighterConfig;
use concept_highlighter::logging::{cleanup_old_logs, init_logging};

#[derive(Parser)]
#[command(name = "concept-highlighter")]
#[command(about = "Highlight passages related to your concepts in HTML pages using Gemini")]
struct Cli {
    /// Config file
    #[arg(short, long, default_value = "highlighter.toml", global = true)]
    config: PathBuf,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a page and write it back with highlight markers
    Highlight {
        /// Input HTML file
        html: PathBuf,

        /// URL the page was saved from (enables patent extraction)
        #[arg(short, long)]
        url: Option<String>,

        /// Output HTML file (defaults to <input>_highlighted.html)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Remove all highlight markers from a page
    Clear {
        html: PathBuf,

        /// Output HTML file (defaults to overwriting the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Summarize a page, focused on the configured concepts
    Summarize {
        html: PathBuf,

        #[arg(short, long)]
        url: Option<String>,
    },
    /// Show how a text file would be chunked
    Chunk {
        file: PathBuf,

        /// Maximum chunk size in characters
        #[arg(short, long)]
        max_size: Option<usize>,
    },
    /// Check the configured API key against the Gemini API
    ValidateKey,
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file
    Init,
    /// Print the effective config
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut config = HighlighterConfig::load_or_default(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    let _guard = init_logging(&config.logging)?;
    if config.logging.enable_file_logging {
        if let Err(e) = cleanup_old_logs(&config.logging) {
            tracing::warn!("Failed to clean up old logs: {}", e);
        }
    }

    match args.command {
        Commands::Highlight { html, url, output } => cli::highlight_command(html, url, output, &config).await,
        Commands::Clear { html, output } => cli::clear_command(html, output).await,
        Commands::Summarize { html, url } => cli::summarize_command(html, url, &config).await,
        Commands::Chunk { file, max_size } => cli::chunk_command(file, max_size).await,
        Commands::ValidateKey => cli::validate_key_command(&config).await,
        Commands::Config { action } => match action {
            ConfigAction::Init => cli::config_init_command(&args.config),
            ConfigAction::Show => cli::config_show_command(&config),
        },
    }
}
