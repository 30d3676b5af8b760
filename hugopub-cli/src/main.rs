//! # hugopub CLI
//!
//! Command-line interface for publishing wiki-style notes to a Hugo site.

mod commands;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use hugopub_core::{Config, Context, SortOrder};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "hugopub")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "hugopub.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List notes marked for publishing
    List {
        /// Sort order
        #[arg(long, value_enum)]
        order: Option<ListOrder>,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Generate Hugo posts from publishable notes
    Publish {
        /// Mark every generated post as a draft
        #[arg(long)]
        draft: bool,

        /// Only publish these notes (file names, with or without `.md`)
        files: Vec<String>,
    },

    /// Clear a note's publish flag and delete its generated post
    Unpublish {
        /// Note path, file name or title
        note: String,
    },

    /// Rebuild the tag to category mapping from existing posts
    SyncTags,
}

#[derive(Copy, Clone, ValueEnum)]
pub enum ListOrder {
    Mtime,
    Title,
    Path,
}

impl From<ListOrder> for SortOrder {
    fn from(order: ListOrder) -> Self {
        match order {
            ListOrder::Mtime => SortOrder::Mtime,
            ListOrder::Title => SortOrder::Title,
            ListOrder::Path => SortOrder::Path,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let ctx = load_context(&cli.config)?;

    match cli.command {
        Commands::List { order, json } => commands::list_notes(&ctx, order.map(Into::into), json),
        Commands::Publish { draft, files } => commands::publish_notes(ctx, &files, draft),
        Commands::Unpublish { note } => commands::unpublish_note(&ctx, &note),
        Commands::SyncTags => commands::sync_tags(&ctx),
    }
}

fn load_context(config_path: &Path) -> anyhow::Result<Context> {
    tracing::debug!("Loading config from {:?}", config_path);
    let config = Config::from_file(config_path).context("Failed to load configuration")?;
    Context::new(config).context("Invalid configuration")
}
