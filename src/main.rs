//! # Profile Harness CLI (`phx`)
//!
//! Command-line front end for the profile pipeline: resolve subjects from
//! the provider chain, refresh their stored media, inspect profiles, tag
//! images, and run the HTTP API.
//!
//! ## Usage
//!
//! ```bash
//! phx --config ./config/phx.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `phx init` | Create the SQLite database and run schema migrations |
//! | `phx sources` | List providers in priority order and whether they can run |
//! | `phx resolve <handle>` | Print the raw payload the provider chain returns |
//! | `phx refresh <handle>` | Replace a subject's media with a fresh fetch |
//! | `phx show <handle>` | Print a subject with live aggregates and recent media |
//! | `phx analyze <id>` | Fetch and tag one stored media item |
//! | `phx classify <file>` | Tag a local image file |
//! | `phx clear-videos <handle>` | Delete all videos of a subject |
//! | `phx serve` | Start the HTTP API |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use profile_harness::analyze::{self, ImageFetcher};
use profile_harness::config::{self, Config};
use profile_harness::models::SubjectHandle;
use profile_harness::refresh::{self, RefreshOutcome};
use profile_harness::resolver::SourceResolver;
use profile_harness::sqlite_store::SqliteStore;
use profile_harness::{migrate, server, sources};

const DEFAULT_CONFIG: &str = "./config/phx.toml";

/// Profile Harness CLI.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/phx.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "phx",
    about = "Profile Harness: acquire, reconcile and tag social-media profiles",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// When the default path does not exist, built-in defaults are used.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// List providers in priority order and whether each is configured.
    Sources,

    /// Resolve a handle through the provider chain and print the raw payload.
    ///
    /// Nothing is normalized or stored.
    Resolve { handle: String },

    /// Refresh a subject: fetch, normalize, and replace all stored media.
    Refresh { handle: String },

    /// Show a subject with recomputed aggregates and its recent media.
    Show { handle: String },

    /// Fetch one stored media item's image, tag it, and store the labels.
    Analyze { id: i64 },

    /// Tag a local image file without touching the database.
    Classify { file: PathBuf },

    /// Delete every video stored for a subject.
    ClearVideos { handle: String },

    /// Start the HTTP API on `[server].bind`.
    Serve,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        tracing::info!(path = %path.display(), "no config file, using defaults");
        return Ok(Config::minimal());
    }
    config::load_config(path)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Classify { file } = &cli.command {
        return print_json(&analyze::classify_file(file)?);
    }

    let cfg = load(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized at {}", cfg.db.path.display());
        }
        Commands::Sources => {
            sources::list_sources(&cfg)?;
        }
        Commands::Resolve { handle } => {
            let handle = SubjectHandle::parse(&handle)?;
            let resolver = SourceResolver::from_config(&cfg)?;
            print_json(&refresh::raw_payload(&resolver, &handle).await)?;
        }
        Commands::Refresh { handle } => {
            let handle = SubjectHandle::parse(&handle)?;
            let resolver = SourceResolver::from_config(&cfg)?;
            let store = SqliteStore::open(&cfg).await?;
            match refresh::run_refresh(&cfg, &resolver, &store, &handle).await? {
                RefreshOutcome::Refreshed(report) => {
                    println!("Refresh {} complete:", handle);
                    println!("  photos:          {}", report.photos);
                    println!("  videos:          {}", report.videos);
                    println!("  followers:       {}", report.subject.followers);
                    println!("  avg likes:       {:.1}", report.subject.avg_likes);
                    println!("  avg comments:    {:.1}", report.subject.avg_comments);
                    println!("  engagement rate: {:.2}%", report.subject.engagement_rate);
                }
                RefreshOutcome::NoData { .. } => {
                    println!("No provider returned data for {}; nothing changed.", handle);
                }
            }
        }
        Commands::Show { handle } => {
            let handle = SubjectHandle::parse(&handle)?;
            let resolver = SourceResolver::from_config(&cfg)?;
            let store = SqliteStore::open(&cfg).await?;
            print_json(&refresh::show_subject(&cfg, &resolver, &store, &handle).await?)?;
        }
        Commands::Analyze { id } => {
            let store = SqliteStore::open(&cfg).await?;
            let fetcher = ImageFetcher::new(&cfg.analysis)?;
            print_json(&analyze::analyze_media(&fetcher, &store, id).await?)?;
        }
        Commands::ClearVideos { handle } => {
            let handle = SubjectHandle::parse(&handle)?;
            let store = SqliteStore::open(&cfg).await?;
            let deleted = refresh::clear_videos(&store, &handle).await?;
            println!("Deleted {} videos for {}", deleted, handle);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Classify { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
