//! Command-line interface for Depot.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use depot_core::config::AppConfig;
use depot_core::record::format_timestamp;
use depot_ingest::{Depot, IngestError, Ingested, ListOrder};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit status when the uploaded content is already stored.
const EXIT_DUPLICATE: u8 = 2;

#[derive(Parser)]
#[command(name = "depot")]
#[command(about = "Content-addressed file store")]
#[command(version)]
struct Cli {
    /// Configuration file (optional; DEPOT_* env vars override it)
    #[arg(long, env = "DEPOT_CONFIG", default_value = "depot.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file
    Put {
        /// File to upload
        file: PathBuf,
        /// Name to record instead of the file's own name
        #[arg(long)]
        name: Option<String>,
        /// Succeed if identical content is already stored
        #[arg(long, default_value_t = false)]
        existing_ok: bool,
    },
    /// List stored objects
    List {
        /// Sort order: newest, oldest, or name
        #[arg(long, default_value = "newest")]
        sort: ListOrder,
        /// Print records as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show where an object is stored, or copy it out
    Get {
        id: String,
        /// Copy the object to this path
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Delete an object
    Rm { id: String },
    /// Re-hash an object and compare with its recorded hash
    Verify { id: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    let depot = Depot::open(config)
        .await
        .context("failed to open depot")?;

    match cli.command {
        Commands::Put {
            file,
            name,
            existing_ok,
        } => put(&depot, &file, name.as_deref(), existing_ok).await,
        Commands::List { sort, json } => {
            let records = depot.list_sorted(sort).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                println!("{:<32}  {:<25}  Name", "ID", "Uploaded");
                for record in &records {
                    println!(
                        "{:<32}  {:<25}  {}",
                        record.id,
                        format_timestamp(&record.created_at)?,
                        record.original_name
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Get { id, output } => {
            let (path, record) = depot
                .fetch(&id)
                .await
                .with_context(|| format!("cannot fetch {id}"))?;
            match output {
                Some(dest) => {
                    tokio::fs::copy(&path, &dest).await.with_context(|| {
                        format!("failed to copy {} to {}", path.display(), dest.display())
                    })?;
                    println!("{} -> {}", record.original_name, dest.display());
                }
                None => println!("{}", path.display()),
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Rm { id } => {
            let record = depot
                .delete(&id)
                .await
                .with_context(|| format!("cannot delete {id}"))?;
            println!("Deleted {} ({})", record.id, record.original_name);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Verify { id } => {
            let record = depot
                .verify(&id)
                .await
                .with_context(|| format!("verification of {id} failed"))?;
            println!("OK {} {}", record.id, record.content_hash);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn put(depot: &Depot, file: &Path, name: Option<&str>, existing_ok: bool) -> Result<ExitCode> {
    match depot.ingest_file(file, name, existing_ok).await {
        Ok(Ingested::Created(record)) => {
            println!("Stored {} as {}", record.original_name, record.id);
            println!("  path: {}", record.stored_path.display());
            println!("  hash: {}", record.content_hash);
            Ok(ExitCode::SUCCESS)
        }
        Ok(Ingested::Existing(record)) => {
            println!(
                "Already stored as {} ({})",
                record.id, record.original_name
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(IngestError::DuplicateContent { existing }) => {
            eprintln!(
                "Duplicate: identical content is already stored as {} ({})",
                existing.id, existing.original_name
            );
            Ok(ExitCode::from(EXIT_DUPLICATE))
        }
        Err(err) => Err(err).with_context(|| format!("failed to store {}", file.display())),
    }
}

/// Load configuration from an optional TOML file plus `DEPOT_*` env vars.
fn load_config(path: &Path) -> Result<AppConfig> {
    let mut figment = Figment::new();
    if path.exists() {
        tracing::debug!(config_path = %path.display(), "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    }
    figment = figment.merge(Env::prefixed("DEPOT_").split("__"));

    let config: AppConfig = figment
        .extract()
        .map_err(|err| anyhow::anyhow!(err))
        .context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}
