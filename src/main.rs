use adviser_import::logging::configure_logging;
use adviser_import::{supervise, ImportConfig, ImportController, Outcome, Store};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "adviser-import", version, about = "Import legal advice providers into SQLite")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "ADVISER_DATABASE")]
    database: Option<PathBuf>,

    /// Also append warnings and errors to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a workbook (.xls/.xlsx/.ods) or a directory of per-sheet CSV files
    Import {
        path: PathBuf,

        /// Skip caching already located postcodes before the run
        #[arg(long)]
        no_prime: bool,

        /// Base URL of the postcodes.io compatible geocoder
        #[arg(long, env = "GEOCODER_URL")]
        geocoder_url: Option<String>,

        /// Seconds between progress lines
        #[arg(long, default_value_t = 1)]
        poll_interval: u64,
    },

    /// Print how many rows each table holds
    Counts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let _log_guard = configure_logging(cli.log_file.as_deref());

    let mut config = ImportConfig::from_env();
    if let Some(database) = cli.database {
        config.database = database;
    }

    match cli.command {
        Command::Import {
            path,
            no_prime,
            geocoder_url,
            poll_interval,
        } => {
            if let Some(url) = geocoder_url {
                config.geocoder_url = url;
            }
            run_import(config, path, !no_prime, Duration::from_secs(poll_interval.max(1))).await
        }
        Command::Counts => print_counts(&config),
    }
}

async fn run_import(config: ImportConfig, path: PathBuf, prime: bool, poll: Duration) -> Result<()> {
    println!("📥 Adviser import");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📂 Source:   {}", path.display());
    println!("🗄️  Database: {}", config.database.display());
    println!("🌍 Geocoder: {}\n", config.geocoder_url);

    let controller = Arc::new(ImportController::new(config.clone()));
    controller
        .start(&path, prime)
        .with_context(|| format!("Could not start import of {}", path.display()))?;

    let outcome = supervise(Arc::clone(&controller), poll)
        .await
        .context("Import failed")?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    match outcome {
        Some(Outcome::Completed) => println!("🎉 Import complete"),
        Some(Outcome::Interrupted) => {
            println!("⏸️  Import interrupted at {}", controller.progress());
            println!("   Run the same import again to resume.");
        }
        None => println!("⚠️  No import ran"),
    }

    print_counts(&config)
}

fn print_counts(config: &ImportConfig) -> Result<()> {
    let store = Store::open(&config.database)
        .with_context(|| format!("Could not open {}", config.database.display()))?;
    let counts = store.entity_counts()?;

    println!("\n📊 Database contents:");
    for (label, count) in counts.lines() {
        println!("   {:<22} {}", label, count);
    }
    Ok(())
}
