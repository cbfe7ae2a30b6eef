//! memgate - membership verification operator CLI

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use memgate_cli::commands;
use memgate_core::GateConfig;
use serde::Serialize;
use std::fmt::Display;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// memgate - membership verification operator CLI
#[derive(Parser, Debug)]
#[command(name = "memgate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Extract the next billing date from OCR text lines
    Parse {
        /// OCR locale code (chi_sim, deu, jpn, ...)
        #[arg(short, long)]
        locale: String,

        /// Reference date (defaults to today, UTC)
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Text lines, in OCR order
        #[arg(required = true)]
        lines: Vec<String>,
    },

    /// Generate a new vault key
    Keygen,

    /// Seal a secret with the configured vault key
    Encrypt {
        /// Secret to seal
        plaintext: String,
    },

    /// Open a sealed secret with the configured vault key
    Decrypt {
        /// Hex form of the sealed secret
        secret: String,
    },

    /// Decide validity for a billing date
    Decide {
        /// Year, if the receipt shows one
        #[arg(long)]
        year: Option<i32>,

        /// Month (1-12)
        #[arg(long)]
        month: u32,

        /// Day of month
        #[arg(long)]
        day: u32,

        /// Reference date
        #[arg(long)]
        as_of: NaiveDate,
    },

    /// Recheck active records from a JSON snapshot without side effects
    Sweep {
        /// JSON array of membership status records
        #[arg(long)]
        snapshot: PathBuf,

        /// Reference date (defaults to today, UTC)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

fn init_tracing(config: &GateConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

fn emit<T: Serialize + Display>(value: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{value}");
    }
    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => GateConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => GateConfig::default(),
    };
    config.validate()?;
    init_tracing(&config);

    match cli.command {
        Commands::Parse { locale, as_of, lines } => {
            let report = commands::parse(&locale, &lines, as_of.unwrap_or_else(today))?;
            emit(&report, cli.json)?;
        }
        Commands::Keygen => {
            let key = commands::keygen();
            if cli.json {
                println!("{}", serde_json::json!({ "vault_key_hex": key }));
            } else {
                println!("{key}");
            }
        }
        Commands::Encrypt { plaintext } => {
            let sealed = commands::encrypt(&config.vault_key()?, &plaintext)?;
            if cli.json {
                println!("{}", serde_json::json!({ "secret": sealed }));
            } else {
                println!("{sealed}");
            }
        }
        Commands::Decrypt { secret } => {
            let plaintext = commands::decrypt(&config.vault_key()?, &secret)?;
            if cli.json {
                println!("{}", serde_json::json!({ "plaintext": plaintext }));
            } else {
                println!("{plaintext}");
            }
        }
        Commands::Decide { year, month, day, as_of } => {
            emit(&commands::decide_date(year, month, day, as_of), cli.json)?;
        }
        Commands::Sweep { snapshot, as_of } => {
            let statuses = commands::load_snapshot(&snapshot)?;
            let report = commands::sweep(&config, statuses, as_of.unwrap_or_else(today)).await?;
            emit(&report, cli.json)?;
        }
    }

    Ok(())
}
