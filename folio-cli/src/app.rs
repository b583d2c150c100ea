use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::info;

use folio_config::{FolioConfig, StoreBackend};
use folio_sequence::{
    fiscal_year_label, format_number, Clock, CounterStore, DocumentType, FiscalYear, FixedClock,
    InMemoryCounterStore, ScopeKey, SequenceAllocator, SqliteCounterStore, SystemClock,
};

#[derive(Parser, Debug)]
#[command(
    name = "folio",
    version,
    about = "Allocate and inspect sequential document numbers"
)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Override the SQLite counter database path
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Allocate raw sequence values
    Allocate {
        document_type: DocumentType,
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Resolve the fiscal year from this date instead of today (backfills)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Allocate and print the next document number
    Next {
        document_type: DocumentType,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Print the fiscal year label for a date
    FiscalYear {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Render a document number without touching the counter store
    Format {
        document_type: DocumentType,
        value: u64,
        #[arg(long, conflicts_with = "date")]
        fiscal_year: Option<FiscalYear>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List counters and their last issued values
    Counters {
        #[arg(long)]
        json: bool,
    },
    /// Delete a counter so its sequence restarts at 1 (maintenance only)
    Reset {
        document_type: DocumentType,
        #[arg(long)]
        fiscal_year: Option<FiscalYear>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut config = FolioConfig::load(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.store.path = db.clone();
    }
    let _guard = crate::telemetry::init_tracing(&config.logging)?;
    execute(cli.command, &config).await
}

async fn execute(command: Commands, config: &FolioConfig) -> Result<()> {
    match command {
        Commands::Allocate {
            document_type,
            count,
            as_of,
        } => {
            let allocator = build_allocator(config, as_of)?;
            for _ in 0..count {
                let value = allocator
                    .allocate(document_type)
                    .await
                    .with_context(|| format!("failed to allocate {document_type} number"))?;
                println!("{value}");
            }
        }
        Commands::Next {
            document_type,
            as_of,
        } => {
            let allocator = build_allocator(config, as_of)?;
            let number = allocator
                .generate_formatted_number(document_type)
                .await
                .with_context(|| format!("failed to generate {document_type} number"))?;
            info!(%document_type, %number, "document number issued");
            println!("{number}");
        }
        Commands::FiscalYear { date } => {
            let date = date.unwrap_or_else(|| SystemClock.today());
            println!("{}", fiscal_year_label(date));
        }
        Commands::Format {
            document_type,
            value,
            fiscal_year,
            date,
        } => {
            let fiscal_year = fiscal_year.unwrap_or_else(|| {
                FiscalYear::containing(date.unwrap_or_else(|| SystemClock.today()))
            });
            println!(
                "{}",
                format_number(document_type, value, &fiscal_year.label())
            );
        }
        Commands::Counters { json } => {
            let store = build_store(config)?;
            let counters = store.counters().await.context("failed to list counters")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&counters)?);
            } else {
                for counter in counters {
                    println!("{}\t{}", counter.scope, counter.sequence_value);
                }
            }
        }
        Commands::Reset {
            document_type,
            fiscal_year,
        } => {
            let scope = reset_scope(document_type, fiscal_year)?;
            if config.store.backend != StoreBackend::Sqlite {
                bail!("reset is only supported for the sqlite backend");
            }
            let store = open_sqlite(config)?;
            if store.reset(&scope).await.context("failed to reset counter")? {
                info!(%scope, "counter reset");
                println!("reset {scope}");
            } else {
                println!("no counter for {scope}");
            }
        }
    }
    Ok(())
}

fn reset_scope(document_type: DocumentType, fiscal_year: Option<FiscalYear>) -> Result<ScopeKey> {
    match (document_type.is_year_scoped(), fiscal_year) {
        (true, Some(year)) => Ok(ScopeKey::yearly(document_type, year.label())),
        (true, None) => bail!("--fiscal-year is required to reset {document_type} counters"),
        (false, Some(_)) => bail!("{document_type} counters are not scoped by fiscal year"),
        (false, None) => Ok(ScopeKey::lifetime(document_type)),
    }
}

fn build_allocator(config: &FolioConfig, as_of: Option<NaiveDate>) -> Result<SequenceAllocator> {
    let clock: Arc<dyn Clock> = match as_of {
        Some(date) => Arc::new(FixedClock::new(date)),
        None => Arc::new(SystemClock),
    };
    Ok(SequenceAllocator::new(build_store(config)?)
        .with_clock(clock)
        .with_retry_policy(config.retry_policy()))
}

fn build_store(config: &FolioConfig) -> Result<Arc<dyn CounterStore>> {
    match config.store.backend {
        StoreBackend::Sqlite => Ok(Arc::new(open_sqlite(config)?)),
        StoreBackend::Memory => Ok(Arc::new(InMemoryCounterStore::new())),
    }
}

fn open_sqlite(config: &FolioConfig) -> Result<SqliteCounterStore> {
    SqliteCounterStore::with_busy_timeout(&config.store.path, config.store.busy_timeout())
        .with_context(|| {
            format!(
                "failed to open counter store at {}",
                config.store.path.display()
            )
        })
}
