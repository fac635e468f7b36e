use card_escrow::application::engine::SettlementEngine;
use card_escrow::domain::money::SettlementPolicy;
use card_escrow::domain::ports::CardStoreBox;
use card_escrow::infrastructure::in_memory::InMemoryCardStore;
use card_escrow::interfaces::csv::event_reader::EventReader;
use card_escrow::interfaces::csv::movement_writer::MovementWriter;
use card_escrow::interfaces::csv::snapshot_writer::SnapshotWriter;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input event-log CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Smallest amount that can be moved out of the reserve
    #[arg(long, default_value = "0.01")]
    minimum_unit: Decimal,

    /// Fractional digits money amounts are quantized to
    #[arg(long, default_value_t = 2)]
    scale: u32,

    /// Lowest reserve ratio accepted at issuance
    #[arg(long, default_value = "0.3")]
    minimum_reserve_ratio: Decimal,

    /// Write final card snapshots to this CSV file
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

fn open_store(db_path: Option<PathBuf>) -> Result<CardStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = card_escrow::infrastructure::rocksdb::RocksDBStore::open(path)
                .into_diagnostic()?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(path) => {
            warn!(
                path = %path.display(),
                "persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled; falling back to in-memory storage"
            );
            Ok(Box::new(InMemoryCardStore::new()))
        }
        None => Ok(Box::new(InMemoryCardStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let policy = SettlementPolicy::new(cli.scale, cli.minimum_unit, cli.minimum_reserve_ratio)
        .into_diagnostic()?;
    let engine = SettlementEngine::new(open_store(cli.db_path)?, policy);

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = EventReader::new(file);
    let stdout = io::stdout();
    let mut writer = MovementWriter::new(stdout.lock(), policy.scale);

    for (row, command) in reader.commands().enumerate() {
        let command = match command {
            Ok(command) => command,
            Err(e) => {
                warn!(row = row + 1, error = %e, "Error reading event");
                continue;
            }
        };
        let card = command.card();
        match engine.process_command(command).await {
            Ok(movements) => {
                for movement in &movements {
                    writer.write(movement).into_diagnostic()?;
                }
            }
            Err(e) => warn!(row = row + 1, card, error = %e, "Error processing event"),
        }
    }
    writer.flush().into_diagnostic()?;

    if let Some(path) = cli.snapshot {
        let cards = engine.into_results().await.into_diagnostic()?;
        let file = File::create(path).into_diagnostic()?;
        SnapshotWriter::new(file, policy.scale)
            .write_cards(&cards)
            .into_diagnostic()?;
    }

    Ok(())
}
