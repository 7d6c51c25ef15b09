use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use consulta_lib::backup::{self, ImportProgress, ProgressObserver};
use consulta_lib::bridge::guard::BLOCKED_EXIT_CODE;
use consulta_lib::ledger::LedgerHandle;
use consulta_lib::migrate::MigrationRunner;
use consulta_lib::model::BACKUP_FILE_EXISTS;
use consulta_lib::{AppConfig, AppState, Store};

#[derive(Debug, Parser)]
#[command(name = "consulta", about = "Patient record store maintenance", version)]
struct Cli {
    /// Override the database file path.
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    /// Override the migration ledger path.
    #[arg(long, value_name = "PATH", global = true)]
    ledger: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Inspect and control schema migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Write a compressed archive of every patient record.
    Export {
        /// Destination file; an existing file is never overwritten.
        #[arg(long, value_name = "FILE")]
        out: PathBuf,
    },
    /// Merge an archive produced by `export` into the store.
    Import {
        /// Archive file to read.
        #[arg(value_name = "FILE")]
        archive: PathBuf,
    },
    /// Database locations.
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum MigrateCommand {
    /// List applied and pending migrations.
    Status,
    /// Apply every pending migration in order.
    Up,
    /// Roll back the most recently applied migration.
    Down,
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Print the resolved database file path.
    Path,
}

#[tokio::main]
async fn main() {
    consulta_lib::init_logging();

    let cli = Cli::parse();
    match handle_cli(cli).await {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}

async fn handle_cli(cli: Cli) -> Result<i32> {
    let mut config = AppConfig::from_env()?;
    if let Some(db) = cli.db {
        config = config.with_db_path(db);
    }
    if let Some(ledger) = cli.ledger {
        config = config.with_ledger_path(ledger);
    }

    match cli.command {
        Commands::Migrate(command) => handle_migrate(command, &config).await,
        Commands::Export { out } => handle_export(&config, &out).await,
        Commands::Import { archive } => handle_import(&config, &archive).await,
        Commands::Db(DbCommand::Path) => {
            println!("{}", config.db_path().display());
            Ok(0)
        }
    }
}

async fn handle_migrate(command: MigrateCommand, config: &AppConfig) -> Result<i32> {
    config.ensure_dirs()?;
    let store = Store::open(config.db_path()).await?;
    let runner = MigrationRunner::new(
        store.pool().clone(),
        LedgerHandle::file(config.ledger_path()),
    );

    let outcome = match command {
        MigrateCommand::Status => {
            let status = runner.status()?;
            for entry in &status.applied {
                println!("applied  {:<36} {}", entry.name, entry.applied_at);
            }
            for name in &status.pending {
                println!("pending  {name}");
            }
            if status.pending.is_empty() {
                println!("Database is up to date.");
            }
            Ok(0)
        }
        MigrateCommand::Up => match runner.apply_pending().await {
            Ok(ran) if ran.is_empty() => {
                println!("Nothing to apply.");
                Ok(0)
            }
            Ok(ran) => {
                for name in &ran {
                    println!("applied  {name}");
                }
                Ok(0)
            }
            Err(err) => Err(err.into()),
        },
        MigrateCommand::Down => match runner.rollback_last().await {
            Ok(Some(name)) => {
                println!("rolled back  {name}");
                Ok(0)
            }
            Ok(None) => {
                println!("Nothing to roll back.");
                Ok(0)
            }
            Err(err) => Err(err.into()),
        },
    };

    store.close().await;
    outcome
}

async fn handle_export(config: &AppConfig, out: &Path) -> Result<i32> {
    let state = AppState::initialize(config).await?;
    let result = backup::export_backup(state.store(), out).await;
    state.store().close().await;

    match result {
        Ok(report) => {
            println!(
                "Exported {} patients to {} ({} bytes).",
                report.patients, report.path, report.bytes
            );
            Ok(0)
        }
        Err(err) if err.code() == BACKUP_FILE_EXISTS => {
            eprintln!("Error: {}", err.message());
            Ok(BLOCKED_EXIT_CODE)
        }
        Err(err) => Err(err.into()),
    }
}

async fn handle_import(config: &AppConfig, archive: &Path) -> Result<i32> {
    let state = AppState::initialize(config).await?;
    let printer: ProgressObserver = Arc::new(|progress: ImportProgress| {
        println!("{}", progress.message);
    });
    let result = backup::import_backup(state.store(), archive, Some(printer)).await;
    state.store().close().await;

    let report = result?;
    println!(
        "Patients: {} added, {} skipped. Notes: {} added, {} skipped.",
        report.patients_added, report.patients_skipped, report.notes_added, report.notes_skipped
    );
    println!(
        "Contacts: {} added, {} skipped. Tutors: {} added, {} skipped.",
        report.contacts_added,
        report.contacts_skipped,
        report.tutors_added,
        report.tutors_skipped
    );
    Ok(0)
}
