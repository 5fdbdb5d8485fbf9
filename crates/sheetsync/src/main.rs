//! sheetsync CLI
//!
//! Keeps a SQLite table's columns in line with a spreadsheet template and
//! runs allow-listed searches against it.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use sheetsync_query::{FilterRequest, QueryConfig, TableQuery};
use sheetsync_schema::prelude::*;

/// Template-driven schema sync and filtered search.
#[derive(Parser)]
#[command(name = "sheetsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(
        short,
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:sheetsync.db?mode=rwc"
    )]
    database: String,

    /// Template whose first row defines the table's columns.
    #[arg(short, long, env = "SHEETSYNC_TEMPLATE", default_value = "template.xlsx")]
    template: PathBuf,

    /// Table kept in sync with the template.
    #[arg(long, env = "SHEETSYNC_TABLE", default_value = "customer_data")]
    table: String,

    /// Maximum pooled database connections.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Timeout for each database statement, in seconds.
    #[arg(long, default_value_t = 30)]
    statement_timeout_secs: u64,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync cycle.
    Sync {
        /// Show SQL without executing (dry run).
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the change-set and SQL the next cycle would apply.
    Plan,

    /// Sync once, then keep syncing whenever the template changes.
    Watch {
        /// How often to check the template, in seconds.
        #[arg(long, default_value_t = 1)]
        poll_interval_secs: u64,

        /// Minimum wait after a failed cycle before retrying, in seconds.
        #[arg(long, default_value_t = 30)]
        retry_interval_secs: u64,
    },

    /// Show the table's current columns.
    Describe,

    /// Search rows, e.g. `search STATE=Delhi,Haryana CITY=Gurgaon`.
    Search {
        /// Filters as FIELD=VALUE[,VALUE...]; repeat a field to add values.
        #[arg(value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },

    /// List the distinct values of one field.
    Distinct {
        /// Field to list.
        field: String,
    },

    /// Look a row up by its customer number.
    Lookup {
        /// Customer number.
        key: String,
    },
}

fn parse_filter(arg: &str) -> std::result::Result<(String, String), String> {
    arg.split_once('=')
        .map(|(field, values)| (field.to_string(), values.to_string()))
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{arg}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Connect to database
    let pool = SqlitePoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&cli.database)
        .await
        .with_context(|| format!("failed to connect to {}", cli.database))?;

    let statement_timeout = Duration::from_secs(cli.statement_timeout_secs);
    let sync_config = SyncConfig {
        table: cli.table.clone(),
        statement_timeout,
        ..SyncConfig::default()
    };
    let query_config = QueryConfig {
        table: cli.table.clone(),
        timeout: statement_timeout,
        ..QueryConfig::default()
    };

    match cli.command {
        Commands::Sync { dry_run } => {
            if dry_run {
                info!("Dry run mode - SQL will be printed but not executed.");
            }
            let synchronizer = Synchronizer::new(
                pool,
                TemplateFile::new(&cli.template),
                SyncConfig {
                    dry_run,
                    ..sync_config
                },
            );
            let report = synchronizer.sync().await?;
            print_json(&report)?;
        }

        Commands::Plan => {
            let synchronizer =
                Synchronizer::new(pool, TemplateFile::new(&cli.template), sync_config);
            let plan = synchronizer.plan().await?;

            if plan.sql.is_empty() {
                info!(table = %synchronizer.table(), "Table already matches the template.");
            } else {
                for statement in &plan.sql {
                    println!("{statement};");
                }
            }
        }

        Commands::Watch {
            poll_interval_secs,
            retry_interval_secs,
        } => {
            let synchronizer = Arc::new(Synchronizer::new(
                pool,
                TemplateFile::new(&cli.template),
                sync_config,
            ));
            initial_sync(&synchronizer).await?;

            let handle = SyncService::start(
                Arc::clone(&synchronizer),
                WatchConfig {
                    poll_interval: Duration::from_secs(poll_interval_secs),
                    min_retry_interval: Duration::from_secs(retry_interval_secs),
                },
            );

            tokio::signal::ctrl_c().await?;
            info!("Shutdown requested, waiting for in-flight sync...");
            handle.shutdown().await;

            let status = synchronizer.state().status();
            info!(
                cycles = status.cycles,
                migrations = status.migrations_applied,
                failures = status.failures,
                "Stopped"
            );
        }

        Commands::Describe => describe(pool, sync_config).await?,

        Commands::Search { filters } => {
            let query = TableQuery::new(pool, query_config)?;
            let rows = query.search(&FilterRequest::from_pairs(filters)).await?;
            print_json(&rows)?;
        }

        Commands::Distinct { field } => {
            let query = TableQuery::new(pool, query_config)?;
            let values = query.distinct_values(&field).await?;
            print_json(&serde_json::json!({ "values": values }))?;
        }

        Commands::Lookup { key } => {
            let query = TableQuery::new(pool, query_config)?;
            match query.find_by_key(&key).await? {
                Some(row) => print_json(&row)?,
                None => bail!("no row found for key '{key}'"),
            }
        }
    }

    Ok(())
}

/// Runs the startup cycle.
///
/// Template problems abort startup; database problems are left to the
/// watcher's retry.
async fn initial_sync(synchronizer: &Synchronizer<TemplateFile>) -> anyhow::Result<()> {
    match synchronizer.sync().await {
        Ok(_) => Ok(()),
        Err(e) if e.is_transient() => {
            warn!(error = %e, "Initial sync failed, will retry while watching");
            Ok(())
        }
        Err(e) => Err(e).context("initial sync failed"),
    }
}

async fn describe(pool: SqlitePool, config: SyncConfig) -> anyhow::Result<()> {
    let table = config.table.clone();
    let live = Introspector::new(pool, config.statement_timeout)
        .live_schema(&table)
        .await?;

    if live.is_empty() {
        info!(table = %table, "Table does not exist yet.");
        return Ok(());
    }

    println!("\nTable {table}:");
    println!("{:-<60}", "");
    for column in &live.columns {
        println!(
            " {:<30} {:<10} {}{}",
            column.name,
            column.sql_type,
            if column.nullable { "NULL" } else { "NOT NULL" },
            if column.primary_key { " PRIMARY KEY" } else { "" }
        );
    }
    println!();
    Ok(())
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
