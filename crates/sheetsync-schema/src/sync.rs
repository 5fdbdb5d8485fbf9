//! One synchronization cycle: read the template, introspect the table, diff,
//! apply.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use tracing::{error, info};

use crate::diff::SchemaDiffer;
use crate::error::{Result, SyncError};
use crate::executor::{AppliedChanges, MigrationExecutor};
use crate::introspect::Introspector;
use crate::schema::{CanonicalSchema, LiveSchema, SchemaChangeSet};
use crate::state::SyncState;
use crate::template::TemplateSource;

/// Configuration for the synchronizer.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Table kept in sync with the template.
    pub table: String,
    /// Extra columns never dropped, whatever the template says. The system
    /// columns and rowid aliases are always protected on top of these.
    pub protected_columns: Vec<String>,
    /// Upper bound on each catalog query and DDL statement.
    pub statement_timeout: Duration,
    /// Log DDL instead of executing it.
    pub dry_run: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            table: "customer_data".to_string(),
            protected_columns: Vec::new(),
            statement_timeout: Duration::from_secs(30),
            dry_run: false,
        }
    }
}

/// Outcome of a successful cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// The change-set computed for this cycle.
    pub changes: SchemaChangeSet,
    /// What was actually applied.
    pub applied: AppliedChanges,
}

/// A computed but unapplied cycle, as shown by `plan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    /// Template columns.
    pub canonical: CanonicalSchema,
    /// Table columns.
    pub live: LiveSchema,
    /// Delta between them.
    pub changes: SchemaChangeSet,
    /// Statements that would run.
    pub sql: Vec<String>,
}

/// Reconciles one table with one template.
pub struct Synchronizer<T: TemplateSource> {
    template: Arc<T>,
    introspector: Introspector,
    differ: SchemaDiffer,
    executor: MigrationExecutor,
    state: Arc<SyncState>,
}

impl<T: TemplateSource> Synchronizer<T> {
    /// Creates a synchronizer with fresh state.
    pub fn new(pool: SqlitePool, template: T, config: SyncConfig) -> Self {
        Self::with_state(pool, template, config, Arc::new(SyncState::new()))
    }

    /// Creates a synchronizer sharing an existing state.
    pub fn with_state(
        pool: SqlitePool,
        template: T,
        config: SyncConfig,
        state: Arc<SyncState>,
    ) -> Self {
        Self {
            template: Arc::new(template),
            introspector: Introspector::new(pool.clone(), config.statement_timeout),
            differ: SchemaDiffer::with_protected(&config.protected_columns),
            executor: MigrationExecutor::new(pool, config.table, config.statement_timeout)
                .dry_run(config.dry_run),
            state,
        }
    }

    /// Returns the template this synchronizer reads.
    #[must_use]
    pub fn template(&self) -> &T {
        &self.template
    }

    /// Returns the shared sync state.
    #[must_use]
    pub fn state(&self) -> &Arc<SyncState> {
        &self.state
    }

    /// Returns the synchronized table.
    #[must_use]
    pub fn table(&self) -> &str {
        self.executor.table()
    }

    /// Reads the live schema.
    pub async fn live_schema(&self) -> Result<LiveSchema> {
        self.introspector.live_schema(self.table()).await
    }

    /// Computes what a cycle would do, without touching the table.
    pub async fn plan(&self) -> Result<SyncPlan> {
        let canonical = self.read_template().await?;
        self.differ.check_template(&canonical)?;
        let live = self.live_schema().await?;
        let changes = self.differ.diff(&canonical, &live);
        let sql = self.executor.sql_for(&changes);
        Ok(SyncPlan {
            canonical,
            live,
            changes,
            sql,
        })
    }

    /// Runs one full cycle.
    ///
    /// Waits for any cycle already in flight, so concurrent callers run one
    /// after another, each against the template as it is when its turn comes.
    pub async fn sync(&self) -> Result<CycleReport> {
        let _guard = self.state.begin_cycle().await;
        let marker = self.template.modified();

        info!(
            table = %self.table(),
            template = %self.template.path().display(),
            "Starting sync cycle"
        );

        let result = self.run_cycle().await;
        match &result {
            Ok(report) => {
                info!(
                    table = %self.table(),
                    added = report.applied.added.len(),
                    dropped = report.applied.dropped.len(),
                    "Schema synchronized with template"
                );
                self.state
                    .record_success(marker, !report.applied.is_empty());
            }
            Err(e) => {
                match e {
                    SyncError::Migration(m) => error!(
                        table = %m.table,
                        statement = %m.statement,
                        added = ?m.applied.added,
                        dropped = ?m.applied.dropped,
                        error = %m.source,
                        "Sync cycle failed part-way; table is partially migrated"
                    ),
                    other => error!(table = %self.table(), error = %other, "Sync cycle failed"),
                }
                self.state.record_failure(marker, e);
            }
        }
        result
    }

    async fn run_cycle(&self) -> Result<CycleReport> {
        let canonical = self.read_template().await?;
        self.differ.check_template(&canonical)?;

        let live = self.live_schema().await?;
        let changes = self.differ.diff(&canonical, &live);
        let applied = self.executor.apply(&changes).await?;

        Ok(CycleReport { changes, applied })
    }

    async fn read_template(&self) -> Result<CanonicalSchema> {
        let template = Arc::clone(&self.template);
        match tokio::task::spawn_blocking(move || template.read_schema()).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(SyncError::unreadable(self.template.path(), e)),
        }
    }
}
