//! Migration executor.
//!
//! Applies a change-set to the synchronized table. Statements run one at a
//! time in the order given by [`DdlStatement::plan`]; SQLite DDL is not
//! wrapped in a transaction here, so a failure leaves earlier statements in
//! place and reports them in the error.

use std::time::Duration;

use serde::Serialize;
use sqlx::sqlite::SqlitePool;
use tracing::{debug, info, warn};

use crate::ddl::DdlStatement;
use crate::error::{MigrationError, StatementError};
use crate::schema::SchemaChangeSet;

/// What a cycle actually changed on the table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliedChanges {
    /// The table was created.
    pub created_table: bool,
    /// Columns added, in the order they were added.
    pub added: Vec<String>,
    /// Columns dropped, in the order they were dropped.
    pub dropped: Vec<String>,
}

impl AppliedChanges {
    /// Returns whether nothing was changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.created_table && self.added.is_empty() && self.dropped.is_empty()
    }

    fn record(&mut self, statement: &DdlStatement) {
        match statement {
            DdlStatement::CreateTable => self.created_table = true,
            DdlStatement::AddColumn(column) => self.added.push(column.clone()),
            DdlStatement::DropColumn(column) => self.dropped.push(column.clone()),
        }
    }
}

/// Executes change-sets against one table.
#[derive(Debug, Clone)]
pub struct MigrationExecutor {
    pool: SqlitePool,
    table: String,
    statement_timeout: Duration,
    dry_run: bool,
}

impl MigrationExecutor {
    /// Creates a new migration executor for `table`.
    pub fn new(pool: SqlitePool, table: impl Into<String>, statement_timeout: Duration) -> Self {
        Self {
            pool,
            table: table.into(),
            statement_timeout,
            dry_run: false,
        }
    }

    /// Enables dry-run mode (SQL is logged but not executed).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the table this executor migrates.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Generates SQL for a change-set without executing it.
    #[must_use]
    pub fn sql_for(&self, changes: &SchemaChangeSet) -> Vec<String> {
        DdlStatement::plan(changes)
            .iter()
            .map(|s| s.to_sql(&self.table))
            .collect()
    }

    /// Applies a change-set.
    ///
    /// Additions always run before drops. The first failing statement stops
    /// the cycle; the error carries everything applied up to that point.
    pub async fn apply(
        &self,
        changes: &SchemaChangeSet,
    ) -> std::result::Result<AppliedChanges, MigrationError> {
        let mut applied = AppliedChanges::default();
        if changes.is_empty() {
            return Ok(applied);
        }

        info!(
            table = %self.table,
            create = changes.create_table,
            add = changes.columns_to_add.len(),
            drop = changes.columns_to_drop.len(),
            "Applying schema changes"
        );

        for statement in DdlStatement::plan(changes) {
            let sql = statement.to_sql(&self.table);

            if self.dry_run {
                info!(sql = %sql, "Dry run, not executing");
                continue;
            }

            if let DdlStatement::DropColumn(column) = &statement {
                warn!(
                    table = %self.table,
                    column = %column,
                    "Dropping column; its data is removed permanently"
                );
            }

            debug!(sql = %sql, "Executing SQL");
            if let Err(source) = self.execute(&sql).await {
                return Err(MigrationError {
                    table: self.table.clone(),
                    statement: sql,
                    applied,
                    source,
                });
            }

            if !statement.is_destructive() {
                info!(table = %self.table, change = %statement, "Schema change applied");
            }
            applied.record(&statement);
        }

        Ok(applied)
    }

    async fn execute(&self, sql: &str) -> std::result::Result<(), StatementError> {
        match tokio::time::timeout(self.statement_timeout, sqlx::query(sql).execute(&self.pool))
            .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(StatementError::Timeout(self.statement_timeout)),
        }
    }
}
