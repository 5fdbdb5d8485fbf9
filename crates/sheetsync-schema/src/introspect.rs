//! Live schema introspection.
//!
//! Reads the table's current columns from SQLite's catalog. A table that
//! does not exist yet introspects as an empty schema so the first cycle can
//! bootstrap it.

use std::time::Duration;

use sqlx::sqlite::SqlitePool;
use tracing::debug;

use crate::error::{Result, StatementError, SyncError};
use crate::schema::{LiveColumn, LiveSchema};

const TABLE_INFO_SQL: &str =
    r#"SELECT name, type, "notnull", pk FROM pragma_table_info(?) ORDER BY cid"#;

/// Reads live table schemas.
#[derive(Debug, Clone)]
pub struct Introspector {
    pool: SqlitePool,
    timeout: Duration,
}

impl Introspector {
    /// Creates an introspector that gives up on each catalog query after
    /// `timeout`.
    pub fn new(pool: SqlitePool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Returns the columns currently declared on `table`.
    pub async fn live_schema(&self, table: &str) -> Result<LiveSchema> {
        let query = sqlx::query_as::<_, (String, String, i64, i64)>(TABLE_INFO_SQL)
            .bind(table)
            .fetch_all(&self.pool);

        let rows = match tokio::time::timeout(self.timeout, query).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => return Err(introspection_failed(table, e.into())),
            Err(_) => {
                return Err(introspection_failed(
                    table,
                    StatementError::Timeout(self.timeout),
                ))
            }
        };

        let columns: Vec<LiveColumn> = rows
            .into_iter()
            .map(|(name, sql_type, not_null, pk)| LiveColumn {
                name,
                sql_type,
                nullable: not_null == 0 && pk == 0,
                primary_key: pk > 0,
            })
            .collect();

        debug!(table = %table, columns = columns.len(), "Introspected live schema");
        Ok(LiveSchema::new(columns))
    }
}

fn introspection_failed(table: &str, source: StatementError) -> SyncError {
    SyncError::IntrospectionFailed {
        table: table.to_string(),
        source,
    }
}
