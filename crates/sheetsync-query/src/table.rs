//! Queries over the synchronized table.

use std::time::Duration;

use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row as _;
use tracing::{debug, error};

use crate::allowlist::{AllowedField, AllowedFieldSet, is_valid_identifier};
use crate::builder::{self, FieldFilter, SelectBuilder, SelectQuery};
use crate::error::{QueryError, Result};
use crate::filter::FilterRequest;
use crate::row::Row;

/// Fields callers may filter on by default.
pub const DEFAULT_FILTER_FIELDS: &[&str] = &[
    "CUSTOMER_NAME",
    "STATE",
    "CITY",
    "REGION",
    "ZONE",
    "T_ZONE",
    "DISTIRCT",
    "TALUKA",
    "TERRITORY_CODE",
];

/// Columns returned by default, in output order.
pub const DEFAULT_PROJECTION: &[&str] = &[
    "CUSTOMER_NUMBER",
    "CUSTOMER_NAME",
    "TALUKA",
    "T_ZONE",
    "ZONE",
    "REGION",
    "DISTIRCT",
    "CITY",
    "TERRITORY_CODE",
    "STATE",
];

/// Configuration for [`TableQuery`].
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Table to query.
    pub table: String,
    /// Fields accepted in filter requests.
    pub filter_fields: Vec<String>,
    /// Fields accepted in distinct-value lookups.
    pub distinct_fields: Vec<String>,
    /// Columns returned for each row.
    pub projection: Vec<String>,
    /// Display column rows are sorted by.
    pub order_by: String,
    /// Column holding the unique customer key.
    pub key_column: String,
    /// Upper bound on each query.
    pub timeout: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        let filter_fields: Vec<String> =
            DEFAULT_FILTER_FIELDS.iter().map(|f| (*f).to_string()).collect();
        Self {
            table: "customer_data".to_string(),
            distinct_fields: filter_fields.clone(),
            filter_fields,
            projection: DEFAULT_PROJECTION.iter().map(|c| (*c).to_string()).collect(),
            order_by: "CUSTOMER_NAME".to_string(),
            key_column: "CUSTOMER_NUMBER".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Allow-listed, parameterized queries against one table.
///
/// # Example
///
/// ```ignore
/// use sheetsync_query::{FilterRequest, QueryConfig, TableQuery};
///
/// let customers = TableQuery::new(pool, QueryConfig::default())?;
/// let rows = customers
///     .search(&FilterRequest::from_pairs([("STATE", "Delhi,Haryana")]))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct TableQuery {
    pool: SqlitePool,
    table: AllowedField,
    filter_fields: AllowedFieldSet,
    distinct_fields: AllowedFieldSet,
    projection: Vec<AllowedField>,
    order_by: AllowedField,
    key_column: AllowedField,
    timeout: Duration,
}

impl TableQuery {
    /// Creates a query handle.
    ///
    /// Every configured name must be a plain identifier, otherwise this
    /// fails with [`QueryError::InvalidIdentifier`].
    pub fn new(pool: SqlitePool, config: QueryConfig) -> Result<Self> {
        Ok(Self {
            pool,
            table: AllowedField::checked(&config.table)?,
            filter_fields: AllowedFieldSet::new(&config.filter_fields)?,
            distinct_fields: AllowedFieldSet::new(&config.distinct_fields)?,
            projection: config
                .projection
                .iter()
                .map(|c| AllowedField::checked(c))
                .collect::<Result<_>>()?,
            order_by: AllowedField::checked(&config.order_by)?,
            key_column: AllowedField::checked(&config.key_column)?,
            timeout: config.timeout,
        })
    }

    /// Returns the table being queried.
    #[must_use]
    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Returns the fields accepted in filter requests.
    #[must_use]
    pub fn filter_fields(&self) -> &AllowedFieldSet {
        &self.filter_fields
    }

    /// Returns the fields accepted in distinct-value lookups.
    #[must_use]
    pub fn distinct_fields(&self) -> &AllowedFieldSet {
        &self.distinct_fields
    }

    /// Returns rows matching every field of `request`.
    ///
    /// Every field is validated before the database is touched; one unknown
    /// field rejects the whole request. An empty request returns all rows.
    pub async fn search(&self, request: &FilterRequest) -> Result<Vec<Row>> {
        let filters = request
            .iter()
            .map(|(field, values)| {
                Ok(FieldFilter {
                    field: self.filter_fields.validate(field)?,
                    values: values.to_vec(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let query = filters
            .into_iter()
            .fold(self.select(), SelectBuilder::filter)
            .build();
        self.fetch_rows(&query).await
    }

    /// Returns rows whose `field` equals `value` exactly.
    pub async fn search_by_field(&self, field: &str, value: &str) -> Result<Vec<Row>> {
        let filter = FieldFilter {
            field: self.filter_fields.validate(field)?,
            values: vec![value.to_string()],
        };
        let query = self.select().filter(filter).build();
        self.fetch_rows(&query).await
    }

    /// Looks up the row whose key column equals `key`.
    ///
    /// Returns the first match in display order if the key is not unique.
    pub async fn find_by_key(&self, key: &str) -> Result<Option<Row>> {
        let query = self
            .select()
            .filter(FieldFilter {
                field: self.key_column.clone(),
                values: vec![key.to_string()],
            })
            .limit(1)
            .build();
        Ok(self.fetch_rows(&query).await?.into_iter().next())
    }

    /// Returns the distinct non-empty values of `field`, ascending.
    pub async fn distinct_values(&self, field: &str) -> Result<Vec<String>> {
        let name = field.trim();
        if !is_valid_identifier(name) {
            return Err(QueryError::InvalidIdentifier(field.to_string()));
        }
        let field = self.distinct_fields.validate(name)?;

        let query = builder::distinct_values(&self.table, &field);
        self.fetch(&query)
            .await?
            .iter()
            .map(|row| row.try_get::<String, _>(0).map_err(QueryError::from))
            .collect()
    }

    fn select(&self) -> SelectBuilder<'_> {
        SelectBuilder::new(&self.table, &self.projection).order_by(&self.order_by)
    }

    async fn fetch_rows(&self, query: &SelectQuery) -> Result<Vec<Row>> {
        self.fetch(query)
            .await?
            .iter()
            .map(|row| self.decode(row))
            .collect()
    }

    fn decode(&self, row: &SqliteRow) -> Result<Row> {
        let columns = self
            .projection
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let value: Option<String> = row.try_get(i)?;
                Ok((column.as_str().to_string(), value))
            })
            .collect::<Result<_>>()?;
        Ok(Row::new(columns))
    }

    async fn fetch(&self, query: &SelectQuery) -> Result<Vec<SqliteRow>> {
        let mut statement = sqlx::query(&query.sql);
        for param in &query.params {
            statement = statement.bind(param.as_str());
        }

        debug!(sql = %query.sql, params = query.params.len(), "Executing query");
        match tokio::time::timeout(self.timeout, statement.fetch_all(&self.pool)).await {
            Ok(Ok(rows)) => Ok(rows),
            Ok(Err(e)) => {
                error!(table = %self.table, error = %e, "Query failed");
                Err(e.into())
            }
            Err(_) => {
                error!(table = %self.table, timeout = ?self.timeout, "Query timed out");
                Err(QueryError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn create_test_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .expect("Failed to create in-memory SQLite pool")
    }

    #[tokio::test]
    async fn test_config_names_are_checked() {
        let pool = create_test_pool().await;
        let config = QueryConfig {
            table: "customer_data; DROP TABLE x".into(),
            ..QueryConfig::default()
        };

        let err = TableQuery::new(pool, config).unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier(_)));
    }

    #[tokio::test]
    async fn test_default_config() {
        let pool = create_test_pool().await;
        let query = TableQuery::new(pool, QueryConfig::default()).unwrap();

        assert_eq!(query.table(), "customer_data");
        assert_eq!(query.filter_fields().len(), DEFAULT_FILTER_FIELDS.len());
        assert!(query.distinct_fields().contains("DISTIRCT"));
        assert!(!query.filter_fields().contains("CUSTOMER_NUMBER"));
    }

    #[tokio::test]
    async fn test_missing_table_is_execution_failure() {
        let pool = create_test_pool().await;
        let query = TableQuery::new(pool, QueryConfig::default()).unwrap();

        let err = query.search(&FilterRequest::new()).await.unwrap_err();
        assert!(matches!(err, QueryError::ExecutionFailed(_)));
        assert!(!err.is_rejected());
    }
}
