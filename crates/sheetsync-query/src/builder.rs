//! SQL text for table queries.
//!
//! Builders only accept [`AllowedField`]s for anything interpolated into the
//! statement; every value travels as a bound parameter.

use crate::allowlist::AllowedField;

/// A statement and its positional parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    /// SQL with `?` placeholders.
    pub sql: String,
    /// Values for the placeholders, in order.
    pub params: Vec<String>,
}

/// One `IN` condition.
#[derive(Debug, Clone)]
pub struct FieldFilter {
    /// Validated column.
    pub field: AllowedField,
    /// Accepted values; an empty list adds no condition.
    pub values: Vec<String>,
}

/// Builds a projected, filtered, ordered `SELECT`.
#[derive(Debug, Clone)]
pub struct SelectBuilder<'a> {
    table: &'a AllowedField,
    projection: &'a [AllowedField],
    filters: Vec<FieldFilter>,
    order_by: Option<&'a AllowedField>,
    limit: Option<i64>,
}

impl<'a> SelectBuilder<'a> {
    /// Starts a query over `table` returning `projection`.
    #[must_use]
    pub fn new(table: &'a AllowedField, projection: &'a [AllowedField]) -> Self {
        Self {
            table,
            projection,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    /// Adds a filter; filters are combined with AND.
    #[must_use]
    pub fn filter(mut self, filter: FieldFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Orders by `column` ascending, then by insertion order.
    #[must_use]
    pub fn order_by(mut self, column: &'a AllowedField) -> Self {
        self.order_by = Some(column);
        self
    }

    /// Limits the number of rows.
    #[must_use]
    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Builds the SQL and parameters.
    #[must_use]
    pub fn build(&self) -> SelectQuery {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        // Cast so every column decodes as text regardless of stored affinity.
        let columns: Vec<String> = self
            .projection
            .iter()
            .map(|c| format!("CAST({0} AS TEXT) AS {0}", c.quoted()))
            .collect();
        sql.push_str(&columns.join(", "));

        sql.push_str(" FROM ");
        sql.push_str(&self.table.quoted());

        let conditions: Vec<String> = self
            .filters
            .iter()
            .filter(|f| !f.values.is_empty())
            .map(|f| {
                params.extend(f.values.iter().cloned());
                let placeholders = vec!["?"; f.values.len()].join(", ");
                format!("{} IN ({placeholders})", f.field.quoted())
            })
            .collect();
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        if let Some(column) = self.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(&column.quoted());
            sql.push_str(" ASC, rowid ASC");
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        SelectQuery { sql, params }
    }
}

/// Builds the distinct-values query for one column.
#[must_use]
pub fn distinct_values(table: &AllowedField, field: &AllowedField) -> SelectQuery {
    let column = field.quoted();
    SelectQuery {
        sql: format!(
            "SELECT DISTINCT CAST({column} AS TEXT) FROM {} \
             WHERE {column} IS NOT NULL AND {column} != '' ORDER BY 1",
            table.quoted()
        ),
        params: Vec::new(),
    }
}
