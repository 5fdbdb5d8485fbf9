//! Schema representation types.
//!
//! The canonical schema is what the template asks for, the live schema is
//! what the table currently has, and the change-set is the delta between
//! them. Column names are compared in their normalized (trimmed, upper-case)
//! form everywhere.

use std::collections::HashSet;

use serde::Serialize;

/// Normalizes a column name for comparison: trimmed and upper-cased.
#[must_use]
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Ordered, duplicate-free column names derived from a template header row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalSchema {
    columns: Vec<String>,
}

impl CanonicalSchema {
    /// Builds a canonical schema from raw header cells.
    ///
    /// Cells are normalized, blank cells are skipped, and repeated names
    /// collapse onto their first occurrence.
    #[must_use]
    pub fn from_headers<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let columns = headers
            .into_iter()
            .map(|h| normalize_column_name(h.as_ref()))
            .filter(|name| !name.is_empty())
            .filter(|name| seen.insert(name.clone()))
            .collect();
        Self { columns }
    }

    /// Returns the column names in template order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Checks whether the schema contains a column (case-insensitive).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let name = normalize_column_name(name);
        self.columns.iter().any(|c| *c == name)
    }

    /// Returns the number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns whether there are no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A column as currently declared on the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveColumn {
    /// Column name, spelled as the table declares it.
    pub name: String,
    /// Declared type (may be empty for untyped SQLite columns).
    pub sql_type: String,
    /// Whether the column allows NULL values.
    pub nullable: bool,
    /// Whether the column is part of the primary key.
    pub primary_key: bool,
}

impl LiveColumn {
    /// Creates a nullable, non-key text column.
    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: "TEXT".to_string(),
            nullable: true,
            primary_key: false,
        }
    }

    /// Marks the column as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// Snapshot of the table's columns taken once per sync cycle.
///
/// An empty snapshot means the table does not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveSchema {
    /// Columns in declaration order.
    pub columns: Vec<LiveColumn>,
}

impl LiveSchema {
    /// Creates a live schema from its columns.
    #[must_use]
    pub fn new(columns: Vec<LiveColumn>) -> Self {
        Self { columns }
    }

    /// Gets a column by name (case-insensitive).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LiveColumn> {
        let name = normalize_column_name(name);
        self.columns
            .iter()
            .find(|c| normalize_column_name(&c.name) == name)
    }

    /// Checks whether a column exists (case-insensitive).
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns whether the table is absent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// The add/drop delta that reconciles a live schema with a canonical one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaChangeSet {
    /// The table is absent and must be created with its system columns first.
    pub create_table: bool,
    /// Columns to add, in template order.
    pub columns_to_add: Vec<String>,
    /// Columns to drop, spelled as the table declares them.
    pub columns_to_drop: Vec<String>,
}

impl SchemaChangeSet {
    /// Returns whether applying this change-set would do nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.create_table && self.columns_to_add.is_empty() && self.columns_to_drop.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_normalizes_and_dedupes() {
        let schema = CanonicalSchema::from_headers([
            " customer_number",
            "Customer_Name ",
            "",
            "STATE",
            "customer_name",
            "   ",
            "city",
        ]);

        assert_eq!(
            schema.columns(),
            ["CUSTOMER_NUMBER", "CUSTOMER_NAME", "STATE", "CITY"]
        );
        assert!(schema.contains("state"));
        assert!(!schema.contains("zone"));
    }

    #[test]
    fn test_live_schema_lookup_is_case_insensitive() {
        let live = LiveSchema::new(vec![
            LiveColumn::text("id").primary_key(),
            LiveColumn::text("Customer_Name"),
        ]);

        assert!(live.contains("CUSTOMER_NAME"));
        assert_eq!(live.get("ID").map(|c| c.primary_key), Some(true));
        assert!(!live.contains("STATE"));
        assert_eq!(live.column_names().collect::<Vec<_>>(), ["id", "Customer_Name"]);
    }

    #[test]
    fn test_change_set_is_empty() {
        assert!(SchemaChangeSet::default().is_empty());
        assert!(!SchemaChangeSet {
            create_table: true,
            ..SchemaChangeSet::default()
        }
        .is_empty());
        assert!(!SchemaChangeSet {
            columns_to_drop: vec!["ZONE".into()],
            ..SchemaChangeSet::default()
        }
        .is_empty());
    }
}
