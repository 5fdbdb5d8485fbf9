//! DDL statements for SQLite.
//!
//! Template columns all share one type: nullable `TEXT` with no default, so
//! rows that predate a column stay valid without a value for it.

use std::fmt;

use crate::schema::SchemaChangeSet;

/// Declared type of every template column.
pub const TEMPLATE_COLUMN_TYPE: &str = "TEXT";

/// Columns created with the table on first sync, with their definitions.
const SYSTEM_COLUMNS: &[(&str, &str)] = &[
    ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
    ("created_at", "TEXT DEFAULT CURRENT_TIMESTAMP"),
    ("updated_at", "TEXT DEFAULT CURRENT_TIMESTAMP"),
];

/// Returns the names of the columns [`DdlStatement::CreateTable`] creates.
pub fn system_column_names() -> impl Iterator<Item = &'static str> {
    SYSTEM_COLUMNS.iter().map(|(name, _)| *name)
}

/// A single schema operation on the synchronized table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DdlStatement {
    /// Create the table with its system columns.
    CreateTable,
    /// Add a nullable text column.
    AddColumn(String),
    /// Drop a column and all of its data.
    DropColumn(String),
}

impl DdlStatement {
    /// Orders a change-set into statements: table creation, then every
    /// addition, then every drop.
    #[must_use]
    pub fn plan(changes: &SchemaChangeSet) -> Vec<Self> {
        let mut statements = Vec::with_capacity(
            usize::from(changes.create_table)
                + changes.columns_to_add.len()
                + changes.columns_to_drop.len(),
        );
        if changes.create_table {
            statements.push(Self::CreateTable);
        }
        statements.extend(changes.columns_to_add.iter().cloned().map(Self::AddColumn));
        statements.extend(changes.columns_to_drop.iter().cloned().map(Self::DropColumn));
        statements
    }

    /// Returns whether the statement destroys data.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::DropColumn(_))
    }

    /// Renders the statement against `table`.
    #[must_use]
    pub fn to_sql(&self, table: &str) -> String {
        let table = quote_identifier(table);
        match self {
            Self::CreateTable => {
                let columns: Vec<String> = SYSTEM_COLUMNS
                    .iter()
                    .map(|(name, definition)| format!("{} {definition}", quote_identifier(name)))
                    .collect();
                format!(
                    "CREATE TABLE IF NOT EXISTS {table} (\n  {}\n)",
                    columns.join(",\n  ")
                )
            }
            Self::AddColumn(column) => format!(
                "ALTER TABLE {table} ADD COLUMN {} {TEMPLATE_COLUMN_TYPE}",
                quote_identifier(column)
            ),
            Self::DropColumn(column) => format!(
                "ALTER TABLE {table} DROP COLUMN {}",
                quote_identifier(column)
            ),
        }
    }
}

impl fmt::Display for DdlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateTable => write!(f, "create table"),
            Self::AddColumn(column) => write!(f, "add column {column}"),
            Self::DropColumn(column) => write!(f, "drop column {column}"),
        }
    }
}

/// Quotes an identifier, doubling any embedded quote characters.
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
