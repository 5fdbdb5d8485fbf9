//! Schema differ.
//!
//! Compares the canonical schema from the template with the live table and
//! produces the add/drop change-set that reconciles them. Column types are
//! never compared: a column that exists under the same name is left alone.

use std::collections::BTreeSet;

use crate::ddl::system_column_names;
use crate::error::{Result, SyncError};
use crate::schema::{CanonicalSchema, LiveSchema, SchemaChangeSet, normalize_column_name};

/// Names SQLite resolves to the implicit row id. A real column under one of
/// them would shadow it.
pub const ROWID_ALIASES: &[&str] = &["ROWID", "OID", "_ROWID_"];

/// Computes change-sets between canonical and live schemas.
#[derive(Debug, Clone)]
pub struct SchemaDiffer {
    protected: BTreeSet<String>,
}

impl Default for SchemaDiffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaDiffer {
    /// Creates a differ protecting the system columns and rowid aliases.
    #[must_use]
    pub fn new() -> Self {
        Self::with_protected(std::iter::empty::<&str>())
    }

    /// Creates a differ protecting `columns` on top of the system columns
    /// and rowid aliases, which are always protected.
    ///
    /// Live primary-key columns are protected in addition to these.
    #[must_use]
    pub fn with_protected<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut protected: BTreeSet<String> = system_column_names()
            .chain(ROWID_ALIASES.iter().copied())
            .map(normalize_column_name)
            .collect();
        protected.extend(columns.into_iter().map(|c| normalize_column_name(c.as_ref())));
        Self { protected }
    }

    /// Returns the protected columns, normalized and sorted.
    pub fn protected_columns(&self) -> impl Iterator<Item = &str> {
        self.protected.iter().map(String::as_str)
    }

    /// Checks whether a column is in the protected set.
    #[must_use]
    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.contains(&normalize_column_name(name))
    }

    /// Rejects templates that name a protected column.
    pub fn check_template(&self, canonical: &CanonicalSchema) -> Result<()> {
        match canonical.columns().iter().find(|c| self.is_protected(c)) {
            Some(column) => Err(SyncError::ProtectedColumnInTemplate(column.clone())),
            None => Ok(()),
        }
    }

    /// Returns the operations needed to bring `live` in line with
    /// `canonical`.
    ///
    /// Additions follow template order; drops follow the table's declaration
    /// order, so the result is deterministic for a given pair of inputs.
    #[must_use]
    pub fn diff(&self, canonical: &CanonicalSchema, live: &LiveSchema) -> SchemaChangeSet {
        let columns_to_add = canonical
            .columns()
            .iter()
            .filter(|c| !live.contains(c))
            .cloned()
            .collect();

        let columns_to_drop = live
            .columns
            .iter()
            .filter(|c| !c.primary_key && !self.is_protected(&c.name))
            .filter(|c| !canonical.contains(&c.name))
            .map(|c| c.name.clone())
            .collect();

        SchemaChangeSet {
            create_table: live.is_empty(),
            columns_to_add,
            columns_to_drop,
        }
    }
}
