//! Error types for the synchronization cycle.

use std::path::PathBuf;
use std::time::Duration;

use crate::executor::AppliedChanges;

/// A single database statement that did not complete.
#[derive(Debug, thiserror::Error)]
pub enum StatementError {
    /// The driver reported an error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The statement did not finish within the configured timeout.
    #[error("statement timed out after {0:?}")]
    Timeout(Duration),
}

/// One or more DDL statements failed part-way through a cycle.
///
/// Statements that ran before the failure are not rolled back; `applied`
/// describes the schema state the table was left in.
#[derive(Debug, thiserror::Error)]
#[error("migration of table '{table}' aborted at `{statement}`: {source}")]
pub struct MigrationError {
    /// Table being migrated.
    pub table: String,
    /// The statement that failed.
    pub statement: String,
    /// Changes that were applied before the failure.
    pub applied: AppliedChanges,
    /// Underlying failure.
    #[source]
    pub source: StatementError,
}

/// Errors that can abort a synchronization cycle.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The template is missing, unparsable, or has an empty header row.
    #[error("template '{}' is unreadable: {reason}", path.display())]
    TemplateUnreadable {
        /// Path of the template file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The template names a column reserved for the table's own bookkeeping.
    #[error("template column '{0}' collides with a protected system column")]
    ProtectedColumnInTemplate(String),

    /// The live table schema could not be read.
    #[error("failed to introspect table '{table}': {source}")]
    IntrospectionFailed {
        /// Table being introspected.
        table: String,
        /// Underlying failure.
        #[source]
        source: StatementError,
    },

    /// DDL failed mid-cycle.
    #[error(transparent)]
    Migration(#[from] MigrationError),
}

impl SyncError {
    /// Returns whether retrying with the same template could succeed.
    ///
    /// Template problems stay broken until the file changes again; database
    /// problems may clear up on their own.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::IntrospectionFailed { .. } | Self::Migration(_)
        )
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::TemplateUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for synchronization operations.
pub type Result<T> = std::result::Result<T, SyncError>;
