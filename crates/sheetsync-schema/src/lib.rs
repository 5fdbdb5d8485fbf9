//! Keeps a SQLite table's columns in line with a spreadsheet template.
//!
//! The first row of the template names the columns the table must have.
//! Each sync cycle reads that row, introspects the table, and applies the
//! additions and removals that close the gap. System columns (`id`,
//! `created_at`, `updated_at`) and primary keys are never dropped.
//!
//! # Architecture
//!
//! - **Template** - Reads the header row from `.xlsx`/`.xls`/`.ods`/`.csv`
//! - **Introspect** - Reads the live columns from SQLite's catalog
//! - **Diff** - Computes the add/drop change-set
//! - **Executor** - Applies the change-set, additions before drops
//! - **Sync** - Runs one full cycle and records the outcome
//! - **Watcher** - Polls the template and coalesces change triggers
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sheetsync_schema::prelude::*;
//!
//! let synchronizer = Arc::new(Synchronizer::new(
//!     pool,
//!     TemplateFile::new("template.xlsx"),
//!     SyncConfig::default(),
//! ));
//! synchronizer.sync().await?;
//!
//! let handle = SyncService::start(Arc::clone(&synchronizer), WatchConfig::default());
//! // ...
//! handle.shutdown().await;
//! ```

pub mod ddl;
pub mod diff;
pub mod error;
pub mod executor;
pub mod introspect;
pub mod schema;
pub mod state;
pub mod sync;
pub mod template;
pub mod watcher;

pub use error::{MigrationError, Result, StatementError, SyncError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::ddl::{DdlStatement, system_column_names};
    pub use crate::diff::{ROWID_ALIASES, SchemaDiffer};
    pub use crate::error::{MigrationError, Result, StatementError, SyncError};
    pub use crate::executor::{AppliedChanges, MigrationExecutor};
    pub use crate::introspect::Introspector;
    pub use crate::schema::{CanonicalSchema, LiveColumn, LiveSchema, SchemaChangeSet};
    pub use crate::state::{SyncState, SyncStatus};
    pub use crate::sync::{CycleReport, SyncConfig, SyncPlan, Synchronizer};
    pub use crate::template::{TemplateFile, TemplateFormat, TemplateSource};
    pub use crate::watcher::{SyncHandle, SyncService, SyncTrigger, WatchConfig};
}
