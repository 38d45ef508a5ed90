//! Typed error enum for the migration runners.
//!
//! Nothing here is caught or retried: every variant propagates to the runner,
//! which rolls back the run's transaction and hands the error to the caller.

use terrareg_schema_core::{RevisionError, SourceTable};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    /// SQLite statement or connection failure, message kept verbatim.
    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// PostgreSQL statement or connection failure, message kept verbatim.
    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error(transparent)]
    Revision(#[from] RevisionError),

    /// Blob larger than the column type can hold.
    #[error("{table}.{column} of row {id} is {len} bytes, above the {max} byte limit")]
    PayloadTooLarge { table: SourceTable, id: i64, column: &'static str, len: usize, max: usize },

    /// `PRAGMA foreign_key_check` reported rows after the run.
    #[error("foreign key check failed with {0} violating row(s)")]
    ForeignKeyViolations(usize),

    /// The version table names a revision this build does not know.
    #[error("database is at unknown revision {0}")]
    UnknownStoredRevision(String),

    #[error("unsupported database url: {0}")]
    UnsupportedDatabase(String),

    /// Invariant broken while a migration was running.
    #[error("migration error: {0}")]
    Migration(String),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StorageError {
    pub(crate) fn payload_too_large(
        table: SourceTable,
        id: i64,
        (column, len): (&'static str, usize),
    ) -> Self {
        Self::PayloadTooLarge { table, id, column, len, max: terrareg_schema_core::MAX_BLOB_LEN }
    }
}
