//! Schema migrations for the terrareg module registry
//!
//! Runs the revision chain against SQLite (rusqlite) or PostgreSQL (sqlx),
//! moving readme and terraform-docs payloads between the source tables and
//! `module_details`.

pub mod backend;
mod error;
mod plan;
pub mod revisions;

#[cfg(feature = "sqlite")]
mod migrations;
#[cfg(feature = "sqlite")]
pub mod relocation;
#[cfg(feature = "sqlite")]
mod runner;
#[cfg(all(test, feature = "sqlite"))]
mod tests;

#[cfg(feature = "postgres")]
pub mod pg_migrations;
#[cfg(feature = "postgres")]
mod pg_runner;

pub use backend::{DatabaseLocation, MigrationBackend};
pub use error::StorageError;
#[cfg(feature = "sqlite")]
pub use migrations::{Migration, find as find_migration};
#[cfg(feature = "sqlite")]
pub use migrations::batch::rebuild_without_columns;
#[cfg(feature = "postgres")]
pub use pg_runner::PgMigrator;
pub use plan::{HistoryEntry, MigrationReport};
#[cfg(feature = "sqlite")]
pub use runner::Migrator;
