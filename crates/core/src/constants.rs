//! Shared constants for terrareg-schema.
//!
//! Table, column and constraint names here are part of the persisted layout
//! and must not change once released.

/// Table holding the relocated readme/documentation payloads.
pub const DETAIL_TABLE: &str = "module_details";

/// Foreign key column added to each source table.
pub const DETAIL_LINK_COLUMN: &str = "module_details_id";

/// Readme blob column, present on source tables before upgrade and on `module_details` after.
pub const README_COLUMN: &str = "readme_content";

/// Documentation blob column on source tables before upgrade.
pub const SOURCE_DOCS_COLUMN: &str = "module_details";

/// Documentation blob column on `module_details`.
pub const DETAIL_DOCS_COLUMN: &str = "terraform_docs";

/// Largest payload accepted for a blob column (MEDIUMBLOB limit).
pub const MAX_BLOB_LEN: usize = 16_777_215;

/// Table recording the currently applied revision.
pub const VERSION_TABLE: &str = "alembic_version";

/// Revision that introduced the pre-existing registry tables.
pub const BASELINE_REVISION: &str = "a36ffbb6580e";

/// Revision moving blob columns into `module_details`.
pub const MODULE_DETAILS_REVISION: &str = "47e45e505e22";

/// Database used when neither `--database` nor `DATABASE_URL` is given.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:///modules.db";

/// Environment variable overriding the SQLite busy timeout.
pub const BUSY_TIMEOUT_ENV: &str = "TERRAREG_SCHEMA_BUSY_TIMEOUT_MS";

/// Default SQLite busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// PostgreSQL connection pool: maximum connections.
/// A migration run holds a single transaction, so one connection is enough.
pub const PG_POOL_MAX_CONNECTIONS: u32 = 1;

/// PostgreSQL connection pool: acquire timeout in seconds.
pub const PG_POOL_ACQUIRE_TIMEOUT_SECS: u64 = 10;
