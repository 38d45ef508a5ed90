//! Migration a36ffbb6580e: registry tables that predate `module_details`.
//!
//! Only the columns this chain touches or depends on are declared. Tables
//! that already exist are left as they are, so an existing registry database
//! can be brought under this chain by upgrading through the baseline.

use rusqlite::Connection;
use terrareg_schema_core::Revision;

use super::Migration;
use crate::error::StorageError;
use crate::revisions;

pub(super) const UP_SQL: &str = "
CREATE TABLE IF NOT EXISTS module_version (
    id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    module_provider_id INTEGER,
    version VARCHAR(128) NOT NULL,
    git_sha VARCHAR(128),
    published BOOLEAN,
    readme_content BLOB,
    module_details BLOB
);

CREATE TABLE IF NOT EXISTS submodule (
    id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    parent_module_version INTEGER NOT NULL,
    type VARCHAR(128),
    path VARCHAR(1024) NOT NULL,
    name VARCHAR(128),
    readme_content BLOB,
    module_details BLOB,
    CONSTRAINT fk_submodule_parent_module_version_module_version_id
        FOREIGN KEY (parent_module_version) REFERENCES module_version (id)
        ON UPDATE CASCADE ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS ix_submodule_parent_module_version
    ON submodule (parent_module_version);
";

pub(super) const DOWN_SQL: &str = "
DROP TABLE submodule;
DROP TABLE module_version;
";

pub(super) struct Baseline;

impl Migration for Baseline {
    fn revision(&self) -> &'static Revision {
        &revisions::BASELINE
    }

    fn upgrade(&self, conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(UP_SQL)?;
        Ok(())
    }

    fn downgrade(&self, conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(DOWN_SQL)?;
        Ok(())
    }
}
