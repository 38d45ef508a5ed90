#![allow(
    clippy::redundant_pub_crate,
    reason = "migrations module is private, pub(crate) is intentional"
)]

pub(crate) mod batch;
pub(crate) mod column_helpers;
mod v1;
pub(crate) mod v2;

use rusqlite::Connection;
use terrareg_schema_core::Revision;

use crate::error::StorageError;

/// One SQLite schema step. Both directions receive the run's connection,
/// normally a transaction owned by the runner.
pub trait Migration: Send + Sync {
    fn revision(&self) -> &'static Revision;

    fn upgrade(&self, conn: &Connection) -> Result<(), StorageError>;

    fn downgrade(&self, conn: &Connection) -> Result<(), StorageError>;
}

static MIGRATIONS: [&dyn Migration; 2] = [&v1::Baseline, &v2::ModuleDetails];

/// Implementation of the revision `id`.
pub fn find(id: &str) -> Option<&'static dyn Migration> {
    MIGRATIONS.iter().copied().find(|m| m.revision().id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revisions;

    #[test]
    fn test_every_revision_has_an_implementation() {
        for revision in revisions::chain().unwrap().iter() {
            let migration = find(revision.id).unwrap();
            assert_eq!(migration.revision(), revision);
        }
        assert!(find("000000000000").is_none());
    }

    #[test]
    fn test_baseline_is_idempotent_on_existing_tables() {
        let conn = Connection::open_in_memory().unwrap();
        let baseline = find("a36ffbb6580e").unwrap();
        baseline.upgrade(&conn).unwrap();
        baseline.upgrade(&conn).unwrap();
        baseline.downgrade(&conn).unwrap();
        assert!(!column_helpers::table_exists(&conn, "module_version").unwrap());
    }
}
