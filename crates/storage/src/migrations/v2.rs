//! Migration 47e45e505e22: move common submodule/module_version columns to
//! the new `module_details` table.
//!
//! Upgrade: create `module_details`, then per source table add the
//! `module_details_id` link, relocate the blobs, drop the old columns.
//! Downgrade: per source table re-add the blob columns, restore them through
//! the link, drop the link; finally drop `module_details`.

use rusqlite::Connection;
use terrareg_schema_core::{
    DETAIL_LINK_COLUMN, README_COLUMN, Revision, SOURCE_DOCS_COLUMN, SourceTable,
};

use super::Migration;
use super::batch::rebuild_without_columns;
use super::column_helpers::{add_column, column_exists, drop_column, quote_ident};
use crate::error::StorageError;
use crate::relocation;
use crate::revisions;

pub(super) const CREATE_DETAIL_TABLE_SQL: &str = "
CREATE TABLE module_details (
    id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    readme_content BLOB,
    terraform_docs BLOB
)";

pub(crate) fn create_detail_table(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(CREATE_DETAIL_TABLE_SQL, [])?;
    Ok(())
}

/// Add the nullable, named `module_details_id` foreign key to `table`.
pub(crate) fn add_detail_link(
    conn: &Connection,
    table: SourceTable,
) -> Result<(), StorageError> {
    if column_exists(conn, table.table_name(), DETAIL_LINK_COLUMN)? {
        return Err(StorageError::Migration(format!("{table} already has {DETAIL_LINK_COLUMN}")));
    }
    let definition = format!(
        "INTEGER CONSTRAINT {} REFERENCES module_details (id) \
         ON UPDATE CASCADE ON DELETE CASCADE",
        quote_ident(table.foreign_key_name())
    );
    add_column(conn, table.table_name(), DETAIL_LINK_COLUMN, &definition)?;
    Ok(())
}

pub(crate) fn drop_source_columns(
    conn: &Connection,
    table: SourceTable,
) -> Result<(), StorageError> {
    drop_column(conn, table.table_name(), README_COLUMN)?;
    drop_column(conn, table.table_name(), SOURCE_DOCS_COLUMN)?;
    Ok(())
}

pub(crate) fn readd_source_columns(
    conn: &Connection,
    table: SourceTable,
) -> Result<(), StorageError> {
    add_column(conn, table.table_name(), README_COLUMN, "BLOB")?;
    add_column(conn, table.table_name(), SOURCE_DOCS_COLUMN, "BLOB")?;
    Ok(())
}

/// Drop `module_details_id` together with its foreign key.
pub(crate) fn drop_detail_link(
    conn: &Connection,
    table: SourceTable,
) -> Result<(), StorageError> {
    rebuild_without_columns(conn, table.table_name(), &[DETAIL_LINK_COLUMN])
}

pub(super) struct ModuleDetails;

impl Migration for ModuleDetails {
    fn revision(&self) -> &'static Revision {
        &revisions::MODULE_DETAILS
    }

    fn upgrade(&self, conn: &Connection) -> Result<(), StorageError> {
        create_detail_table(conn)?;
        for table in SourceTable::UPGRADE_ORDER {
            add_detail_link(conn, table)?;
            let report = relocation::relocate(conn, table)?;
            tracing::info!(%table, created = report.created(), "module details relocated");
            drop_source_columns(conn, table)?;
        }
        Ok(())
    }

    fn downgrade(&self, conn: &Connection) -> Result<(), StorageError> {
        for table in SourceTable::DOWNGRADE_ORDER {
            readd_source_columns(conn, table)?;
            let restored = relocation::restore(conn, table)?;
            tracing::info!(%table, restored, "module details restored");
            drop_detail_link(conn, table)?;
        }
        conn.execute("DROP TABLE module_details", [])?;
        Ok(())
    }
}
