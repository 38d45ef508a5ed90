//! Moving blob payloads between source tables and `module_details` (SQLite).

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, Row, params};
use terrareg_schema_core::{DetailLink, DetailRecord, RelocationReport, SourceRow, SourceTable};

use crate::error::StorageError;

/// Copy every row's `readme_content`/`module_details` into a new
/// `module_details` row and point the source row's `module_details_id` at it.
///
/// The source table is read completely before the first write, so updates to
/// it cannot disturb the iteration. Each snapshotted row gets exactly one
/// detail record and one link update, in ascending id order. Payloads are
/// copied inside SQLite, so TEXT values stay TEXT and BLOB values stay BLOB.
/// On error the rows already processed stay written; undoing them is the job
/// of the caller's transaction.
pub fn relocate(conn: &Connection, table: SourceTable) -> Result<RelocationReport, StorageError> {
    let rows = snapshot(conn, table)?;
    tracing::info!(%table, rows = rows.len(), "relocating blob columns into module_details");

    let mut insert = conn.prepare(&format!(
        "INSERT INTO module_details (readme_content, terraform_docs)
         SELECT readme_content, module_details FROM {table} WHERE id = ?1"
    ))?;
    let mut link =
        conn.prepare(&format!("UPDATE {table} SET module_details_id = ?1 WHERE id = ?2"))?;

    let mut report = RelocationReport::new(table);
    for row in &rows {
        if let Some(oversized) = row.oversized_column() {
            return Err(StorageError::payload_too_large(table, row.id, oversized));
        }
        let module_details_id = insert.insert([row.id])?;
        let updated = link.execute(params![module_details_id, row.id])?;
        if updated != 1 {
            return Err(StorageError::Migration(format!(
                "{table} row {} matched {updated} rows while linking module_details \
                 {module_details_id}",
                row.id
            )));
        }
        tracing::debug!(%table, source_id = row.id, module_details_id, "linked module details");
        report.links.push(DetailLink { source_id: row.id, module_details_id });
    }
    Ok(report)
}

/// Fill the re-added blob columns of `table` from the `module_details` row
/// each source row references. Rows without a reference keep nulls.
///
/// Returns the number of source rows that received content.
pub fn restore(conn: &Connection, table: SourceTable) -> Result<usize, StorageError> {
    let restored = conn.execute(
        &format!(
            "UPDATE {table}
             SET readme_content = d.readme_content, module_details = d.terraform_docs
             FROM module_details AS d
             WHERE d.id = {table}.module_details_id"
        ),
        [],
    )?;
    Ok(restored)
}

/// All `(id, readme_content, module_details)` triples of `table`, by id.
pub fn snapshot(conn: &Connection, table: SourceTable) -> Result<Vec<SourceRow>, StorageError> {
    let mut stmt = conn
        .prepare(&format!("SELECT id, readme_content, module_details FROM {table} ORDER BY id"))?;
    let rows = stmt.query_map([], |row| {
        Ok(SourceRow::new(row.get(0)?, blob_column(row, 1)?, blob_column(row, 2)?))
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

/// The `module_details` row referenced by source row `source_id`, if any.
pub fn linked_detail(
    conn: &Connection,
    table: SourceTable,
    source_id: i64,
) -> Result<Option<DetailRecord>, StorageError> {
    let record = conn
        .query_row(
            &format!(
                "SELECT d.id, d.readme_content, d.terraform_docs
                 FROM {table} AS s JOIN module_details AS d ON d.id = s.module_details_id
                 WHERE s.id = ?1"
            ),
            [source_id],
            |row| {
                Ok(DetailRecord {
                    id: row.get(0)?,
                    readme_content: blob_column(row, 1)?,
                    terraform_docs: blob_column(row, 2)?,
                })
            },
        )
        .optional()?;
    Ok(record)
}

/// Blob column that older rows may hold as TEXT.
fn blob_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Vec<u8>>> {
    match row.get_ref(idx)? {
        ValueRef::Null => Ok(None),
        ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Ok(Some(bytes.to_vec())),
        other => Err(rusqlite::Error::InvalidColumnType(
            idx,
            format!("column {idx}"),
            other.data_type(),
        )),
    }
}
