//! Test utilities and module declarations for storage tests.

use rusqlite::{Connection, params};
use tempfile::TempDir;
use terrareg_schema_core::{BASELINE_REVISION, SourceRow, SourceTable, Target};

use crate::Migrator;
use crate::migrations::{self, column_helpers::quote_ident, v2};
use crate::relocation;

pub fn create_test_migrator() -> (Migrator, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let migrator = Migrator::open(&temp_dir.path().join("test.db")).unwrap();
    (migrator, temp_dir)
}

/// Migrator whose database sits at the baseline revision, ready for seeding.
pub fn create_baseline_migrator() -> (Migrator, TempDir) {
    let (mut migrator, temp_dir) = create_test_migrator();
    migrator.upgrade(&Target::Revision(BASELINE_REVISION.to_owned())).unwrap();
    (migrator, temp_dir)
}

/// Schema in the state relocation runs in: baseline tables, `module_details`
/// and the link column on both source tables.
pub fn prepare_relocation(conn: &Connection) {
    migrations::find(BASELINE_REVISION).unwrap().upgrade(conn).unwrap();
    v2::create_detail_table(conn).unwrap();
    for table in SourceTable::UPGRADE_ORDER {
        v2::add_detail_link(conn, table).unwrap();
    }
}

pub fn insert_module_version(
    conn: &Connection,
    version: &str,
    readme: Option<&[u8]>,
    docs: Option<&[u8]>,
) -> i64 {
    conn.execute(
        "INSERT INTO module_version (module_provider_id, version, published, readme_content, \
         module_details) VALUES (1, ?1, 1, ?2, ?3)",
        params![version, readme, docs],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn insert_submodule(
    conn: &Connection,
    parent: i64,
    path: &str,
    readme: Option<&[u8]>,
    docs: Option<&[u8]>,
) -> i64 {
    conn.execute(
        "INSERT INTO submodule (parent_module_version, type, path, readme_content, \
         module_details) VALUES (?1, 'submodule', ?2, ?3, ?4)",
        params![parent, path, readme, docs],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn column_names(conn: &Connection, table: &str) -> Vec<String> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table))).unwrap();
    stmt.query_map([], |row| row.get(1)).unwrap().collect::<Result<_, _>>().unwrap()
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT count(*) FROM {}", quote_ident(table)), [], |row| {
        row.get(0)
    })
    .unwrap()
}

/// Blob columns of every source row, as stored before an upgrade.
pub fn source_state(conn: &Connection) -> Vec<(SourceTable, Vec<SourceRow>)> {
    SourceTable::UPGRADE_ORDER
        .into_iter()
        .map(|table| (table, relocation::snapshot(conn, table).unwrap()))
        .collect()
}

/// SQLite storage class of both payload columns of every source row.
pub fn payload_types(conn: &Connection) -> Vec<(SourceTable, i64, String, String)> {
    let mut types = Vec::new();
    for table in SourceTable::UPGRADE_ORDER {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT id, typeof(readme_content), typeof(module_details) FROM {table} ORDER BY id"
            ))
            .unwrap();
        let rows = stmt
            .query_map([], |row| Ok((table, row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap();
        for row in rows {
            types.push(row.unwrap());
        }
    }
    types
}
