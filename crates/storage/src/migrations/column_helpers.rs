use rusqlite::{Connection, OptionalExtension};

/// Quote an identifier for interpolation into DDL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn table_exists(conn: &Connection, table: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

pub fn column_exists(
    conn: &Connection,
    table: &str,
    column: &str,
) -> Result<bool, rusqlite::Error> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    let mut stmt = conn.prepare(&sql)?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn add_column(
    conn: &Connection,
    table: &str,
    column: &str,
    col_type: &str,
) -> Result<(), rusqlite::Error> {
    let sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table),
        quote_ident(column),
        col_type
    );
    tracing::debug!(%sql, "add column");
    conn.execute(&sql, [])?;
    Ok(())
}

pub fn drop_column(conn: &Connection, table: &str, column: &str) -> Result<(), rusqlite::Error> {
    let sql = format!("ALTER TABLE {} DROP COLUMN {}", quote_ident(table), quote_ident(column));
    tracing::debug!(%sql, "drop column");
    conn.execute(&sql, [])?;
    Ok(())
}
