//! SQLite table rebuild for schema changes `ALTER TABLE` cannot express.
//!
//! Follows the "make other kinds of table schema changes" procedure from the
//! SQLite documentation: create the new shape under a temporary name, copy
//! rows, drop the old table, rename, then recreate indexes and triggers.
//! Foreign key enforcement must be off, otherwise dropping the old table
//! would cascade into tables referencing it.
//!
//! The new table reuses the original `CREATE TABLE` text: each kept column
//! and table constraint is copied verbatim, so `CHECK`, `COLLATE`, generated
//! columns and constraint names survive. Table constraints that mention a
//! dropped column go with it; a kept column whose definition mentions one is
//! an error.

use rusqlite::{Connection, OptionalExtension};

use super::column_helpers::{quote_ident, table_exists};
use crate::error::StorageError;

const TMP_PREFIX: &str = "_batch_tmp_";

const TABLE_CONSTRAINT_KEYWORDS: [&str; 5] =
    ["CONSTRAINT", "PRIMARY", "UNIQUE", "CHECK", "FOREIGN"];

/// Rebuild `table` without `drop_columns`, dropping foreign keys, unique
/// constraints and indexes that reference them.
pub fn rebuild_without_columns(
    conn: &Connection,
    table: &str,
    drop_columns: &[&str],
) -> Result<(), StorageError> {
    let fk_enabled: bool = conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
    if fk_enabled {
        return Err(StorageError::Migration(format!(
            "rebuilding {table} requires foreign key enforcement to be disabled"
        )));
    }
    if !table_exists(conn, table)? {
        return Err(StorageError::Migration(format!("cannot rebuild missing table {table}")));
    }

    let dropped: Vec<String> = drop_columns.iter().map(|c| c.to_ascii_lowercase()).collect();
    let touches_dropped = |names: &[String]| {
        names.iter().any(|name| dropped.contains(&name.to_ascii_lowercase()))
    };

    let original = table_sql(conn, table)?;
    let unparsable = || StorageError::Migration(format!("cannot parse the definition of {table}"));
    let (definitions, options) = split_definitions(&original).ok_or_else(unparsable)?;
    let mut defined_columns = Vec::new();
    let mut kept_definitions = Vec::new();
    let mut kept_columns = 0usize;
    for definition in definitions {
        let tokens = tokenize(definition);
        let column = match tokens.first() {
            Some(Token::Word(word))
                if TABLE_CONSTRAINT_KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k)) =>
            {
                None
            },
            Some(Token::Word(name) | Token::Quoted(name)) => Some(name.to_ascii_lowercase()),
            _ => return Err(unparsable()),
        };
        match column {
            Some(name) if dropped.contains(&name) => defined_columns.push(name),
            Some(name) => {
                if touches_dropped(referenced_names(&tokens[1..]).as_slice()) {
                    return Err(StorageError::Migration(format!(
                        "column {name} of {table} depends on a dropped column"
                    )));
                }
                defined_columns.push(name);
                kept_columns += 1;
                kept_definitions.push(definition);
            },
            None if touches_dropped(referenced_names(&tokens).as_slice()) => {
                tracing::debug!(table, constraint = definition, "dropping table constraint");
            },
            None => kept_definitions.push(definition),
        }
    }
    for column in &dropped {
        if !defined_columns.contains(column) {
            return Err(StorageError::Migration(format!("{table} has no column {column}")));
        }
    }
    if kept_columns == 0 {
        return Err(StorageError::Migration(format!("cannot drop every column of {table}")));
    }

    let mut indexes = Vec::new();
    for (name, sql) in read_named_sql(conn, "index", table)? {
        if !touches_dropped(index_columns(conn, &name)?.as_slice()) {
            indexes.push(sql);
        }
    }
    let triggers: Vec<String> =
        read_named_sql(conn, "trigger", table)?.into_iter().map(|(_, sql)| sql).collect();

    let autoincrement = original.to_ascii_uppercase().contains("AUTOINCREMENT");
    let sequence: Option<i64> = if autoincrement {
        conn.query_row("SELECT seq FROM sqlite_sequence WHERE name = ?1", [table], |row| {
            row.get(0)
        })
        .optional()?
    } else {
        None
    };

    let tmp = format!("{TMP_PREFIX}{table}");
    let create = format!(
        "CREATE TABLE {} (\n    {}\n){}{options}",
        quote_ident(&tmp),
        kept_definitions.join(",\n    "),
        if options.is_empty() { "" } else { " " }
    );
    // Generated columns are absent from table_info and cannot be inserted into.
    let column_list = read_columns(conn, table)?
        .into_iter()
        .filter(|column| !dropped.contains(&column.to_ascii_lowercase()))
        .map(|column| quote_ident(&column))
        .collect::<Vec<_>>()
        .join(", ");

    tracing::debug!(table, ?drop_columns, sql = %create, "rebuilding table");
    conn.execute(&create, [])?;
    conn.execute(
        &format!(
            "INSERT INTO {} ({column_list}) SELECT {column_list} FROM {}",
            quote_ident(&tmp),
            quote_ident(table)
        ),
        [],
    )?;
    conn.execute(&format!("DROP TABLE {}", quote_ident(table)), [])?;
    conn.execute(
        &format!("ALTER TABLE {} RENAME TO {}", quote_ident(&tmp), quote_ident(table)),
        [],
    )?;

    if let Some(seq) = sequence {
        conn.execute("DELETE FROM sqlite_sequence WHERE name = ?1", [table])?;
        conn.execute(
            "INSERT INTO sqlite_sequence (name, seq) VALUES (?1, ?2)",
            rusqlite::params![table, seq],
        )?;
    }
    for sql in indexes.iter().chain(&triggers) {
        conn.execute(sql, [])?;
    }
    Ok(())
}

fn read_columns(conn: &Connection, table: &str) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let rows = stmt.query_map([], |row| row.get(1))?;
    rows.collect()
}

fn index_columns(conn: &Connection, index: &str) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("PRAGMA index_info({})", quote_ident(index)))?;
    let rows = stmt.query_map([], |row| row.get::<_, Option<String>>(2))?;
    // Expression index terms have no column name.
    Ok(rows.collect::<Result<Vec<_>, _>>()?.into_iter().flatten().collect())
}

/// Explicitly created objects of `kind` on `table`, as `(name, sql)`.
fn read_named_sql(
    conn: &Connection,
    kind: &str,
    table: &str,
) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT name, sql FROM sqlite_master WHERE type = ?1 AND tbl_name = ?2 AND sql IS NOT NULL",
    )?;
    let rows = stmt.query_map([kind, table], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

fn table_sql(conn: &Connection, table: &str) -> Result<String, rusqlite::Error> {
    conn.query_row(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )
}

/// Top-level definitions between the parentheses of a `CREATE TABLE`
/// statement, plus the table options after the closing parenthesis.
fn split_definitions(sql: &str) -> Option<(Vec<&str>, &str)> {
    let bytes = sql.as_bytes();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut definitions = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if let Some(end) = skip_quoted(bytes, i) {
            i = end;
            continue;
        }
        match bytes[i] {
            b'(' => {
                depth += 1;
                if depth == 1 {
                    start = i + 1;
                }
            },
            b')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    definitions.push(sql[start..i].trim());
                    return Some((definitions, sql[i + 1..].trim()));
                }
            },
            b',' if depth == 1 => {
                definitions.push(sql[start..i].trim());
                start = i + 1;
            },
            _ => {},
        }
        i += 1;
    }
    None
}

/// End of the quoted string, quoted identifier or comment starting at `i`.
fn skip_quoted(sql: &[u8], i: usize) -> Option<usize> {
    let close = match sql[i] {
        b'\'' => b'\'',
        b'"' => b'"',
        b'`' => b'`',
        b'[' => b']',
        b'-' if sql.get(i + 1) == Some(&b'-') => {
            let newline = sql[i..].iter().position(|&b| b == b'\n');
            return Some(newline.map_or(sql.len(), |p| i + p + 1));
        },
        b'/' if sql.get(i + 1) == Some(&b'*') => {
            let close = sql[i + 2..].windows(2).position(|w| w == b"*/");
            return Some(close.map_or(sql.len(), |p| i + p + 4));
        },
        _ => return None,
    };
    let mut j = i + 1;
    while j < sql.len() {
        if sql[j] == close {
            // A doubled quote is an escaped quote, except inside [...].
            if close != b']' && sql.get(j + 1) == Some(&close) {
                j += 2;
                continue;
            }
            return Some(j + 1);
        }
        j += 1;
    }
    Some(sql.len())
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Open,
    Close,
    Other,
}

fn tokenize(sql: &str) -> Vec<Token> {
    let bytes = sql.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(end) = skip_quoted(bytes, i) {
            match b {
                b'"' | b'`' | b'[' => tokens.push(Token::Quoted(unquote(&sql[i..end]))),
                b'\'' => tokens.push(Token::Other),
                _ => {},
            }
            i = end;
        } else if b.is_ascii_alphanumeric() || b == b'_' {
            let end = bytes[i..]
                .iter()
                .position(|c| !(c.is_ascii_alphanumeric() || *c == b'_' || *c == b'$'))
                .map_or(bytes.len(), |p| i + p);
            let text = sql[i..end].to_owned();
            tokens.push(if b.is_ascii_digit() { Token::Other } else { Token::Word(text) });
            i = end;
        } else {
            match b {
                b'(' => tokens.push(Token::Open),
                b')' => tokens.push(Token::Close),
                _ if b.is_ascii_whitespace() => {},
                _ => tokens.push(Token::Other),
            }
            i += 1;
        }
    }
    tokens
}

fn unquote(quoted: &str) -> String {
    let inner = quoted.get(1..quoted.len() - 1).unwrap_or("");
    match quoted.as_bytes().first() {
        Some(b'"') => inner.replace("\"\"", "\""),
        Some(b'`') => inner.replace("``", "`"),
        _ => inner.to_owned(),
    }
}

/// Names a definition refers to, leaving out constraint names and the target
/// of `REFERENCES` clauses.
fn referenced_names(tokens: &[Token]) -> Vec<String> {
    let mut names = Vec::new();
    let mut iter = tokens.iter().peekable();
    while let Some(token) = iter.next() {
        match token {
            Token::Word(word) if word.eq_ignore_ascii_case("CONSTRAINT") => {
                iter.next();
            },
            Token::Word(word) if word.eq_ignore_ascii_case("REFERENCES") => {
                iter.next();
                if iter.peek() == Some(&&Token::Open) {
                    for inner in iter.by_ref() {
                        if *inner == Token::Close {
                            break;
                        }
                    }
                }
            },
            Token::Word(name) | Token::Quoted(name) => names.push(name.clone()),
            _ => {},
        }
    }
    names
}
