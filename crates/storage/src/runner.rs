//! SQLite migration runner.
//!
//! A run executes every planned step inside one transaction, updating the
//! version table after each step. Foreign key enforcement is switched off for
//! the run (table rebuilds drop and recreate tables that other tables
//! reference) and `PRAGMA foreign_key_check` must come back clean before the
//! transaction commits.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};
use terrareg_schema_core::env_config::busy_timeout;
use terrareg_schema_core::{Direction, Revision, RevisionChain, Target, VERSION_TABLE};

use crate::error::StorageError;
use crate::migrations::{self, column_helpers::table_exists};
use crate::plan::{HistoryEntry, MigrationReport, Plan, history};
use crate::revisions;

#[derive(Debug)]
pub struct Migrator {
    conn: Connection,
    chain: RevisionChain,
}

impl Migrator {
    pub fn open(db_path: &Path) -> Result<Self, StorageError> {
        Self::from_connection(Connection::open(db_path)?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.busy_timeout(busy_timeout())?;
        Ok(Self { conn, chain: revisions::chain()? })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Revision recorded in the version table; `None` before the first run.
    pub fn current(&self) -> Result<Option<&'static Revision>, StorageError> {
        Ok(self.current_position()?.and_then(|p| self.chain.get(p)))
    }

    pub fn upgrade(&mut self, target: &Target) -> Result<MigrationReport, StorageError> {
        let plan = Plan::new(&self.chain, Direction::Upgrade, self.current_position()?, target)?;
        self.run(&plan)
    }

    pub fn downgrade(&mut self, target: &Target) -> Result<MigrationReport, StorageError> {
        let plan = Plan::new(&self.chain, Direction::Downgrade, self.current_position()?, target)?;
        self.run(&plan)
    }

    /// Record `target` as the current revision without running anything.
    pub fn stamp(&mut self, target: &Target) -> Result<Option<&'static Revision>, StorageError> {
        let current = self.current_position()?;
        let position = self.chain.resolve(target, current)?;
        let revision = position.and_then(|p| self.chain.get(p));
        tracing::info!(
            from = self.chain.label(current),
            to = self.chain.label(position),
            "stamping revision"
        );
        let tx = self.conn.transaction()?;
        write_version(&tx, revision.map(|r| r.id))?;
        tx.commit()?;
        Ok(revision)
    }

    pub fn history(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        Ok(history(&self.chain, self.current_position()?))
    }

    fn current_position(&self) -> Result<Option<usize>, StorageError> {
        match read_version(&self.conn)? {
            None => Ok(None),
            Some(id) => match self.chain.position(&id) {
                Some(position) => Ok(Some(position)),
                None => Err(StorageError::UnknownStoredRevision(id)),
            },
        }
    }

    fn run(&mut self, plan: &Plan) -> Result<MigrationReport, StorageError> {
        let report = plan.report(&self.chain);
        if plan.steps.is_empty() {
            tracing::info!(
                direction = %plan.direction,
                at = self.chain.label(plan.from),
                "nothing to do"
            );
            return Ok(report);
        }

        let fk_enabled: bool =
            self.conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
        self.conn.pragma_update(None, "foreign_keys", false)?;
        let result = self.run_in_transaction(plan);
        let restored = self.conn.pragma_update(None, "foreign_keys", fk_enabled);
        result?;
        restored?;

        tracing::info!(
            direction = %plan.direction,
            from = self.chain.label(plan.from),
            to = self.chain.label(plan.to),
            steps = plan.steps.len(),
            "migration run complete"
        );
        Ok(report)
    }

    fn run_in_transaction(&mut self, plan: &Plan) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        for revision in &plan.steps {
            let migration = migrations::find(revision.id).ok_or_else(|| {
                StorageError::Migration(format!("no implementation for revision {}", revision.id))
            })?;
            tracing::info!(
                "Running {} {}: {}",
                plan.direction,
                revision.id,
                revision.description
            );
            match plan.direction {
                Direction::Upgrade => migration.upgrade(&tx)?,
                Direction::Downgrade => migration.downgrade(&tx)?,
            }
            write_version(&tx, plan.recorded_after(revision))?;
        }

        let violations = foreign_key_violations(&tx)?;
        if violations > 0 {
            return Err(StorageError::ForeignKeyViolations(violations));
        }
        tx.commit()?;
        Ok(())
    }
}

fn read_version(conn: &Connection) -> Result<Option<String>, StorageError> {
    if !table_exists(conn, VERSION_TABLE)? {
        return Ok(None);
    }
    let mut stmt = conn.prepare("SELECT version_num FROM alembic_version")?;
    let versions =
        stmt.query_map([], |row| row.get::<_, String>(0))?.collect::<Result<Vec<_>, _>>()?;
    match versions.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(only.clone())),
        many => Err(StorageError::Migration(format!(
            "version table records several revisions: {}",
            many.join(", ")
        ))),
    }
}

fn write_version(conn: &Connection, revision: Option<&str>) -> Result<(), StorageError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS alembic_version (
            version_num VARCHAR(32) NOT NULL,
            CONSTRAINT alembic_version_pkc PRIMARY KEY (version_num)
        )",
        [],
    )?;
    let previous: Option<String> = conn
        .query_row("SELECT version_num FROM alembic_version", [], |row| row.get(0))
        .optional()?;
    if previous.is_some() && revision.is_none() {
        tracing::warn!(previous = ?previous, "clearing recorded revision");
    }
    conn.execute("DELETE FROM alembic_version", [])?;
    if let Some(revision) = revision {
        conn.execute("INSERT INTO alembic_version (version_num) VALUES (?1)", [revision])?;
    }
    Ok(())
}

fn foreign_key_violations(conn: &Connection) -> Result<usize, StorageError> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let mut rows = stmt.query([])?;
    let mut count = 0;
    while rows.next()?.is_some() {
        count += 1;
    }
    Ok(count)
}
