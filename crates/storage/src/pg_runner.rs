//! PostgreSQL migration runner.
//!
//! Mirrors [`crate::Migrator`]: one transaction per run, version table
//! updated after each step. PostgreSQL enforces foreign keys on every
//! statement, so no separate check is needed before commit.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use terrareg_schema_core::{
    Direction, PG_POOL_ACQUIRE_TIMEOUT_SECS, PG_POOL_MAX_CONNECTIONS, Revision, RevisionChain,
    Target,
};

use crate::error::StorageError;
use crate::pg_migrations::find_pg;
use crate::plan::{HistoryEntry, MigrationReport, Plan, history};
use crate::revisions;

#[derive(Clone, Debug)]
pub struct PgMigrator {
    pool: PgPool,
    chain: RevisionChain,
}

impl PgMigrator {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(PG_POOL_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(PG_POOL_ACQUIRE_TIMEOUT_SECS))
            .connect(database_url)
            .await?;
        tracing::info!("PgMigrator connected");
        Self::from_pool(pool)
    }

    pub fn from_pool(pool: PgPool) -> Result<Self, StorageError> {
        Ok(Self { pool, chain: revisions::chain()? })
    }

    pub async fn current(&self) -> Result<Option<&'static Revision>, StorageError> {
        Ok(self.current_position().await?.and_then(|p| self.chain.get(p)))
    }

    pub async fn upgrade(&self, target: &Target) -> Result<MigrationReport, StorageError> {
        let current = self.current_position().await?;
        let plan = Plan::new(&self.chain, Direction::Upgrade, current, target)?;
        self.run(&plan).await
    }

    pub async fn downgrade(&self, target: &Target) -> Result<MigrationReport, StorageError> {
        let current = self.current_position().await?;
        let plan = Plan::new(&self.chain, Direction::Downgrade, current, target)?;
        self.run(&plan).await
    }

    pub async fn stamp(&self, target: &Target) -> Result<Option<&'static Revision>, StorageError> {
        let current = self.current_position().await?;
        let position = self.chain.resolve(target, current)?;
        let revision = position.and_then(|p| self.chain.get(p));
        tracing::info!(
            from = self.chain.label(current),
            to = self.chain.label(position),
            "stamping revision"
        );
        let mut tx = self.pool.begin().await?;
        write_version(&mut tx, revision.map(|r| r.id)).await?;
        tx.commit().await?;
        Ok(revision)
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>, StorageError> {
        Ok(history(&self.chain, self.current_position().await?))
    }

    async fn current_position(&self) -> Result<Option<usize>, StorageError> {
        let mut conn = self.pool.acquire().await?;
        match read_version(&mut conn).await? {
            None => Ok(None),
            Some(id) => match self.chain.position(&id) {
                Some(position) => Ok(Some(position)),
                None => Err(StorageError::UnknownStoredRevision(id)),
            },
        }
    }

    async fn run(&self, plan: &Plan) -> Result<MigrationReport, StorageError> {
        let report = plan.report(&self.chain);
        if plan.steps.is_empty() {
            tracing::info!(
                direction = %plan.direction,
                at = self.chain.label(plan.from),
                "nothing to do"
            );
            return Ok(report);
        }

        // Dropping the transaction on an early return rolls it back.
        let mut tx = self.pool.begin().await?;
        for revision in &plan.steps {
            let migration = find_pg(revision.id).ok_or_else(|| {
                StorageError::Migration(format!("no implementation for revision {}", revision.id))
            })?;
            tracing::info!(
                "Running {} {}: {}",
                plan.direction,
                revision.id,
                revision.description
            );
            match plan.direction {
                Direction::Upgrade => migration.upgrade(&mut tx).await?,
                Direction::Downgrade => migration.downgrade(&mut tx).await?,
            }
            write_version(&mut tx, plan.recorded_after(revision)).await?;
        }
        tx.commit().await?;

        tracing::info!(
            direction = %plan.direction,
            from = self.chain.label(plan.from),
            to = self.chain.label(plan.to),
            steps = plan.steps.len(),
            "migration run complete"
        );
        Ok(report)
    }
}

async fn read_version(conn: &mut PgConnection) -> Result<Option<String>, StorageError> {
    let exists: bool = sqlx::query_scalar("SELECT to_regclass('alembic_version') IS NOT NULL")
        .fetch_one(&mut *conn)
        .await?;
    if !exists {
        return Ok(None);
    }
    let versions: Vec<String> = sqlx::query_scalar("SELECT version_num FROM alembic_version")
        .fetch_all(&mut *conn)
        .await?;
    match versions.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(only.clone())),
        many => Err(StorageError::Migration(format!(
            "version table records several revisions: {}",
            many.join(", ")
        ))),
    }
}

async fn write_version(
    conn: &mut PgConnection,
    revision: Option<&str>,
) -> Result<(), StorageError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS alembic_version (
            version_num VARCHAR(32) NOT NULL,
            CONSTRAINT alembic_version_pkc PRIMARY KEY (version_num)
        )",
    )
    .execute(&mut *conn)
    .await?;
    let previous: Option<String> = sqlx::query_scalar("SELECT version_num FROM alembic_version")
        .fetch_optional(&mut *conn)
        .await?;
    if previous.is_some() && revision.is_none() {
        tracing::warn!(previous = ?previous, "clearing recorded revision");
    }
    sqlx::query("DELETE FROM alembic_version").execute(&mut *conn).await?;
    if let Some(revision) = revision {
        sqlx::query("INSERT INTO alembic_version (version_num) VALUES ($1)")
            .bind(revision)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
