//! PostgreSQL rendition of the migration chain.
//!
//! Same revisions and semantics as the SQLite migrations. PostgreSQL can add
//! and drop named constraints directly, so no table rebuild is needed, and
//! its DDL is transactional, so a failed run leaves nothing behind.

use async_trait::async_trait;
use sqlx::{PgConnection, Row};
use terrareg_schema_core::{DetailLink, RelocationReport, Revision, SourceRow, SourceTable};

use crate::error::StorageError;
use crate::revisions;

/// One PostgreSQL schema step, run on the runner's transaction.
#[async_trait]
pub trait PgMigration: Send + Sync {
    fn revision(&self) -> &'static Revision;

    async fn upgrade(&self, conn: &mut PgConnection) -> Result<(), StorageError>;

    async fn downgrade(&self, conn: &mut PgConnection) -> Result<(), StorageError>;
}

static PG_MIGRATIONS: [&dyn PgMigration; 2] = [&PgBaseline, &PgModuleDetails];

pub fn find_pg(id: &str) -> Option<&'static dyn PgMigration> {
    PG_MIGRATIONS.iter().copied().find(|m| m.revision().id == id)
}

struct PgBaseline;

#[async_trait]
impl PgMigration for PgBaseline {
    fn revision(&self) -> &'static Revision {
        &revisions::BASELINE
    }

    async fn upgrade(&self, conn: &mut PgConnection) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS module_version (
                id SERIAL NOT NULL,
                module_provider_id INTEGER,
                version VARCHAR(128) NOT NULL,
                git_sha VARCHAR(128),
                published BOOLEAN,
                readme_content BYTEA,
                module_details BYTEA,
                PRIMARY KEY (id)
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS submodule (
                id SERIAL NOT NULL,
                parent_module_version INTEGER NOT NULL,
                type VARCHAR(128),
                path VARCHAR(1024) NOT NULL,
                name VARCHAR(128),
                readme_content BYTEA,
                module_details BYTEA,
                PRIMARY KEY (id),
                CONSTRAINT fk_submodule_parent_module_version_module_version_id
                    FOREIGN KEY (parent_module_version) REFERENCES module_version (id)
                    ON UPDATE CASCADE ON DELETE CASCADE
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS ix_submodule_parent_module_version \
             ON submodule (parent_module_version)",
        )
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn downgrade(&self, conn: &mut PgConnection) -> Result<(), StorageError> {
        sqlx::query("DROP TABLE submodule").execute(&mut *conn).await?;
        sqlx::query("DROP TABLE module_version").execute(&mut *conn).await?;
        Ok(())
    }
}

struct PgModuleDetails;

#[async_trait]
impl PgMigration for PgModuleDetails {
    fn revision(&self) -> &'static Revision {
        &revisions::MODULE_DETAILS
    }

    async fn upgrade(&self, conn: &mut PgConnection) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE module_details (
                id SERIAL NOT NULL,
                readme_content BYTEA,
                terraform_docs BYTEA,
                PRIMARY KEY (id)
            )
            "#,
        )
        .execute(&mut *conn)
        .await?;

        for table in SourceTable::UPGRADE_ORDER {
            sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN module_details_id INTEGER"))
                .execute(&mut *conn)
                .await?;
            sqlx::query(&format!(
                "ALTER TABLE {table} ADD CONSTRAINT {} FOREIGN KEY (module_details_id) \
                 REFERENCES module_details (id) ON UPDATE CASCADE ON DELETE CASCADE",
                table.foreign_key_name()
            ))
            .execute(&mut *conn)
            .await?;

            let report = relocate_pg(conn, table).await?;
            tracing::info!(%table, created = report.created(), "module details relocated");

            sqlx::query(&format!("ALTER TABLE {table} DROP COLUMN readme_content"))
                .execute(&mut *conn)
                .await?;
            sqlx::query(&format!("ALTER TABLE {table} DROP COLUMN module_details"))
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    async fn downgrade(&self, conn: &mut PgConnection) -> Result<(), StorageError> {
        for table in SourceTable::DOWNGRADE_ORDER {
            sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN readme_content BYTEA"))
                .execute(&mut *conn)
                .await?;
            sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN module_details BYTEA"))
                .execute(&mut *conn)
                .await?;

            let restored = restore_pg(conn, table).await?;
            tracing::info!(%table, restored, "module details restored");

            sqlx::query(&format!(
                "ALTER TABLE {table} DROP CONSTRAINT {}",
                table.foreign_key_name()
            ))
            .execute(&mut *conn)
            .await?;
            sqlx::query(&format!("ALTER TABLE {table} DROP COLUMN module_details_id"))
                .execute(&mut *conn)
                .await?;
        }
        sqlx::query("DROP TABLE module_details").execute(&mut *conn).await?;
        Ok(())
    }
}

/// PostgreSQL counterpart of [`crate::relocation::relocate`]: snapshot, then
/// one `INSERT .. RETURNING id` and one link update per row, in id order.
pub async fn relocate_pg(
    conn: &mut PgConnection,
    table: SourceTable,
) -> Result<RelocationReport, StorageError> {
    let rows = sqlx::query(&format!(
        "SELECT id, readme_content, module_details FROM {table} ORDER BY id"
    ))
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(|row| -> Result<SourceRow, sqlx::Error> {
        Ok(SourceRow::new(
            i64::from(row.try_get::<i32, _>("id")?),
            row.try_get("readme_content")?,
            row.try_get("module_details")?,
        ))
    })
    .collect::<Result<Vec<_>, sqlx::Error>>()?;
    tracing::info!(%table, rows = rows.len(), "relocating blob columns into module_details");

    let link_sql = format!("UPDATE {table} SET module_details_id = $1 WHERE id = $2");
    let mut report = RelocationReport::new(table);
    for row in &rows {
        if let Some(oversized) = row.oversized_column() {
            return Err(StorageError::payload_too_large(table, row.id, oversized));
        }
        let module_details_id: i32 = sqlx::query_scalar(
            "INSERT INTO module_details (readme_content, terraform_docs) \
             VALUES ($1, $2) RETURNING id",
        )
        .bind(row.readme_content.as_deref())
        .bind(row.module_details.as_deref())
        .fetch_one(&mut *conn)
        .await?;

        let updated = sqlx::query(&link_sql)
            .bind(module_details_id)
            .bind(row.id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
        if updated != 1 {
            return Err(StorageError::Migration(format!(
                "{table} row {} matched {updated} rows while linking module_details \
                 {module_details_id}",
                row.id
            )));
        }
        tracing::debug!(%table, source_id = row.id, module_details_id, "linked module details");
        report.links.push(DetailLink {
            source_id: row.id,
            module_details_id: i64::from(module_details_id),
        });
    }
    Ok(report)
}

/// PostgreSQL counterpart of [`crate::relocation::restore`], joining through
/// `module_details_id`.
pub async fn restore_pg(
    conn: &mut PgConnection,
    table: SourceTable,
) -> Result<usize, StorageError> {
    let restored = sqlx::query(&format!(
        "UPDATE {table} AS s
         SET readme_content = d.readme_content, module_details = d.terraform_docs
         FROM module_details AS d
         WHERE d.id = s.module_details_id"
    ))
    .execute(&mut *conn)
    .await?
    .rows_affected();
    usize::try_from(restored)
        .map_err(|_| StorageError::Migration(format!("restored row count {restored} overflows")))
}
