//! Integration tests for PgMigrator.
//! Run with:
//! DATABASE_URL=... cargo test -p terrareg-schema-storage --features postgres -- --ignored pg_

#![cfg(feature = "postgres")]
#![allow(clippy::unwrap_used, reason = "integration test code")]

use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Row};
use terrareg_schema_core::{BASELINE_REVISION, MODULE_DETAILS_REVISION, Target};
use terrareg_schema_storage::PgMigrator;
use uuid::Uuid;

/// Pool confined to a fresh schema, so tests never see each other's tables.
async fn create_pg_migrator() -> (PgMigrator, PgPool, PgPool, String) {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for PgMigrator integration tests");
    let schema = format!("terrareg_test_{}", Uuid::new_v4().simple());

    let admin = PgPoolOptions::new().max_connections(1).connect(&url).await.unwrap();
    sqlx::query(&format!("CREATE SCHEMA {schema}")).execute(&admin).await.unwrap();

    let options =
        PgConnectOptions::from_str(&url).unwrap().options([("search_path", schema.as_str())]);
    let pool = PgPoolOptions::new().max_connections(1).connect_with(options).await.unwrap();
    let migrator = PgMigrator::from_pool(pool.clone()).unwrap();
    (migrator, pool, admin, schema)
}

async fn drop_schema(admin: &PgPool, schema: &str) {
    sqlx::query(&format!("DROP SCHEMA {schema} CASCADE")).execute(admin).await.unwrap();
}

async fn seed(pool: &PgPool) {
    sqlx::query(
        "INSERT INTO module_version (id, version, readme_content, module_details)
         VALUES (40, '4.0.0', 'readme 4', 'docs 4'), (7, '0.7.0', NULL, 'docs 0.7'),
                (19, '1.9.0', 'readme 1.9', NULL)",
    )
    .execute(pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO submodule (id, parent_module_version, path, readme_content)
         VALUES (3, 40, 'modules/a', 'sub a'), (1, 7, 'modules/b', NULL)",
    )
    .execute(pool)
    .await
    .unwrap();
}

async fn blob_state(pool: &PgPool, table: &str) -> Vec<(i32, Option<Vec<u8>>, Option<Vec<u8>>)> {
    sqlx::query(&format!("SELECT id, readme_content, module_details FROM {table} ORDER BY id"))
        .fetch_all(pool)
        .await
        .unwrap()
        .into_iter()
        .map(|row| (row.get("id"), row.get("readme_content"), row.get("module_details")))
        .collect()
}

#[tokio::test]
#[ignore]
async fn pg_upgrade_and_downgrade_round_trip() {
    let (migrator, pool, admin, schema) = create_pg_migrator().await;
    assert!(migrator.current().await.unwrap().is_none());

    migrator.upgrade(&Target::Revision(BASELINE_REVISION.to_owned())).await.unwrap();
    seed(&pool).await;
    let modules_before = blob_state(&pool, "module_version").await;
    let submodules_before = blob_state(&pool, "submodule").await;

    let report = migrator.upgrade(&Target::Head).await.unwrap();
    assert_eq!(report.steps, [MODULE_DETAILS_REVISION]);
    let details: i64 = sqlx::query_scalar("SELECT count(*) FROM module_details")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(details, 5);

    migrator.downgrade(&Target::Relative(-1)).await.unwrap();
    assert_eq!(migrator.current().await.unwrap().map(|r| r.id), Some(BASELINE_REVISION));
    assert_eq!(blob_state(&pool, "module_version").await, modules_before);
    assert_eq!(blob_state(&pool, "submodule").await, submodules_before);

    drop_schema(&admin, &schema).await;
}

#[tokio::test]
#[ignore]
async fn pg_failed_upgrade_leaves_schema_untouched() {
    let (migrator, pool, admin, schema) = create_pg_migrator().await;
    migrator.upgrade(&Target::Revision(BASELINE_REVISION.to_owned())).await.unwrap();
    seed(&pool).await;
    sqlx::query(
        "CREATE FUNCTION fail_link() RETURNS trigger AS $$
         BEGIN RAISE EXCEPTION 'forced failure'; END; $$ LANGUAGE plpgsql",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TRIGGER fail_link BEFORE UPDATE ON module_version
         FOR EACH ROW WHEN (NEW.id = 19) EXECUTE FUNCTION fail_link()",
    )
    .execute(&pool)
    .await
    .unwrap();

    let err = migrator.upgrade(&Target::Head).await.unwrap_err();
    assert!(err.to_string().contains("forced failure"), "unexpected error: {err}");

    assert_eq!(migrator.current().await.unwrap().map(|r| r.id), Some(BASELINE_REVISION));
    let detail_table: Option<String> =
        sqlx::query_scalar("SELECT to_regclass('module_details')::text")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(detail_table, None);

    drop_schema(&admin, &schema).await;
}

#[tokio::test]
#[ignore]
async fn pg_stamp_and_history() {
    let (migrator, _pool, admin, schema) = create_pg_migrator().await;

    let stamped = migrator.stamp(&Target::Head).await.unwrap();
    assert_eq!(stamped.map(|r| r.id), Some(MODULE_DETAILS_REVISION));

    let history = migrator.history().await.unwrap();
    assert!(history[0].is_current);
    assert!(!history[1].is_current);

    assert!(migrator.stamp(&Target::Base).await.unwrap().is_none());
    assert!(migrator.current().await.unwrap().is_none());

    drop_schema(&admin, &schema).await;
}
