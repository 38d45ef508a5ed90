//! Commands that change the database: upgrade, downgrade and stamp.

use anyhow::Result;
use terrareg_schema_core::Target;
use terrareg_schema_storage::MigrationReport;

use super::label;
use crate::connect;

pub(crate) async fn run_upgrade(database: &str, target: Target, json: bool) -> Result<()> {
    let backend = connect(database).await?;
    tracing::info!(%target, "Upgrading database schema");
    let report = backend.upgrade(target).await?;
    tracing::info!(steps = report.steps.len(), "Upgrade finished");
    print_report(&report, json)
}

pub(crate) async fn run_downgrade(database: &str, target: Target, json: bool) -> Result<()> {
    let backend = connect(database).await?;
    tracing::info!(%target, "Downgrading database schema");
    let report = backend.downgrade(target).await?;
    tracing::info!(steps = report.steps.len(), "Downgrade finished");
    print_report(&report, json)
}

pub(crate) async fn run_stamp(database: &str, target: Target, json: bool) -> Result<()> {
    let backend = connect(database).await?;
    tracing::info!(%target, "Stamping database without running migrations");
    let revision = backend.stamp(target).await?;
    if json {
        println!("{}", serde_json::json!({ "revision": revision.map(|r| r.id) }));
    } else {
        println!("Stamped {}", label(revision.map(|r| r.id)));
    }
    Ok(())
}

fn print_report(report: &MigrationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else if report.is_noop() {
        println!("Already at {}", label(report.from));
    } else {
        println!(
            "{} {} -> {} ({} step{})",
            report.direction,
            label(report.from),
            label(report.to),
            report.steps.len(),
            if report.steps.len() == 1 { "" } else { "s" }
        );
    }
    Ok(())
}
