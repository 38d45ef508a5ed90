//! Read-only commands: current, history and heads.

use anyhow::Result;
use terrareg_schema_storage::revisions;

use super::label;
use crate::connect;

pub(crate) async fn run_current(database: &str, json: bool) -> Result<()> {
    let backend = connect(database).await?;
    let current = backend.current().await?;
    let head = revisions::chain()?.head();
    let is_head = current.is_some_and(|r| r.id == head.id);
    if json {
        println!(
            "{}",
            serde_json::json!({ "current": current.map(|r| r.id), "is_head": is_head })
        );
    } else if is_head {
        println!("{} (head)", label(current.map(|r| r.id)));
    } else {
        println!("{}", label(current.map(|r| r.id)));
    }
    Ok(())
}

pub(crate) async fn run_history(database: &str, json: bool) -> Result<()> {
    let backend = connect(database).await?;
    let history = backend.history().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }
    for entry in &history {
        let mut line = format!(
            "{} -> {}",
            entry.revision.down_revision.unwrap_or("<base>"),
            entry.revision.id
        );
        if entry.is_head {
            line.push_str(" (head)");
        }
        if entry.is_current {
            line.push_str(" (current)");
        }
        println!("{line}, {}", entry.revision.description);
    }
    Ok(())
}

/// Needs no database: heads are a property of this build.
pub(crate) fn run_heads(json: bool) -> Result<()> {
    let head = revisions::chain()?.head();
    if json {
        println!("{}", serde_json::json!({ "heads": [head.id] }));
    } else {
        println!("{} (head)", head.id);
    }
    Ok(())
}
