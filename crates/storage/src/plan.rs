//! Run planning and reporting shared by both runners.

use serde::Serialize;
use terrareg_schema_core::{Direction, Revision, RevisionChain, Target};

use crate::error::StorageError;

/// Ordered steps for one run.
#[derive(Debug, Clone)]
pub(crate) struct Plan {
    pub direction: Direction,
    pub from: Option<usize>,
    pub to: Option<usize>,
    pub steps: Vec<&'static Revision>,
}

impl Plan {
    pub fn new(
        chain: &RevisionChain,
        direction: Direction,
        current: Option<usize>,
        target: &Target,
    ) -> Result<Self, StorageError> {
        let to = chain.resolve(target, current)?;
        let steps = match direction {
            Direction::Upgrade => chain.plan_upgrade(current, to)?,
            Direction::Downgrade => chain.plan_downgrade(current, to)?,
        };
        Ok(Self { direction, from: current, to, steps })
    }

    /// Revision recorded in the version table once `revision` has run.
    pub const fn recorded_after(&self, revision: &'static Revision) -> Option<&'static str> {
        match self.direction {
            Direction::Upgrade => Some(revision.id),
            Direction::Downgrade => revision.down_revision,
        }
    }

    pub fn report(&self, chain: &RevisionChain) -> MigrationReport {
        MigrationReport {
            direction: self.direction,
            from: self.from.and_then(|p| chain.get(p)).map(|r| r.id),
            to: self.to.and_then(|p| chain.get(p)).map(|r| r.id),
            steps: self.steps.iter().map(|r| r.id).collect(),
        }
    }
}

/// What a completed run did. `None` revisions mean "base".
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MigrationReport {
    pub direction: Direction,
    pub from: Option<&'static str>,
    pub to: Option<&'static str>,
    pub steps: Vec<&'static str>,
}

impl MigrationReport {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }
}

/// One line of `history`.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub revision: &'static Revision,
    pub is_current: bool,
    pub is_head: bool,
}

pub(crate) fn history(chain: &RevisionChain, current: Option<usize>) -> Vec<HistoryEntry> {
    let head = chain.head().id;
    chain
        .iter()
        .enumerate()
        .rev()
        .map(|(position, revision)| HistoryEntry {
            revision,
            is_current: current == Some(position),
            is_head: revision.id == head,
        })
        .collect()
}
