use thiserror::Error;

use crate::revision::Direction;

/// Errors from parsing core domain values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreError {
    #[error("unknown source table: {0}")]
    UnknownSourceTable(String),
}

/// Errors raised while building the revision chain or resolving a target on it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RevisionError {
    #[error("duplicate revision id: {0}")]
    Duplicate(String),

    #[error("revision {revision} revises unknown revision {parent}")]
    UnknownParent { revision: String, parent: String },

    #[error("revision chain has no base revision")]
    NoBase,

    #[error("revision chain has multiple base revisions: {}", .0.join(", "))]
    MultipleBases(Vec<String>),

    #[error("revision {parent} has multiple successors: {}", .children.join(", "))]
    Branched { parent: String, children: Vec<String> },

    #[error("revision {0} is not reachable from the base revision")]
    Unreachable(String),

    #[error("unknown revision: {0}")]
    UnknownRevision(String),

    #[error("ambiguous revision {prefix}: matches {}", .matches.join(", "))]
    AmbiguousRevision { prefix: String, matches: Vec<String> },

    #[error("relative target {0:+} is outside the revision chain")]
    RelativeOutOfRange(i64),

    #[error("invalid migration target: {0:?}")]
    InvalidTarget(String),

    #[error("cannot {direction} from {from} to {to}")]
    WrongDirection { direction: Direction, from: String, to: String },
}
