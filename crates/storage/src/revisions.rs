//! Revisions known to this build, shared by the SQLite and PostgreSQL runners.

use terrareg_schema_core::{
    BASELINE_REVISION, MODULE_DETAILS_REVISION, Revision, RevisionChain, RevisionError,
};

/// Registry tables that predate `module_details`.
pub static BASELINE: Revision = Revision {
    id: BASELINE_REVISION,
    down_revision: None,
    description: "module_version and submodule tables",
};

/// Move common submodule/module_version columns to the new module_details table.
pub static MODULE_DETAILS: Revision = Revision {
    id: MODULE_DETAILS_REVISION,
    down_revision: Some(BASELINE_REVISION),
    description: "move readme and terraform docs to module_details",
};

/// All revisions, in no particular order; [`chain`] orders them.
pub static ALL: [&Revision; 2] = [&BASELINE, &MODULE_DETAILS];

pub fn chain() -> Result<RevisionChain, RevisionError> {
    RevisionChain::new(&ALL)
}
