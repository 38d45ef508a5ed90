//! Source tables and the rows whose blob columns are relocated.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_BLOB_LEN, README_COLUMN, SOURCE_DOCS_COLUMN};
use crate::error::CoreError;

/// A pre-existing table carrying `readme_content`/`module_details` blobs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceTable {
    /// `module_version`: one row per published module version.
    ModuleVersion,
    /// `submodule`: nested modules and examples of a module version.
    Submodule,
}

impl SourceTable {
    /// Order in which tables are migrated on upgrade.
    pub const UPGRADE_ORDER: [Self; 2] = [Self::ModuleVersion, Self::Submodule];

    /// Order in which tables are restored on downgrade.
    pub const DOWNGRADE_ORDER: [Self; 2] = [Self::Submodule, Self::ModuleVersion];

    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::ModuleVersion => "module_version",
            Self::Submodule => "submodule",
        }
    }

    /// Name of the foreign key linking this table to `module_details`.
    #[must_use]
    pub const fn foreign_key_name(self) -> &'static str {
        match self {
            Self::ModuleVersion => "fk_module_version_module_details_id_module_details_id",
            Self::Submodule => "fk_submodule_module_details_id_module_details_id",
        }
    }
}

impl fmt::Display for SourceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for SourceTable {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "module_version" => Ok(Self::ModuleVersion),
            "submodule" => Ok(Self::Submodule),
            other => Err(CoreError::UnknownSourceTable(other.to_owned())),
        }
    }
}

/// Row of a source table as read before relocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRow {
    pub id: i64,
    pub readme_content: Option<Vec<u8>>,
    pub module_details: Option<Vec<u8>>,
}

impl SourceRow {
    #[must_use]
    pub const fn new(
        id: i64,
        readme_content: Option<Vec<u8>>,
        module_details: Option<Vec<u8>>,
    ) -> Self {
        Self { id, readme_content, module_details }
    }

    /// First blob column whose payload exceeds [`MAX_BLOB_LEN`], with its length.
    #[must_use]
    pub fn oversized_column(&self) -> Option<(&'static str, usize)> {
        [(README_COLUMN, &self.readme_content), (SOURCE_DOCS_COLUMN, &self.module_details)]
            .into_iter()
            .find_map(|(column, payload)| {
                let len = payload.as_ref()?.len();
                (len > MAX_BLOB_LEN).then_some((column, len))
            })
    }
}

/// Row of `module_details`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetailRecord {
    pub id: i64,
    pub readme_content: Option<Vec<u8>>,
    pub terraform_docs: Option<Vec<u8>>,
}

/// Source row id paired with the `module_details` id it was linked to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetailLink {
    pub source_id: i64,
    pub module_details_id: i64,
}

/// Outcome of relocating one source table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelocationReport {
    pub table: SourceTable,
    pub links: Vec<DetailLink>,
}

impl RelocationReport {
    #[must_use]
    pub const fn new(table: SourceTable) -> Self {
        Self { table, links: Vec::new() }
    }

    /// Number of detail records created.
    #[must_use]
    pub fn created(&self) -> usize {
        self.links.len()
    }
}
