//! Core types for terrareg-schema
//!
//! Domain types shared by the storage runners and the CLI: the source tables
//! whose blob columns move into `module_details`, the rows involved, and the
//! revision chain the runners walk.

pub mod constants;
pub mod env_config;
mod error;
mod revision;
mod source;

pub use constants::*;
pub use error::*;
pub use revision::*;
pub use source::*;
