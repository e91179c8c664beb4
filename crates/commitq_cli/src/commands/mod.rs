//! CLI command implementations.

pub mod drain;
pub mod peek;
pub mod prune;
pub mod status;
