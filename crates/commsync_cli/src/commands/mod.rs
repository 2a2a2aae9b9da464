//! CLI command implementations.

pub mod prune_plan;
pub mod simulate;
pub mod validate;
