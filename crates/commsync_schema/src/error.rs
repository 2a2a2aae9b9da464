//! Error types for schema validation.

use thiserror::Error;

/// A single validation issue, located by its path in the input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The value at `path` does not have the expected form.
    #[error("{path}: expected {expected}")]
    Mismatch {
        /// Location of the offending value.
        path: String,
        /// Description of what the schema expected.
        expected: String,
    },

    /// A strict shape received a key it does not declare.
    #[error("{path}: unknown field")]
    UnknownField {
        /// Location of the unknown key.
        path: String,
    },
}

impl SchemaError {
    /// Returns the path of the offending value.
    pub fn path(&self) -> &str {
        match self {
            SchemaError::Mismatch { path, .. } | SchemaError::UnknownField { path } => path,
        }
    }
}

/// All issues found while validating one input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("input failed validation ({} issue(s)): {}", .issues.len(), summary(.issues))]
pub struct ValidationError {
    /// Issues in traversal order.
    pub issues: Vec<SchemaError>,
}

fn summary(issues: &[SchemaError]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
