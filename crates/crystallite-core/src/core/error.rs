use std::fmt;
use thiserror::Error;

/// A single violated constraint discovered during validation.
///
/// The `field` names the offending entry using the construction-interface
/// vocabulary (e.g. `cell`, `sites[2].weights`), and `message` describes
/// the constraint that was broken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns a copy of this violation with `prefix.` prepended to the
    /// field path, used to lift per-site violations into structure scope.
    pub fn scoped(&self, prefix: &str) -> Self {
        Self {
            field: format!("{}.{}", prefix, self.field),
            message: self.message.clone(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn render_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors produced by the structure engine.
///
/// Frozen-structure construction aggregates every violated constraint into
/// a single `Validation` report; builder mutators fail eagerly with the
/// index/length variants and never apply partial updates. `UnknownSpecies`
/// is returned by direct element-table lookups; during structure validation
/// the same condition is rendered into the aggregated report.
#[derive(Debug, Error)]
pub enum StructureError {
    #[error("structure validation failed ({} violation(s)): {}", .0.len(), render_violations(.0))]
    Validation(Vec<Violation>),

    #[error("unknown chemical species '{symbol}'")]
    UnknownSpecies { symbol: String },

    #[error("site index {index} is out of range for a structure with {len} site(s)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("expected one value per site ({expected}), got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("failed to serialize '{key}': {message}")]
    Serialization { key: String, message: String },
}
