//! Typed errors for report assembly.
//!
//! Validation failures are hard errors by contract: the caller gets either
//! a fully valid report or a typed reason, never a partial one.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type AssemblyResult<T> = Result<T, AssemblyError>;

/// Root error type for report assembly.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// A required input or report field is absent or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A numeric report field fell outside its allowed range.
    #[error("{field} out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// A tier violated its cardinality bound (e.g. more than 5 key risks).
    #[error("{field} exceeds its bound of {max}: {actual}")]
    TooMany {
        field: &'static str,
        max: usize,
        actual: usize,
    },
}
