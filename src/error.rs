use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used throughout the optimization core.
pub type Result<T> = std::result::Result<T, MlpError>;

/// Errors produced by the optimization core when inputs are invalid or the
/// line search cannot make progress.
#[derive(Debug, Clone, PartialEq)]
pub enum MlpError {
    /// A shape invariant between the sample, target and weight matrices was
    /// violated.
    ShapeMismatch {
        /// Human-readable context for the mismatch (e.g. "target rows").
        what: &'static str,
        /// Observed value.
        got: usize,
        /// Expected value.
        expected: usize,
    },

    /// The bracketing phase of the line search never saw the directional
    /// derivative change sign before exhausting its doubling budget.
    BracketingFailed {
        /// Upper bound reached when the search gave up.
        upper: f64,
        /// Number of doublings performed.
        doublings: u32,
    },
}

impl Display for MlpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlpError::ShapeMismatch {
                what,
                got,
                expected,
            } => {
                write!(f, "shape mismatch for {what}: got {got}, expected {expected}")
            }
            MlpError::BracketingFailed { upper, doublings } => write!(
                f,
                "line search failed to bracket a sign change after {doublings} doublings (upper bound {upper:e})"
            ),
        }
    }
}

impl Error for MlpError {}
