//! Unified error handling for the trail-router library.
//!
//! Errors fall into the categories the pipeline needs to tell apart:
//! data-quality problems (bad geometry), oracle query failures, invariant
//! violations, configuration mistakes and cancellation.

use thiserror::Error;

/// Failure of a single geometry or graph query.
///
/// Callers always recover from these locally: the offending candidate is
/// logged and skipped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    /// A node id passed to the oracle does not exist in the graph.
    #[error("unknown node: {0}")]
    UnknownNode(u64),

    /// The search expanded more nodes than allowed. Either the nodes are
    /// very far apart or no path exists.
    #[error("step limit exceeded after {0} expansions")]
    StepLimitExceeded(usize),

    /// Geometry input the oracle cannot work with (empty or single-point lines).
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
}

/// Unified error type for trail-router operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrailRouteError {
    /// Geometry that could not be parsed or has too few usable points
    #[error("trail '{trail_id}' has invalid geometry: {message}")]
    InvalidGeometry { trail_id: String, message: String },

    /// A geometry or graph query failed
    #[error("oracle query failed: {0}")]
    Oracle(#[from] OracleError),

    /// A structural guarantee was broken (self-loop edge, zero-length edge,
    /// duplicate route hash). Always indicates a logic bug.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// The run was cancelled between patterns
    #[error("run cancelled after {completed_patterns} pattern(s)")]
    Cancelled { completed_patterns: usize },

    /// Error reported by an external collaborator (storage)
    #[error("collaborator '{collaborator}' failed: {message}")]
    Collaborator { collaborator: String, message: String },
}

impl TrailRouteError {
    /// Shorthand for an [`TrailRouteError::InvalidGeometry`] error.
    pub fn invalid_geometry(trail_id: impl Into<String>, message: impl Into<String>) -> Self {
        TrailRouteError::InvalidGeometry {
            trail_id: trail_id.into(),
            message: message.into(),
        }
    }

    /// Shorthand for an [`TrailRouteError::InvariantViolation`] error.
    pub fn invariant(message: impl Into<String>) -> Self {
        TrailRouteError::InvariantViolation(message.into())
    }

    /// True for errors that abort the whole ingest run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TrailRouteError::Oracle(_))
    }
}

/// Result type alias for trail-router operations.
pub type Result<T> = std::result::Result<T, TrailRouteError>;

/// Extension trait for converting Option to TrailRouteError.
pub trait OptionExt<T> {
    /// Convert Option to Result with an invalid geometry error.
    fn ok_or_invalid_geometry(self, trail_id: &str, message: &str) -> Result<T>;

    /// Convert Option to Result with an invariant violation error.
    fn ok_or_invariant(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_invalid_geometry(self, trail_id: &str, message: &str) -> Result<T> {
        self.ok_or_else(|| TrailRouteError::invalid_geometry(trail_id, message))
    }

    fn ok_or_invariant(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TrailRouteError::invariant(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrailRouteError::invalid_geometry("trail-7", "unparsable coordinate 'abc'");
        assert!(err.to_string().contains("trail-7"));
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_oracle_errors_are_recoverable() {
        let err: TrailRouteError = OracleError::UnknownNode(42).into();
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("42"));
        assert!(TrailRouteError::invariant("self-loop").is_fatal());
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_invalid_geometry("t1", "empty");
        assert!(matches!(
            result,
            Err(TrailRouteError::InvalidGeometry { .. })
        ));
        assert!(matches!(
            None::<u8>.ok_or_invariant("missing node"),
            Err(TrailRouteError::InvariantViolation(_))
        ));
    }
}
