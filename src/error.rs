use serde::Serialize;
use thiserror::Error;

/// A single problem found while validating geometry or mass data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("{label} has only {found} points (minimum {required})")]
    TooFewPoints {
        label: String,
        found: usize,
        required: usize,
    },
    #[error("leading edge ({le} points) and trailing edge ({te} points) must have the same number of points")]
    MismatchedEdges { le: usize, te: usize },
    #[error("mass must be positive, got {0}")]
    NonPositiveMass(f64),
    #[error("inertia tensor must be symmetric")]
    AsymmetricInertia,
    #[error("inertia tensor must be positive definite (eigenvalues {0:?})")]
    InertiaNotPositiveDefinite([f64; 3]),
    #[error("section {index} has zero or negative chord")]
    DegenerateChord { index: usize },
    #[error("invalid span: {0}")]
    InvalidSpan(f64),
}

/// Fatal validation outcome: every issue found, reported together.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("geometry validation failed: {}", join_issues(.0))]
pub struct ValidationFailed(pub Vec<GeometryError>);

fn join_issues(issues: &[GeometryError]) -> String {
    issues
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Why one run case produced no usable coefficients. Recorded on the case,
/// never propagated out of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CaseFailure {
    #[error("failed to start solver: {message}")]
    Spawn { message: String },
    #[error("solver timed out after {seconds:.1} s")]
    Timeout { seconds: f64 },
    #[error("expected output missing: {}", .expected.join(", "))]
    MissingOutput { expected: Vec<String> },
    #[error("solver output lacks coefficients: {}", .missing.join(", "))]
    IncompleteOutput { missing: Vec<String> },
    #[error("i/o error in case work directory: {message}")]
    Io { message: String },
}

impl From<std::io::Error> for CaseFailure {
    fn from(err: std::io::Error) -> Self {
        CaseFailure::Io { message: err.to_string() }
    }
}

/// Not enough converged data to fit a slope. Distinct from a zero derivative.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("need at least {required} distinct points to fit, found {found}")]
    InsufficientPoints { found: usize, required: usize },
    #[error("records span more than one flight condition")]
    MixedConditions,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("directory not found: {0}")]
    MissingDirectory(String),
    #[error("missing required files: {}", .0.join(", "))]
    MissingFiles(Vec<String>),
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{file}: {message}")]
    Format { file: String, message: String },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_failed_lists_every_issue() {
        let err = ValidationFailed(vec![
            GeometryError::NonPositiveMass(0.0),
            GeometryError::MismatchedEdges { le: 3, te: 4 },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("mass must be positive"));
        assert!(msg.contains("3 points"));
    }

    #[test]
    fn test_case_failure_serializes_with_kind_tag() {
        let f = CaseFailure::MissingOutput {
            expected: vec!["a0.0_b0.0_M0.10_ft.txt".to_string()],
        };
        let json = serde_json::to_string(&f).unwrap();
        assert!(json.contains("\"kind\":\"missing_output\""));
    }
}
