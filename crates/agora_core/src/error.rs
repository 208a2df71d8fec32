use thiserror::Error;

/// Construction-time and evaluation-time failures.
///
/// Non-convergence of the root finder is deliberately not represented here;
/// it travels in [`crate::solver::SolveOutcome`] so the caller always gets
/// the best iterate and a diagnostic message alongside the failure flag.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("elasticity of substitution for city {city} equals 1; the markup theta/(theta-1) is undefined")]
    ElasticityUnitary { city: usize },

    #[error("{what} has wrong dimension: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid distance matrix: {detail}")]
    DistanceMatrix { detail: String },

    #[error("invalid solver setting: {detail}")]
    InvalidSetting { detail: String },
}
