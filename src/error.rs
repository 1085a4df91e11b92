//! Error type shared by all band-gap detection stages.

use crate::root::BoundaryOutcome;

/// Errors raised while setting up or running a band-gap scan.
#[derive(Debug, thiserror::Error)]
pub enum BandGapError {
    #[error("missing key \"{0}\" in options")]
    MissingOption(&'static str),

    #[error("invalid option \"{name}\": {reason}")]
    InvalidOption { name: &'static str, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("eigenvalue problem failed: {0}")]
    Eigen(String),

    #[error("no eigenvalues in frequency range ]{fmin}, {fmax}[")]
    EmptyFrequencyRange { fmin: f64, fmax: f64 },

    #[error("impossible band gap combination in interval {interval}: min {min:?}, max {max:?}")]
    ImpossibleGap {
        interval: usize,
        min: BoundaryOutcome,
        max: BoundaryOutcome,
    },

    #[error("cell problem error: {0}")]
    Problem(String),
}

pub type Result<T> = std::result::Result<T, BandGapError>;
