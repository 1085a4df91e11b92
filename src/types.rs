//! Type aliases, default tolerances, and core enums for band-gap detection.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Dense `dim×dim` tensor value of an effective-tensor evaluator.
pub type Tensor = DMatrix<f64>;

/// Ascending eigenvalues of a tensor.
pub type Spectrum = DVector<f64>;

/// Frequency tolerance of the zero search and of the sampled interval ends.
pub const DEFAULT_FEPS: f64 = 1e-8;

/// Eigenvalue magnitude accepted as a zero by the root finder.
pub const DEFAULT_ZEPS: f64 = 1e-8;

/// Eigenmomentum threshold below which a resonance is masked.
pub const DEFAULT_TEPS: f64 = 1e-4;

/// Margins (percent of the resonance range) added below and above the range.
pub const DEFAULT_FREQ_MARGINS_PERCENT: (f64, f64) = (5.0, 5.0);

/// Trace sampling step (percent of the range including margins).
pub const DEFAULT_FREQ_STEP_PERCENT: f64 = 5.0;

pub const MIN_TRACE_SAMPLES: usize = 20;
pub const MAX_TRACE_SAMPLES: usize = 1000;

/// Smallest span reported by `BandReport::trace_bounds`.
pub const MIN_TRACE_SPAN: f64 = 1e-8;

/// Dense eigensolver applied to the effective tensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EigenMethod {
    /// Symmetric solver (symmetrizes its input). Right for the mass tensor.
    #[default]
    Symmetric,
    /// General real solver via the Schur form. Needed for the applied-load tensor.
    General,
}

/// Which end of the spectrum a zero search follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedEigenvalue {
    Smallest,
    Largest,
}

impl TrackedEigenvalue {
    /// Index into an ascending spectrum of length `len` (`len > 0`).
    pub fn index(self, len: usize) -> usize {
        match self {
            TrackedEigenvalue::Smallest => 0,
            TrackedEigenvalue::Largest => len - 1,
        }
    }
}
