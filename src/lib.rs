//! Phononic band-gap detection for periodic unit cells.
//!
//! Given the eigenvalues and eigenvectors of a unit-cell problem, the effective
//! mass tensor `M*(ω)` is scanned between consecutive resonance frequencies.
//! The signs of its smallest and largest eigenvalue split each interval into
//! strong gap, weak gap and propagation zones.
//!
//! Finite-element data enter only through the [`CellProblem`] trait;
//! [`PrecomputedCell`] implements it from tabulated region integrals and backs
//! the JSON (and WASM) entry point [`detect_band_gaps_json`].
//!
//! ## Features
//!
//! - `parallel`: scan intervals concurrently with Rayon.

pub mod callback;
pub mod config;
pub mod density;
pub mod eigenmomenta;
pub mod error;
pub mod gaps;
pub mod precomputed;
pub mod problem;
pub mod root;
pub mod scanner;
pub mod solver;
pub mod tensor;
pub mod types;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use callback::{CallbackKind, CallbackMode, CallbackOutput, EigenProblemCallback, TraceSample};
pub use config::{BandGapOptions, EigenmomentumSpec, ResolvedOptions, TransformSpec};
pub use density::{compute_density_volume_info, DensityVolumeInfo};
pub use eigenmomenta::{
    compute_eigenmomenta, mask_eigenmomenta, prepare_eigenmomenta, EigenmomentaSet, Masking,
};
pub use error::{BandGapError, Result};
pub use gaps::{describe_gaps, Gap, GapKind, GapSegment, Zone};
pub use precomputed::{detect_band_gaps_json, PrecomputedCell, PrecomputedInput, PrecomputedRegion};
pub use problem::{CellProblem, RegionWeight};
pub use root::{find_zero, BoundaryFlag, BoundaryOutcome};
pub use scanner::{
    cut_freq_range, detect_band_gaps, scan_band_gaps, setup_band_gaps, BandGapSetup, BandReport,
    FreqInfo, IntervalLog, ScanSettings,
};
pub use solver::{eig, EigenDecomposition};
pub use tensor::{christoffel_tensor, AcousticMassTensor, AppliedLoadTensor, EffectiveTensor};
pub use types::{EigenMethod, Spectrum, Tensor, TrackedEigenvalue};
