//! Interface to the unit-cell problem that owns the finite-element data.
//!
//! Band-gap detection never assembles anything itself. Region volumes, material
//! densities and eigenmomentum integrals come from an implementation of
//! [`CellProblem`]; [`crate::precomputed::PrecomputedCell`] is the in-memory one.

use nalgebra::DVector;

use crate::config::{EigenmomentumSpec, TransformSpec};
use crate::error::{BandGapError, Result};

/// Density weight of one region in an eigenmomentum integral.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionWeight {
    pub region: String,
    pub density: f64,
}

pub trait CellProblem {
    /// Spatial dimension of the cell (size of an eigenmomentum vector).
    fn dim(&self) -> usize;

    /// Volume of `region`, evaluated with the volume term template.
    fn region_volume(&self, volume_term: &str, region: &str) -> Result<f64>;

    /// Density of `material` in `region`.
    fn region_density(&self, region: &str, material: &str) -> Result<f64>;

    /// Eigenmomentum `Σ_r weight_r ∫_r u` of mode `mode` with shape `mode_shape`.
    fn eigenmomentum(
        &self,
        spec: &EigenmomentumSpec,
        weights: &[RegionWeight],
        mode: usize,
        mode_shape: &[f64],
    ) -> Result<DVector<f64>>;

    /// Apply a named eigenvector transform. `shape` is `(n_nodes, dim)`.
    ///
    /// Returns `None` when the transformed mode is identically zero.
    fn transform_mode_shape(
        &self,
        transform: &TransformSpec,
        _mode_shape: &[f64],
        _shape: (usize, usize),
    ) -> Result<Option<Vec<f64>>> {
        Err(BandGapError::Problem(format!(
            "unknown eigenvector transform \"{}\"",
            transform.name
        )))
    }
}
