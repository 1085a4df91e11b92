//! Eigenmomenta of the cell eigenmodes and their validity masking.
//!
//! The eigenmomentum of a mode is the density-weighted integral of its shape
//! over the configured regions. Modes whose eigenmomentum magnitude falls below
//! the threshold do not couple to a rigid motion of the cell; their rows are
//! zeroed in place so that row `i` always belongs to eigenvalue `i`.

use std::collections::BTreeMap;

use log::{debug, info};
use nalgebra::DMatrix;

use crate::config::{EigenmomentumSpec, TransformSpec};
use crate::error::{BandGapError, Result};
use crate::problem::{CellProblem, RegionWeight};

/// Outcome of masking one eigenmomenta matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Masking {
    /// `true` for modes at or above the threshold.
    pub valid: Vec<bool>,
    /// Rows that held non-zero entries and were zeroed by this call.
    pub n_zeroed: usize,
    /// Modes below the threshold, already-zero rows included.
    pub n_invalid: usize,
    /// Absolute threshold that was applied.
    pub tol: f64,
}

/// Euclidean norm of every eigenmomentum (row).
pub fn eigenmomentum_magnitudes(eigenmomenta: &DMatrix<f64>) -> Vec<f64> {
    eigenmomenta.row_iter().map(|row| row.norm()).collect()
}

/// Zero the rows of `eigenmomenta` whose magnitude is below the threshold.
///
/// With `relative`, the threshold is scaled by the largest magnitude.
pub fn mask_eigenmomenta(eigenmomenta: &mut DMatrix<f64>, threshold: f64, relative: bool) -> Masking {
    let magnitudes = eigenmomentum_magnitudes(eigenmomenta);
    let tol = if relative {
        threshold * magnitudes.iter().copied().fold(0.0, f64::max)
    } else {
        threshold
    };

    let valid: Vec<bool> = magnitudes.iter().map(|&mag| !(mag < tol)).collect();
    let mut n_zeroed = 0;
    for (ii, &is_valid) in valid.iter().enumerate() {
        if !is_valid {
            if magnitudes[ii] != 0.0 {
                n_zeroed += 1;
            }
            eigenmomenta.fill_row(ii, 0.0);
        }
    }

    let n_invalid = valid.iter().filter(|v| !**v).count();
    Masking {
        valid,
        n_zeroed,
        n_invalid,
        tol,
    }
}

/// Masked eigenmomenta, one row per eigenmode.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenmomentaSet {
    /// Density-weighted eigenmomenta, `n_eigs × dim`.
    pub weighted: DMatrix<f64>,
    /// Unit-density eigenmomenta, masked like `weighted`.
    pub unweighted: Option<DMatrix<f64>>,
    pub valid: Vec<bool>,
    /// Number of invalid (zeroed) modes.
    pub n_zeroed: usize,
    pub tol: f64,
}

impl EigenmomentaSet {
    /// Mask raw eigenmomenta. The unweighted companion follows the weighted mask.
    pub fn from_raw(
        mut weighted: DMatrix<f64>,
        unweighted: Option<DMatrix<f64>>,
        threshold: f64,
        relative: bool,
    ) -> Result<Self> {
        let masking = mask_eigenmomenta(&mut weighted, threshold, relative);

        let unweighted = match unweighted {
            Some(mut uem) => {
                if uem.shape() != weighted.shape() {
                    return Err(BandGapError::ShapeMismatch(format!(
                        "unweighted eigenmomenta {:?} vs weighted {:?}",
                        uem.shape(),
                        weighted.shape()
                    )));
                }
                for (ii, &is_valid) in masking.valid.iter().enumerate() {
                    if !is_valid {
                        uem.fill_row(ii, 0.0);
                    }
                }
                Some(uem)
            }
            None => None,
        };

        Ok(Self {
            weighted,
            unweighted,
            valid: masking.valid,
            n_zeroed: masking.n_invalid,
            tol: masking.tol,
        })
    }

    pub fn n_eigs(&self) -> usize {
        self.weighted.nrows()
    }

    pub fn dim(&self) -> usize {
        self.weighted.ncols()
    }

    pub fn n_valid(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }

    pub fn valid_indices(&self) -> Vec<usize> {
        self.valid
            .iter()
            .enumerate()
            .filter(|(_, v)| **v)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Evaluate the eigenmomentum of every column of `eig_vectors`.
pub fn compute_eigenmomenta<P: CellProblem + ?Sized>(
    problem: &P,
    spec: &EigenmomentumSpec,
    weights: &[RegionWeight],
    eig_vectors: &DMatrix<f64>,
    transform: Option<&TransformSpec>,
) -> Result<DMatrix<f64>> {
    let dim = problem.dim();
    let (n_dof, n_eigs) = eig_vectors.shape();
    let n_nod = if dim > 0 { n_dof / dim } else { 0 };

    let mut eigenmomenta = DMatrix::zeros(n_eigs, dim);
    for ii in 0..n_eigs {
        if ii % 100 == 0 {
            debug!("eigenmomentum {ii} of {n_eigs}");
        }
        let column = eig_vectors.column(ii);
        let shape = match transform {
            Some(t) => problem.transform_mode_shape(t, column.as_slice(), (n_nod, dim))?,
            None => Some(column.as_slice().to_vec()),
        };
        let Some(shape) = shape else {
            continue;
        };

        let value = problem.eigenmomentum(spec, weights, ii, &shape)?;
        if value.len() != dim {
            return Err(BandGapError::ShapeMismatch(format!(
                "eigenmomentum of mode {ii} has {} components, expected {dim}",
                value.len()
            )));
        }
        eigenmomenta.set_row(ii, &value.transpose());
    }

    Ok(eigenmomenta)
}

/// Compute and mask eigenmomenta of all modes.
///
/// With `unweighted`, unit-density eigenmomenta are computed as well (needed by
/// the applied-load tensor) and masked with the weighted mask.
#[allow(clippy::too_many_arguments)]
pub fn prepare_eigenmomenta<P: CellProblem + ?Sized>(
    problem: &P,
    spec: &EigenmomentumSpec,
    region_to_material: &BTreeMap<String, String>,
    eig_vectors: &DMatrix<f64>,
    threshold: f64,
    threshold_is_relative: bool,
    unweighted: bool,
    transform: Option<&TransformSpec>,
) -> Result<EigenmomentaSet> {
    let mut weights = Vec::with_capacity(spec.regions.len());
    for region in &spec.regions {
        let material = region_to_material.get(region).ok_or_else(|| {
            BandGapError::InvalidOption {
                name: "region_to_material",
                reason: format!("no material for eigenmomentum region \"{region}\""),
            }
        })?;
        weights.push(RegionWeight {
            region: region.clone(),
            density: problem.region_density(region, material)?,
        });
    }

    let weighted = compute_eigenmomenta(problem, spec, &weights, eig_vectors, transform)?;
    let unit_eigenmomenta = if unweighted {
        let unit: Vec<RegionWeight> = weights
            .iter()
            .map(|w| RegionWeight {
                region: w.region.clone(),
                density: 1.0,
            })
            .collect();
        Some(compute_eigenmomenta(problem, spec, &unit, eig_vectors, transform)?)
    } else {
        None
    };

    let set = EigenmomentaSet::from_raw(weighted, unit_eigenmomenta, threshold, threshold_is_relative)?;
    info!(
        "{} of {} eigenmomenta zeroed (under {:.2e})",
        set.n_zeroed,
        set.n_eigs(),
        set.tol
    );
    Ok(set)
}
