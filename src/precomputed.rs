//! In-memory unit cell with precomputed region integrals.
//!
//! Each region stores its volume, its density, and the unit-density
//! eigenmomentum integral `∫_r u_m` of every mode. The eigenmomentum of mode
//! `m` is then `Σ_r ρ_r ∫_r u_m` over the requested regions, so no mode shapes
//! are needed. This is what the JSON and WASM entry points run on.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::config::{BandGapOptions, EigenmomentumSpec};
use crate::error::{BandGapError, Result};
use crate::problem::{CellProblem, RegionWeight};
use crate::scanner::{detect_band_gaps, BandReport};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedRegion {
    pub volume: f64,
    pub density: f64,
    /// `integrals[m]` is `∫_r u_m`, one entry per dimension.
    #[serde(default)]
    pub integrals: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecomputedCell {
    pub dim: usize,
    pub regions: BTreeMap<String, PrecomputedRegion>,
}

impl PrecomputedCell {
    fn region(&self, region: &str) -> Result<&PrecomputedRegion> {
        self.regions
            .get(region)
            .ok_or_else(|| BandGapError::Problem(format!("unknown region \"{region}\"")))
    }
}

impl CellProblem for PrecomputedCell {
    fn dim(&self) -> usize {
        self.dim
    }

    fn region_volume(&self, _volume_term: &str, region: &str) -> Result<f64> {
        Ok(self.region(region)?.volume)
    }

    fn region_density(&self, region: &str, _material: &str) -> Result<f64> {
        Ok(self.region(region)?.density)
    }

    fn eigenmomentum(
        &self,
        _spec: &EigenmomentumSpec,
        weights: &[RegionWeight],
        mode: usize,
        _mode_shape: &[f64],
    ) -> Result<DVector<f64>> {
        let mut value = DVector::zeros(self.dim);
        for weight in weights {
            let integral = self.region(&weight.region)?.integrals.get(mode).ok_or_else(|| {
                BandGapError::ShapeMismatch(format!(
                    "region \"{}\" has no integral for mode {mode}",
                    weight.region
                ))
            })?;
            if integral.len() != self.dim {
                return Err(BandGapError::ShapeMismatch(format!(
                    "integral of mode {mode} in region \"{}\" has {} components, expected {}",
                    weight.region,
                    integral.len(),
                    self.dim
                )));
            }
            value += DVector::from_column_slice(integral) * weight.density;
        }
        Ok(value)
    }
}

/// A complete band-gap detection request.
#[derive(Debug, Clone, Deserialize)]
pub struct PrecomputedInput {
    pub cell: PrecomputedCell,
    /// Eigenvalues, ascending.
    pub eigs: Vec<f64>,
    pub options: BandGapOptions,
    /// Christoffel tensor, row by row.
    #[serde(default)]
    pub christoffel: Option<Vec<Vec<f64>>>,
}

impl PrecomputedInput {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn christoffel_matrix(&self) -> Result<Option<DMatrix<f64>>> {
        let Some(rows) = &self.christoffel else {
            return Ok(None);
        };
        let n = rows.len();
        if rows.iter().any(|row| row.len() != n) {
            return Err(BandGapError::ShapeMismatch(format!(
                "Christoffel tensor with {n} rows is not square"
            )));
        }
        Ok(Some(DMatrix::from_row_iterator(n, n, rows.iter().flatten().copied())))
    }

    pub fn run(&self) -> Result<BandReport> {
        let christoffel = self.christoffel_matrix()?;
        let modes = DMatrix::zeros(0, self.eigs.len());
        detect_band_gaps(&self.cell, &self.eigs, &modes, &self.options, christoffel.as_ref())
    }
}

/// Run band-gap detection on a JSON request and return the report as JSON.
pub fn detect_band_gaps_json(input: &str) -> Result<String> {
    PrecomputedInput::from_json(input)?.run()?.to_json()
}
