//! Band-gap detection options.
//!
//! [`BandGapOptions`] mirrors the user-facing option set: every field is optional
//! on input so that a partially filled JSON document deserializes, and
//! [`BandGapOptions::resolve`] turns it into [`ResolvedOptions`] by applying the
//! documented defaults and rejecting missing required keys.
//!
//! | option | default |
//! |---|---|
//! | `eig_range` | all eigenvalues; a negative end counts from the back |
//! | `freq_margins` | `(5, 5)` percent |
//! | `freq_step` | `5` percent |
//! | `feps`, `zeps` | `1e-8` |
//! | `teps` | `1e-4`, relative (`teps_rel = true`) |
//! | `method` | `symmetric` |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{BandGapError, Result};
use crate::types::{
    EigenMethod, DEFAULT_FEPS, DEFAULT_FREQ_MARGINS_PERCENT, DEFAULT_FREQ_STEP_PERCENT,
    DEFAULT_TEPS, DEFAULT_ZEPS,
};

/// How eigenmomenta are integrated by the cell problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EigenmomentumSpec {
    /// Name of the displacement variable the mode shapes are loaded into.
    pub var: String,
    /// Regions the eigenmomentum integral runs over.
    pub regions: Vec<String>,
    /// Term template understood by the cell problem.
    pub term: String,
}

/// Named eigenvector transform with extra arguments, resolved by the cell problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformSpec {
    pub name: String,
    #[serde(default)]
    pub args: Vec<f64>,
}

/// Raw band-gap options as supplied by the user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandGapOptions {
    pub eigenmomentum: Option<EigenmomentumSpec>,
    pub region_to_material: Option<BTreeMap<String, String>>,
    /// Volume term template, formatted with a region name by the cell problem.
    pub volume: Option<String>,
    /// Eigenvalue index range `[start, end)`.
    pub eig_range: Option<(i64, i64)>,
    /// Frequency margins in percent of the resonance range.
    pub freq_margins: Option<(f64, f64)>,
    /// Trace sampling step in percent of the range including margins.
    pub freq_step: Option<f64>,
    /// Fixed frequency range; overrides `eig_range` and the margins.
    pub fixed_freq_range: Option<(f64, f64)>,
    pub feps: Option<f64>,
    pub zeps: Option<f64>,
    pub teps: Option<f64>,
    pub teps_rel: Option<bool>,
    pub eig_vector_transform: Option<TransformSpec>,
    pub method: Option<EigenMethod>,
    /// Also compute unweighted eigenmomenta for the applied-load tensor.
    pub unweighted: bool,
}

/// Options with defaults applied, ready for a scan over `n_eigs` eigenvalues.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedOptions {
    pub eigenmomentum: EigenmomentumSpec,
    pub region_to_material: BTreeMap<String, String>,
    pub volume: String,
    pub eig_range: (usize, usize),
    /// Fractions, not percent.
    pub freq_margins: (f64, f64),
    /// Fraction, not percent.
    pub freq_step: f64,
    pub fixed_freq_range: Option<(f64, f64)>,
    pub feps: f64,
    pub zeps: f64,
    pub teps: f64,
    pub teps_rel: bool,
    pub eig_vector_transform: Option<TransformSpec>,
    pub method: EigenMethod,
    pub unweighted: bool,
}

impl BandGapOptions {
    pub fn new(
        eigenmomentum: EigenmomentumSpec,
        region_to_material: BTreeMap<String, String>,
        volume: impl Into<String>,
    ) -> Self {
        Self {
            eigenmomentum: Some(eigenmomentum),
            region_to_material: Some(region_to_material),
            volume: Some(volume.into()),
            ..Self::default()
        }
    }

    /// Parse options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_eig_range(mut self, start: i64, end: i64) -> Self {
        self.eig_range = Some((start, end));
        self
    }

    pub fn with_fixed_freq_range(mut self, fmin: f64, fmax: f64) -> Self {
        self.fixed_freq_range = Some((fmin, fmax));
        self
    }

    pub fn with_freq_margins(mut self, below: f64, above: f64) -> Self {
        self.freq_margins = Some((below, above));
        self
    }

    pub fn with_freq_step(mut self, percent: f64) -> Self {
        self.freq_step = Some(percent);
        self
    }

    pub fn with_tolerances(mut self, feps: f64, zeps: f64) -> Self {
        self.feps = Some(feps);
        self.zeps = Some(zeps);
        self
    }

    pub fn with_threshold(mut self, teps: f64, relative: bool) -> Self {
        self.teps = Some(teps);
        self.teps_rel = Some(relative);
        self
    }

    pub fn with_method(mut self, method: EigenMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_unweighted(mut self, unweighted: bool) -> Self {
        self.unweighted = unweighted;
        self
    }

    /// Apply defaults and validate against the number of available eigenvalues.
    pub fn resolve(&self, n_eigs: usize) -> Result<ResolvedOptions> {
        let eigenmomentum = self
            .eigenmomentum
            .clone()
            .ok_or(BandGapError::MissingOption("eigenmomentum"))?;
        let region_to_material = self
            .region_to_material
            .clone()
            .ok_or(BandGapError::MissingOption("region_to_material"))?;
        let volume = self
            .volume
            .clone()
            .ok_or(BandGapError::MissingOption("volume"))?;

        let eig_range = resolve_eig_range(self.eig_range, n_eigs)?;

        let (below, above) = self.freq_margins.unwrap_or(DEFAULT_FREQ_MARGINS_PERCENT);
        if !(below >= 0.0 && above >= 0.0) {
            return Err(invalid("freq_margins", "margins must be non-negative"));
        }
        let freq_step = self.freq_step.unwrap_or(DEFAULT_FREQ_STEP_PERCENT);
        if !(freq_step > 0.0) {
            return Err(invalid("freq_step", "step must be positive"));
        }

        if let Some((fmin, fmax)) = self.fixed_freq_range {
            if !(fmin >= 0.0 && fmin < fmax) {
                return Err(invalid(
                    "fixed_freq_range",
                    format!("expected 0 <= fmin < fmax, got ({fmin}, {fmax})"),
                ));
            }
        }

        let feps = self.feps.unwrap_or(DEFAULT_FEPS);
        if !(feps > 0.0) {
            return Err(invalid("feps", "tolerance must be positive"));
        }
        let zeps = self.zeps.unwrap_or(DEFAULT_ZEPS);
        if !(zeps >= 0.0) {
            return Err(invalid("zeps", "tolerance must be non-negative"));
        }
        let teps = self.teps.unwrap_or(DEFAULT_TEPS);
        if !(teps >= 0.0) {
            return Err(invalid("teps", "threshold must be non-negative"));
        }

        Ok(ResolvedOptions {
            eigenmomentum,
            region_to_material,
            volume,
            eig_range,
            freq_margins: (0.01 * below, 0.01 * above),
            freq_step: 0.01 * freq_step,
            fixed_freq_range: self.fixed_freq_range,
            feps,
            zeps,
            teps,
            teps_rel: self.teps_rel.unwrap_or(true),
            eig_vector_transform: self.eig_vector_transform.clone(),
            method: self.method.unwrap_or_default(),
            unweighted: self.unweighted,
        })
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> BandGapError {
    BandGapError::InvalidOption {
        name,
        reason: reason.into(),
    }
}

fn resolve_eig_range(range: Option<(i64, i64)>, n_eigs: usize) -> Result<(usize, usize)> {
    let n = n_eigs as i64;
    let (start, mut end) = range.unwrap_or((0, n));
    if end < 0 {
        end += n + 1;
    }
    if start < 0 || start >= end - 1 || end > n {
        return Err(invalid(
            "eig_range",
            format!("need 0 <= start < end - 1 and end <= {n_eigs}, got ({start}, {end})"),
        ));
    }
    Ok((start as usize, end as usize))
}
