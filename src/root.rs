//! Bisection search for the zero of an extreme eigenvalue.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::error::{BandGapError, Result};
use crate::types::{Spectrum, TrackedEigenvalue};

/// How a zero search on `]f0, f1[` ended.
///
/// | mode | flag | meaning |
/// |---|---|---|
/// | both | `Zero` (0) | eigenvalue → 0 inside the interval |
/// | smallest | `Right` (1) | f → f1, smallest eigenvalue < 0 |
/// | smallest | `Left` (2) | f → f0, smallest eigenvalue > 0 and → −∞ |
/// | largest | `Right` (1) | f → f1, largest eigenvalue < 0 and → +∞ |
/// | largest | `Left` (2) | f → f0, largest eigenvalue > 0 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryFlag {
    Zero,
    Right,
    Left,
}

impl BoundaryFlag {
    pub fn code(self) -> u8 {
        match self {
            BoundaryFlag::Zero => 0,
            BoundaryFlag::Right => 1,
            BoundaryFlag::Left => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(BoundaryFlag::Zero),
            1 => Some(BoundaryFlag::Right),
            2 => Some(BoundaryFlag::Left),
            _ => None,
        }
    }
}

/// Flag, frequency, and tracked eigenvalue at the end of a search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryOutcome {
    pub flag: BoundaryFlag,
    pub freq: f64,
    pub eigenvalue: f64,
}

impl BoundaryOutcome {
    pub fn new(flag: BoundaryFlag, freq: f64, eigenvalue: f64) -> Self {
        Self {
            flag,
            freq,
            eigenvalue,
        }
    }
}

/// Find `f ∈ ]f0, f1[` where the tracked extreme eigenvalue of `probe(f)` is zero.
///
/// Plain bisection: a positive eigenvalue moves the upper bracket end down, a
/// non-positive one moves the lower end up. A single sign change in the
/// interval is assumed and not re-checked. The search stops when the value is
/// below `zeps`, when the bracket stagnates at machine precision, or when the
/// midpoint comes within `feps` of an interval end.
pub fn find_zero<F>(
    f0: f64,
    f1: f64,
    mut probe: F,
    feps: f64,
    zeps: f64,
    mode: TrackedEigenvalue,
) -> Result<BoundaryOutcome>
where
    F: FnMut(f64) -> Result<Spectrum>,
{
    let (mut fm, mut fp) = (f0, f1);
    loop {
        let f = 0.5 * (fm + fp);
        let eigs = probe(f)?;
        if eigs.is_empty() {
            return Err(BandGapError::Eigen(format!("empty spectrum at f = {f}")));
        }
        let val = eigs[mode.index(eigs.len())];
        trace!("find_zero {mode:?}: f = {f:.16e} in [{fm:.16e}, {fp:.16e}], value {val:.16e}");

        if val.abs() < zeps || (fp - fm) < fm.abs() * f64::EPSILON {
            return Ok(BoundaryOutcome::new(BoundaryFlag::Zero, f, val));
        }

        match mode {
            TrackedEigenvalue::Smallest => {
                if f - f0 < feps {
                    return Ok(BoundaryOutcome::new(BoundaryFlag::Left, f0, val));
                } else if f1 - f < feps {
                    return Ok(BoundaryOutcome::new(BoundaryFlag::Right, f1, val));
                }
            }
            TrackedEigenvalue::Largest => {
                if f1 - f < feps {
                    return Ok(BoundaryOutcome::new(BoundaryFlag::Right, f1, val));
                } else if f - f0 < feps {
                    return Ok(BoundaryOutcome::new(BoundaryFlag::Left, f0, val));
                }
            }
        }

        if val > 0.0 {
            fp = f;
        } else {
            fm = f;
        }
    }
}
