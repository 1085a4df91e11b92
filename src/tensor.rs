//! Frequency-dependent effective tensors of the homogenized medium.
//!
//! Both tensors are spectral sums over the valid resonances:
//!
//! ```text
//! M*(ω) = ρ̄ I − ω²/|Y| Σ_m  m_m ⊗ m_m / (ω² − λ_m)
//! L*(ω) =    I − ω²/|Y| Σ_m  m_m ⊗ n_m / (ω² − λ_m)
//! ```
//!
//! where `m_m` are the density-weighted and `n_m` the unweighted eigenmomenta.
//! Entries diverge at `ω² = λ_m`; evaluators are pure and never cache.

use nalgebra::{DMatrix, DVector};

use crate::density::DensityVolumeInfo;
use crate::error::{BandGapError, Result};
use crate::types::Tensor;

/// A `dim×dim` matrix-valued function of frequency.
pub trait EffectiveTensor {
    fn dim(&self) -> usize;
    fn evaluate(&self, freq: f64) -> Tensor;
}

impl<T: EffectiveTensor + ?Sized> EffectiveTensor for &T {
    fn dim(&self) -> usize {
        (**self).dim()
    }

    fn evaluate(&self, freq: f64) -> Tensor {
        (**self).evaluate(freq)
    }
}

fn check_modes(eigenmomenta: &DMatrix<f64>, eigs: &[f64]) -> Result<()> {
    if eigenmomenta.nrows() != eigs.len() {
        return Err(BandGapError::ShapeMismatch(format!(
            "{} eigenmomenta for {} eigenvalues",
            eigenmomenta.nrows(),
            eigs.len()
        )));
    }
    Ok(())
}

/// Frequency-dependent effective mass tensor. Symmetric by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct AcousticMassTensor {
    eigenmomenta: DMatrix<f64>,
    eigs: Vec<f64>,
    average_density: f64,
    total_volume: f64,
}

impl AcousticMassTensor {
    /// `eigenmomenta` (`n × dim`) and `eigs` (`n`) should hold valid resonances only.
    pub fn new(eigenmomenta: DMatrix<f64>, eigs: Vec<f64>, dv_info: &DensityVolumeInfo) -> Result<Self> {
        check_modes(&eigenmomenta, &eigs)?;
        Ok(Self {
            eigenmomenta,
            eigs,
            average_density: dv_info.average_density,
            total_volume: dv_info.total_volume,
        })
    }

    pub fn n_modes(&self) -> usize {
        self.eigs.len()
    }
}

impl EffectiveTensor for AcousticMassTensor {
    fn dim(&self) -> usize {
        self.eigenmomenta.ncols()
    }

    fn evaluate(&self, freq: f64) -> Tensor {
        let dim = self.dim();
        let f2 = freq * freq;
        let ema = &self.eigenmomenta;

        let mut fmass = DMatrix::zeros(dim, dim);
        for ir in 0..dim {
            for ic in ir..dim {
                let val: f64 = self
                    .eigs
                    .iter()
                    .enumerate()
                    .map(|(m, &eig)| ema[(m, ir)] * ema[(m, ic)] / (f2 - eig))
                    .sum();
                fmass[(ir, ic)] = f2 * val;
                fmass[(ic, ir)] = fmass[(ir, ic)];
            }
        }

        DMatrix::identity(dim, dim) * self.average_density - fmass / self.total_volume
    }
}

/// Frequency-dependent applied-load tensor. Generally non-symmetric.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedLoadTensor {
    eigenmomenta: DMatrix<f64>,
    ueigenmomenta: DMatrix<f64>,
    eigs: Vec<f64>,
    total_volume: f64,
}

impl AppliedLoadTensor {
    /// Weighted and unweighted eigenmomenta must share shape and eigenvalues.
    pub fn new(
        eigenmomenta: DMatrix<f64>,
        ueigenmomenta: DMatrix<f64>,
        eigs: Vec<f64>,
        dv_info: &DensityVolumeInfo,
    ) -> Result<Self> {
        check_modes(&eigenmomenta, &eigs)?;
        if eigenmomenta.shape() != ueigenmomenta.shape() {
            return Err(BandGapError::ShapeMismatch(format!(
                "weighted eigenmomenta {:?} vs unweighted {:?}",
                eigenmomenta.shape(),
                ueigenmomenta.shape()
            )));
        }
        Ok(Self {
            eigenmomenta,
            ueigenmomenta,
            eigs,
            total_volume: dv_info.total_volume,
        })
    }
}

impl EffectiveTensor for AppliedLoadTensor {
    fn dim(&self) -> usize {
        self.eigenmomenta.ncols()
    }

    fn evaluate(&self, freq: f64) -> Tensor {
        let dim = self.dim();
        let f2 = freq * freq;
        let (ema, uema) = (&self.eigenmomenta, &self.ueigenmomenta);

        let fload = DMatrix::from_fn(dim, dim, |ir, ic| {
            let val: f64 = self
                .eigs
                .iter()
                .enumerate()
                .map(|(m, &eig)| ema[(m, ir)] * uema[(m, ic)] / (f2 - eig))
                .sum();
            f2 * val
        });

        DMatrix::identity(dim, dim) - fload / self.total_volume
    }
}

/// Index of the symmetric pair `(ir, ic)` in symmetric (Voigt-like) storage:
/// diagonal entries first, then the upper off-diagonals row by row.
pub fn sym_index(ir: usize, ic: usize, dim: usize) -> usize {
    if ir == ic {
        return ir;
    }
    let (r, c) = (ir.min(ic), ir.max(ic));
    dim + r * (2 * dim - r - 3) / 2 + c - 1
}

/// Christoffel acoustic tensor `Γ_ik = D_ijkl n_j n_l` of the elasticity tensor
/// `mtx_d` (symmetric storage) and the unit incident-wave direction.
pub fn christoffel_tensor(mtx_d: &DMatrix<f64>, direction: &DVector<f64>) -> Result<Tensor> {
    let dim = direction.len();
    let sym = dim * (dim + 1) / 2;
    if mtx_d.shape() != (sym, sym) {
        return Err(BandGapError::ShapeMismatch(format!(
            "elasticity tensor {:?} for dimension {dim}, expected ({sym}, {sym})",
            mtx_d.shape()
        )));
    }

    let mut cat = DMatrix::zeros(dim, dim);
    for ii in 0..dim {
        for ij in 0..dim {
            let ir = sym_index(ii, ij, dim);
            for ik in 0..dim {
                for il in 0..dim {
                    let ic = sym_index(ik, il, dim);
                    cat[(ii, ik)] += mtx_d[(ir, ic)] * direction[ij] * direction[il];
                }
            }
        }
    }

    Ok(cat)
}
