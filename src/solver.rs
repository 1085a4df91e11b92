//! Dense eigenvalue solvers for the small effective-tensor problems.
//!
//! All solvers return eigenvalues sorted ascending, so the smallest eigenvalue
//! is at index 0 and the largest at the last index. Eigenvectors, when
//! requested, are the matching columns.

use nalgebra::linalg::{SymmetricEigen, SVD};
use nalgebra::{DMatrix, DVector};

use crate::error::{BandGapError, Result};
use crate::types::{EigenMethod, Spectrum};

/// Eigenvalues (ascending) and optional eigenvectors (columns).
#[derive(Debug, Clone, PartialEq)]
pub struct EigenDecomposition {
    pub eigenvalues: Spectrum,
    pub eigenvectors: Option<DMatrix<f64>>,
}

fn check_square(name: &str, mtx: &DMatrix<f64>) -> Result<()> {
    if !mtx.is_square() || mtx.nrows() == 0 {
        return Err(BandGapError::ShapeMismatch(format!(
            "{name} must be a non-empty square matrix, got {:?}",
            mtx.shape()
        )));
    }
    Ok(())
}

/// Sort eigenpairs ascending by eigenvalue.
fn sort_pairs(values: DVector<f64>, vectors: Option<DMatrix<f64>>) -> EigenDecomposition {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let eigenvalues = DVector::from_iterator(values.len(), order.iter().map(|&i| values[i]));
    let eigenvectors = vectors.map(|v| {
        let mut sorted = DMatrix::zeros(v.nrows(), order.len());
        for (dst, &src) in order.iter().enumerate() {
            sorted.set_column(dst, &v.column(src));
        }
        sorted
    });

    EigenDecomposition {
        eigenvalues,
        eigenvectors,
    }
}

/// Symmetric eigenproblem `A w = λ w`. `A` is symmetrized first.
fn symmetric_eig(mtx_a: &DMatrix<f64>, eigenvectors: bool) -> EigenDecomposition {
    let sym = 0.5 * (mtx_a + mtx_a.transpose());
    if eigenvectors {
        let eig = SymmetricEigen::new(sym);
        sort_pairs(eig.eigenvalues, Some(eig.eigenvectors))
    } else {
        sort_pairs(sym.symmetric_eigenvalues(), None)
    }
}

/// Null vector of `A − λ I` from the smallest singular value.
fn null_vector(mtx_a: &DMatrix<f64>, lambda: f64) -> Result<DVector<f64>> {
    let n = mtx_a.nrows();
    let shifted = mtx_a - DMatrix::identity(n, n) * lambda;
    let svd = SVD::new(shifted, false, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| BandGapError::Eigen("SVD did not produce right singular vectors".into()))?;
    let imin = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let w = v_t.row(imin).transpose();
    let norm = w.norm();
    Ok(if norm > 0.0 { w / norm } else { w })
}

/// General real eigenproblem `A w = λ w`; fails on a complex spectrum.
fn general_eig(mtx_a: &DMatrix<f64>, eigenvectors: bool) -> Result<EigenDecomposition> {
    let values = mtx_a
        .eigenvalues()
        .ok_or_else(|| BandGapError::Eigen("matrix has complex eigenvalues".into()))?;

    let vectors = if eigenvectors {
        let mut vectors = DMatrix::zeros(mtx_a.nrows(), values.len());
        for (i, &lambda) in values.iter().enumerate() {
            vectors.set_column(i, &null_vector(mtx_a, lambda)?);
        }
        Some(vectors)
    } else {
        None
    };

    Ok(sort_pairs(values, vectors))
}

/// Solve `A w = λ w`, or the generalized `A w = λ B w` when `mtx_b` is given.
///
/// The symmetric generalized problem needs `B` positive definite and is reduced
/// to standard form through the Cholesky factor of `B`; the general one solves
/// `B⁻¹ A`.
pub fn eig(
    mtx_a: &DMatrix<f64>,
    mtx_b: Option<&DMatrix<f64>>,
    eigenvectors: bool,
    method: EigenMethod,
) -> Result<EigenDecomposition> {
    check_square("A", mtx_a)?;

    let Some(mtx_b) = mtx_b else {
        return match method {
            EigenMethod::Symmetric => Ok(symmetric_eig(mtx_a, eigenvectors)),
            EigenMethod::General => general_eig(mtx_a, eigenvectors),
        };
    };

    check_square("B", mtx_b)?;
    if mtx_b.nrows() != mtx_a.nrows() {
        return Err(BandGapError::ShapeMismatch(format!(
            "A is {:?} but B is {:?}",
            mtx_a.shape(),
            mtx_b.shape()
        )));
    }

    match method {
        EigenMethod::Symmetric => {
            let chol = mtx_b
                .clone()
                .cholesky()
                .ok_or_else(|| BandGapError::Eigen("B is not positive definite".into()))?;
            let l_inv = chol
                .l()
                .try_inverse()
                .ok_or_else(|| BandGapError::Eigen("Cholesky factor of B is singular".into()))?;
            let reduced = &l_inv * mtx_a * l_inv.transpose();
            let mut out = symmetric_eig(&reduced, eigenvectors);
            // w = L^-T y
            out.eigenvectors = out.eigenvectors.map(|y| l_inv.transpose() * y);
            Ok(out)
        }
        EigenMethod::General => {
            let reduced = mtx_b
                .clone()
                .lu()
                .solve(mtx_a)
                .ok_or_else(|| BandGapError::Eigen("B is singular".into()))?;
            general_eig(&reduced, eigenvectors)
        }
    }
}
