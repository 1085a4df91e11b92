//! Eigenvalue problems posed on an effective tensor at a given frequency.
//!
//! Without a Christoffel tensor the problem is `T(f) w = λ w`; with one it is
//! `f² T(f) w = η Γ w`. The callback kind is fixed at construction:
//!
//! - [`CallbackKind::RootProbe`] returns the spectrum, for [`crate::root::find_zero`];
//! - [`CallbackKind::Trace`] returns `(f, λ_min, λ_max)` samples;
//! - [`CallbackKind::FullTrace`] returns the full decomposition with
//!   eigenvectors. It replaces `Trace` whenever a Christoffel tensor is given.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{BandGapError, Result};
use crate::solver::{eig, EigenDecomposition};
use crate::tensor::EffectiveTensor;
use crate::types::{EigenMethod, Spectrum};

/// What the caller intends to do with the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackMode {
    FindZero,
    Trace,
}

/// The callback variant selected from the mode and the Christoffel tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    RootProbe,
    Trace,
    FullTrace,
}

/// One sample of the extreme eigenvalues.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceSample {
    pub freq: f64,
    pub min_eig: f64,
    pub max_eig: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutput {
    Spectrum(Spectrum),
    Trace(TraceSample),
    Full {
        freq: f64,
        decomposition: EigenDecomposition,
    },
}

fn extremes(freq: f64, values: &Spectrum) -> Result<TraceSample> {
    match (values.iter().next(), values.iter().last()) {
        (Some(&min_eig), Some(&max_eig)) => Ok(TraceSample {
            freq,
            min_eig,
            max_eig,
        }),
        _ => Err(BandGapError::Eigen(format!("empty spectrum at f = {freq}"))),
    }
}

impl CallbackOutput {
    /// Smallest and largest eigenvalue carried by the output.
    pub fn sample(&self, freq: f64) -> Result<TraceSample> {
        match self {
            CallbackOutput::Spectrum(values) => extremes(freq, values),
            CallbackOutput::Trace(sample) => Ok(*sample),
            CallbackOutput::Full { freq, decomposition } => extremes(*freq, &decomposition.eigenvalues),
        }
    }

    /// Ascending eigenvalues; a trace output only carries the extremes.
    pub fn into_spectrum(self) -> Result<Spectrum> {
        match self {
            CallbackOutput::Spectrum(values) => Ok(values),
            CallbackOutput::Full { decomposition, .. } => Ok(decomposition.eigenvalues),
            CallbackOutput::Trace(sample) => Err(BandGapError::Eigen(format!(
                "trace output at f = {} carries no spectrum",
                sample.freq
            ))),
        }
    }
}

pub struct EigenProblemCallback<'a, T: EffectiveTensor + ?Sized> {
    tensor: &'a T,
    method: EigenMethod,
    christoffel: Option<&'a DMatrix<f64>>,
    kind: CallbackKind,
}

impl<'a, T: EffectiveTensor + ?Sized> EigenProblemCallback<'a, T> {
    pub fn new(
        tensor: &'a T,
        method: EigenMethod,
        christoffel: Option<&'a DMatrix<f64>>,
        mode: CallbackMode,
    ) -> Self {
        let kind = match (mode, christoffel.is_some()) {
            (CallbackMode::FindZero, _) => CallbackKind::RootProbe,
            (CallbackMode::Trace, false) => CallbackKind::Trace,
            (CallbackMode::Trace, true) => CallbackKind::FullTrace,
        };
        Self {
            tensor,
            method,
            christoffel,
            kind,
        }
    }

    pub fn kind(&self) -> CallbackKind {
        self.kind
    }

    fn solve(&self, freq: f64, eigenvectors: bool) -> Result<EigenDecomposition> {
        let value = self.tensor.evaluate(freq);
        match self.christoffel {
            Some(gamma) => eig(&(value * (freq * freq)), Some(gamma), eigenvectors, self.method),
            None => eig(&value, None, eigenvectors, self.method),
        }
    }

    /// Ascending eigenvalues at `freq`.
    pub fn spectrum(&self, freq: f64) -> Result<Spectrum> {
        Ok(self.solve(freq, false)?.eigenvalues)
    }

    /// Smallest and largest eigenvalue at `freq`.
    pub fn trace(&self, freq: f64) -> Result<TraceSample> {
        extremes(freq, &self.spectrum(freq)?)
    }

    /// Full decomposition, eigenvectors included.
    pub fn full_trace(&self, freq: f64) -> Result<EigenDecomposition> {
        self.solve(freq, true)
    }

    /// Evaluate according to the callback kind.
    pub fn call(&self, freq: f64) -> Result<CallbackOutput> {
        Ok(match self.kind {
            CallbackKind::RootProbe => CallbackOutput::Spectrum(self.spectrum(freq)?),
            CallbackKind::Trace => CallbackOutput::Trace(self.trace(freq)?),
            CallbackKind::FullTrace => CallbackOutput::Full {
                freq,
                decomposition: self.full_trace(freq)?,
            },
        })
    }
}
