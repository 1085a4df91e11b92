//! Band-gap scan over the frequency axis.
//!
//! The valid resonance frequencies, bracketed by two margin frequencies, split
//! the axis into intervals. On each interval the extreme eigenvalues of the
//! effective mass tensor are sampled, and where they change sign the crossing
//! is located with [`find_zero`]. The boundary outcomes of the smallest and
//! largest eigenvalue classify the interval (see [`crate::gaps`]).
//!
//! ## Parallelization
//!
//! When the `parallel` feature is enabled, intervals are scanned concurrently
//! using Rayon. Output order always follows the frequency axis.

use log::{debug, info, warn};
use nalgebra::DMatrix;
use serde::Serialize;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::callback::{CallbackMode, EigenProblemCallback, TraceSample};
use crate::config::{BandGapOptions, ResolvedOptions};
use crate::density::{compute_density_volume_info, DensityVolumeInfo};
use crate::eigenmomenta::{prepare_eigenmomenta, EigenmomentaSet};
use crate::error::{BandGapError, Result};
use crate::gaps::{describe_gaps, Gap, GapKind, GapSegment};
use crate::problem::CellProblem;
use crate::root::{find_zero, BoundaryFlag, BoundaryOutcome};
use crate::tensor::{AcousticMassTensor, AppliedLoadTensor, EffectiveTensor};
use crate::types::{
    EigenMethod, TrackedEigenvalue, DEFAULT_FEPS, DEFAULT_FREQ_STEP_PERCENT, DEFAULT_ZEPS,
    MAX_TRACE_SAMPLES, MIN_TRACE_SAMPLES, MIN_TRACE_SPAN,
};

/// Resonance frequencies at the successive setup stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreqInfo {
    /// Square roots of the eigenvalues in the selected range.
    pub freq_range_initial: Vec<f64>,
    /// `freq_range_initial` without masked resonances.
    pub freq_range: Vec<f64>,
    /// `freq_range` with the lower and upper margin frequency added.
    pub freq_range_margins: Vec<f64>,
}

/// Everything computed before the interval scan.
#[derive(Debug, Clone)]
pub struct BandGapSetup {
    pub dv_info: DensityVolumeInfo,
    pub eigenmomenta: EigenmomentaSet,
    pub eig_range: (usize, usize),
    pub freq_info: FreqInfo,
}

impl BandGapSetup {
    /// Effective mass tensor over the valid resonances.
    pub fn mass_tensor(&self, eigs: &[f64]) -> Result<AcousticMassTensor> {
        let valid = self.eigenmomenta.valid_indices();
        AcousticMassTensor::new(
            self.eigenmomenta.weighted.select_rows(valid.iter()),
            valid.iter().map(|&i| eigs[i]).collect(),
            &self.dv_info,
        )
    }

    /// Applied-load tensor over the valid resonances, if unweighted
    /// eigenmomenta were computed.
    pub fn load_tensor(&self, eigs: &[f64]) -> Result<Option<AppliedLoadTensor>> {
        let Some(unweighted) = &self.eigenmomenta.unweighted else {
            return Ok(None);
        };
        let valid = self.eigenmomenta.valid_indices();
        AppliedLoadTensor::new(
            self.eigenmomenta.weighted.select_rows(valid.iter()),
            unweighted.select_rows(valid.iter()),
            valid.iter().map(|&i| eigs[i]).collect(),
            &self.dv_info,
        )
        .map(Some)
    }
}

/// Tolerances and step of the interval scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSettings {
    pub feps: f64,
    pub zeps: f64,
    /// Sampling step as a fraction of the full range.
    pub freq_step: f64,
    pub method: EigenMethod,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            feps: DEFAULT_FEPS,
            zeps: DEFAULT_ZEPS,
            freq_step: 0.01 * DEFAULT_FREQ_STEP_PERCENT,
            method: EigenMethod::default(),
        }
    }
}

impl From<&ResolvedOptions> for ScanSettings {
    fn from(opts: &ResolvedOptions) -> Self {
        Self {
            feps: opts.feps,
            zeps: opts.zeps,
            freq_step: opts.freq_step,
            method: opts.method,
        }
    }
}

/// Sampled extreme eigenvalues of one interval, ascending in frequency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalLog {
    pub samples: Vec<TraceSample>,
    /// Zero searches run on the interval (0 when a shortcut applied).
    pub root_searches: usize,
}

/// Result of a band-gap detection run.
#[derive(Debug, Clone, Serialize)]
pub struct BandReport {
    pub logs: Vec<IntervalLog>,
    pub gaps: Vec<Gap>,
    pub kinds: Vec<GapKind>,
    /// Validity of every eigenmode (not only those in `eig_range`).
    pub valid: Vec<bool>,
    pub eig_range: (usize, usize),
    pub n_eigs: usize,
    /// Number of invalid modes.
    pub n_zeroed: usize,
    /// No resonance in the range survived masking.
    pub all_masked: bool,
    pub freq_range_initial: Vec<f64>,
    pub freq_range: Vec<f64>,
    pub freq_range_margins: Vec<f64>,
    pub dv_info: DensityVolumeInfo,
    /// Masked density-weighted eigenmomenta, one row per mode.
    pub eigenmomenta: Vec<Vec<f64>>,
    /// Masked unit-density eigenmomenta, present with the `unweighted` option.
    pub unweighted_eigenmomenta: Option<Vec<Vec<f64>>>,
    pub options: ResolvedOptions,
}

fn matrix_rows(mtx: &DMatrix<f64>) -> Vec<Vec<f64>> {
    mtx.row_iter().map(|row| row.iter().copied().collect()).collect()
}

impl BandReport {
    /// `true` when every resonance in the range was masked.
    pub fn all_masked(&self) -> bool {
        self.all_masked
    }

    /// Applied-load tensor over the valid resonances, if unweighted
    /// eigenmomenta were computed. `eigs` are the eigenvalues of the run.
    pub fn load_tensor(&self, eigs: &[f64]) -> Result<Option<AppliedLoadTensor>> {
        let Some(unweighted) = &self.unweighted_eigenmomenta else {
            return Ok(None);
        };
        if eigs.len() != self.n_eigs {
            return Err(BandGapError::ShapeMismatch(format!(
                "{} eigenvalues for a report over {} modes",
                eigs.len(),
                self.n_eigs
            )));
        }
        let valid: Vec<usize> = (0..self.n_eigs).filter(|&i| self.valid[i]).collect();
        let dim = self.eigenmomenta.first().map_or(0, Vec::len);
        let pick = |rows: &[Vec<f64>]| DMatrix::from_fn(valid.len(), dim, |i, j| rows[valid[i]][j]);
        AppliedLoadTensor::new(
            pick(&self.eigenmomenta),
            pick(unweighted),
            valid.iter().map(|&i| eigs[i]).collect(),
            &self.dv_info,
        )
        .map(Some)
    }

    /// Zone segments of every interval.
    pub fn segments(&self) -> Vec<Vec<GapSegment>> {
        self.freq_range_margins
            .windows(2)
            .zip(self.gaps.iter().zip(&self.kinds))
            .map(|(w, (gap, kind))| kind.segments(w[0], w[1], gap))
            .collect()
    }

    /// Smallest and largest sampled eigenvalue, at least `MIN_TRACE_SPAN` apart.
    pub fn trace_bounds(&self) -> Option<(f64, f64)> {
        let mut samples = self.logs.iter().flat_map(|log| log.samples.iter()).peekable();
        samples.peek()?;
        let (dmin, dmax) = samples.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.min_eig).min(s.max_eig), hi.max(s.min_eig).max(s.max_eig))
        });
        Some(((dmax - MIN_TRACE_SPAN).min(dmin), (dmin + MIN_TRACE_SPAN).max(dmax)))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Remove masked resonance frequencies and add the margin frequencies.
///
/// Without a fixed range the margins are fractions of the unmasked range and
/// are clipped to stay inside the neighboring resonances outside `eig_range`.
/// Both margins are floored at `feps`. Returns `(freq_range, freq_range_margins)`.
pub fn cut_freq_range(
    freq_range: &[f64],
    eigs: &[f64],
    valid: &[bool],
    freq_margins: (f64, f64),
    eig_range: (usize, usize),
    fixed_freq_range: Option<(f64, f64)>,
    feps: f64,
) -> Result<(Vec<f64>, Vec<f64>)> {
    let (start, end) = eig_range;
    if end > eigs.len() || end > valid.len() || start >= end || freq_range.len() != end - start {
        return Err(BandGapError::ShapeMismatch(format!(
            "{} resonance frequencies for eigenvalue range ({start}, {end}) of {} eigenvalues",
            freq_range.len(),
            eigs.len()
        )));
    }
    let valid_slice = &valid[start..end];

    let masked: Vec<usize> = valid_slice
        .iter()
        .enumerate()
        .filter(|(_, v)| !**v)
        .map(|(i, _)| i)
        .collect();
    debug!("masked resonance frequencies in range: {masked:?}");

    let (prev_eig, next_eig) = match fixed_freq_range {
        Some(range) => range,
        None => {
            let (min_freq, max_freq) = (freq_range[0], freq_range[freq_range.len() - 1]);
            let span = max_freq - min_freq;
            let mut prev_eig = min_freq - freq_margins.0 * span;
            let mut next_eig = max_freq + freq_margins.1 * span;
            if start > 0 {
                prev_eig = prev_eig.max(eigs[start - 1].sqrt() + feps);
            }
            if end < eigs.len() {
                next_eig = next_eig.min(eigs[end].sqrt() - feps);
            }
            let prev_eig = prev_eig.max(feps);
            let next_eig = next_eig.max(feps).max(prev_eig + feps);
            (prev_eig, next_eig)
        }
    };

    let freq_range: Vec<f64> = freq_range
        .iter()
        .zip(valid_slice)
        .filter(|(_, &v)| v)
        .map(|(&f, _)| f)
        .collect();

    let mut freq_range_margins = Vec::with_capacity(freq_range.len() + 2);
    freq_range_margins.push(prev_eig);
    freq_range_margins.extend_from_slice(&freq_range);
    freq_range_margins.push(next_eig);

    Ok((freq_range, freq_range_margins))
}

/// Eigenvalue index range `[start, end)` of the eigenvalues inside `]fmin, fmax[`.
fn eig_range_in(eigs: &[f64], fmin: f64, fmax: f64) -> Result<(usize, usize)> {
    let (lo, hi) = (fmin * fmin, fmax * fmax);
    let inside: Vec<usize> = eigs
        .iter()
        .enumerate()
        .filter(|(_, &e)| e > lo && e < hi)
        .map(|(i, _)| i)
        .collect();
    match (inside.first(), inside.last()) {
        (Some(&first), Some(&last)) => Ok((first, last + 1)),
        _ => Err(BandGapError::EmptyFrequencyRange { fmin, fmax }),
    }
}

/// Compute density/volume info and masked eigenmomenta, and set up the
/// resonance frequency ranges.
pub fn setup_band_gaps<P: CellProblem + ?Sized>(
    problem: &P,
    eigs: &[f64],
    eig_vectors: &DMatrix<f64>,
    opts: &ResolvedOptions,
) -> Result<BandGapSetup> {
    if eig_vectors.ncols() != eigs.len() {
        return Err(BandGapError::ShapeMismatch(format!(
            "{} eigenvectors for {} eigenvalues",
            eig_vectors.ncols(),
            eigs.len()
        )));
    }

    let dv_info = compute_density_volume_info(problem, &opts.volume, &opts.region_to_material)?;
    info!("average density: {}", dv_info.average_density);

    let eig_range = match opts.fixed_freq_range {
        Some((fmin, fmax)) => eig_range_in(eigs, fmin, fmax)?,
        None => opts.eig_range,
    };
    let freq_range_initial: Vec<f64> = eigs[eig_range.0..eig_range.1]
        .iter()
        .map(|e| e.sqrt())
        .collect();
    info!(
        "initial freq. range     : [{:8.3}, {:8.3}]",
        freq_range_initial[0],
        freq_range_initial[freq_range_initial.len() - 1]
    );

    let eigenmomenta = prepare_eigenmomenta(
        problem,
        &opts.eigenmomentum,
        &opts.region_to_material,
        eig_vectors,
        opts.teps,
        opts.teps_rel,
        opts.unweighted,
        opts.eig_vector_transform.as_ref(),
    )?;

    let (freq_range, freq_range_margins) = cut_freq_range(
        &freq_range_initial,
        eigs,
        &eigenmomenta.valid,
        opts.freq_margins,
        eig_range,
        opts.fixed_freq_range,
        opts.feps,
    )?;
    match (freq_range.first(), freq_range.last()) {
        (Some(lo), Some(hi)) => info!("freq. range             : [{lo:8.3}, {hi:8.3}]"),
        _ => warn!("freq. range             : all masked!"),
    }

    Ok(BandGapSetup {
        dv_info,
        eigenmomenta,
        eig_range,
        freq_info: FreqInfo {
            freq_range_initial,
            freq_range,
            freq_range_margins,
        },
    })
}

/// Number of trace samples for an interval of width `f1 - f0` and step `df`.
pub fn sample_count(f0: f64, f1: f64, df: f64) -> usize {
    (((f1 - f0) / df).floor() as usize).clamp(MIN_TRACE_SAMPLES, MAX_TRACE_SAMPLES)
}

fn linspace(a: f64, b: f64, num: usize) -> impl Iterator<Item = f64> {
    let step = (b - a) / (num - 1) as f64;
    (0..num).map(move |i| if i + 1 == num { b } else { a + step * i as f64 })
}

fn insert_sorted(log: &mut Vec<TraceSample>, sample: TraceSample) {
    let at = log.partition_point(|s| s.freq < sample.freq);
    log.insert(at, sample);
}

/// Sample, search, and classify the boundaries of `]f0, f1[`.
pub fn scan_interval<T: EffectiveTensor + ?Sized>(
    f0: f64,
    f1: f64,
    df: f64,
    probe: &EigenProblemCallback<'_, T>,
    tracer: &EigenProblemCallback<'_, T>,
    settings: &ScanSettings,
) -> Result<(IntervalLog, Gap)> {
    let feps = settings.feps;
    let sample = |f: f64| -> Result<TraceSample> { tracer.call(f)?.sample(f) };
    let num = sample_count(f0, f1, df);
    let mut samples = linspace(f0 + feps, f1 - feps, num)
        .map(&sample)
        .collect::<Result<Vec<_>>>()?;

    let (first, last) = (samples[0], samples[samples.len() - 1]);
    if first.min_eig > 0.0 {
        // No gaps.
        let gap = Gap {
            min: BoundaryOutcome::new(BoundaryFlag::Left, f0, first.min_eig),
            max: BoundaryOutcome::new(BoundaryFlag::Left, f0, first.max_eig),
        };
        return Ok((IntervalLog { samples, root_searches: 0 }, gap));
    }
    if last.max_eig < 0.0 {
        // Full interval strong gap.
        let gap = Gap {
            min: BoundaryOutcome::new(BoundaryFlag::Right, f1, last.min_eig),
            max: BoundaryOutcome::new(BoundaryFlag::Right, f1, last.max_eig),
        };
        return Ok((IntervalLog { samples, root_searches: 0 }, gap));
    }

    // Spliced samples stay feps inside the interval, off the resonance poles.
    let splice_at = |f: f64| f.clamp(f0 + feps, f1 - feps);
    let search = |mode| find_zero(f0, f1, |f| probe.call(f)?.into_spectrum(), feps, settings.zeps, mode);

    debug!("finding zero of the largest eig...");
    let max = search(TrackedEigenvalue::Largest)?;
    insert_sorted(&mut samples, sample(splice_at(max.freq))?);

    let (min, root_searches) = if max.flag == BoundaryFlag::Right {
        // Both extremes are negative everywhere.
        (BoundaryOutcome::new(BoundaryFlag::Right, max.freq, max.eigenvalue), 1)
    } else {
        debug!("finding zero of the smallest eig...");
        let min = search(TrackedEigenvalue::Smallest)?;
        insert_sorted(&mut samples, sample(splice_at(min.freq))?);
        (min, 2)
    };

    Ok((IntervalLog { samples, root_searches }, Gap { min, max }))
}

type IntervalScan = (IntervalLog, Gap);

fn scan_one<T: EffectiveTensor + ?Sized>(
    ii: usize,
    (f0, f1): (f64, f64),
    df: f64,
    probe: &EigenProblemCallback<'_, T>,
    tracer: &EigenProblemCallback<'_, T>,
    settings: &ScanSettings,
) -> Result<IntervalScan> {
    debug!("interval {ii}: ]{f0:.8}, {f1:.8}[...");
    let scan = scan_interval(f0, f1, df, probe, tracer, settings)?;
    debug!("interval {ii}: min {:?}, max {:?}", scan.1.min, scan.1.max);
    Ok(scan)
}

/// Sequential scan of all intervals.
#[cfg(not(feature = "parallel"))]
fn scan_intervals<T: EffectiveTensor + Sync + ?Sized>(
    intervals: &[(f64, f64)],
    df: f64,
    probe: &EigenProblemCallback<'_, T>,
    tracer: &EigenProblemCallback<'_, T>,
    settings: &ScanSettings,
) -> Result<Vec<IntervalScan>> {
    intervals
        .iter()
        .enumerate()
        .map(|(ii, &interval)| scan_one(ii, interval, df, probe, tracer, settings))
        .collect()
}

/// Parallel scan of all intervals using Rayon.
#[cfg(feature = "parallel")]
fn scan_intervals<T: EffectiveTensor + Sync + ?Sized>(
    intervals: &[(f64, f64)],
    df: f64,
    probe: &EigenProblemCallback<'_, T>,
    tracer: &EigenProblemCallback<'_, T>,
    settings: &ScanSettings,
) -> Result<Vec<IntervalScan>> {
    intervals
        .par_iter()
        .enumerate()
        .map(|(ii, &interval)| scan_one(ii, interval, df, probe, tracer, settings))
        .collect()
}

/// Scan every interval between consecutive frequencies of `freq_range_margins`.
pub fn scan_band_gaps<T: EffectiveTensor + Sync + ?Sized>(
    tensor: &T,
    freq_range_margins: &[f64],
    settings: &ScanSettings,
    christoffel: Option<&DMatrix<f64>>,
) -> Result<(Vec<IntervalLog>, Vec<Gap>)> {
    if freq_range_margins.len() < 2 {
        return Err(BandGapError::ShapeMismatch(format!(
            "need at least two boundary frequencies, got {}",
            freq_range_margins.len()
        )));
    }
    let (min_freq, max_freq) = (freq_range_margins[0], freq_range_margins[freq_range_margins.len() - 1]);
    info!("freq. range with margins: [{min_freq:8.3}, {max_freq:8.3}]");

    let df = settings.freq_step * (max_freq - min_freq);
    let probe = EigenProblemCallback::new(tensor, settings.method, christoffel, CallbackMode::FindZero);
    let tracer = EigenProblemCallback::new(tensor, settings.method, christoffel, CallbackMode::Trace);

    let intervals: Vec<(f64, f64)> = freq_range_margins.windows(2).map(|w| (w[0], w[1])).collect();
    let scans = scan_intervals(&intervals, df, &probe, &tracer, settings)?;
    Ok(scans.into_iter().unzip())
}

/// Detect band gaps from the cell eigenvalues `eigs` (ascending) and
/// eigenvectors (columns of `eig_vectors`).
///
/// Only valid resonances (eigenmomentum above the threshold) bound intervals
/// and enter the effective mass tensor. With a Christoffel tensor the scanned
/// spectrum is that of `ω² M*(ω) w = η Γ w`.
pub fn detect_band_gaps<P: CellProblem + ?Sized>(
    problem: &P,
    eigs: &[f64],
    eig_vectors: &DMatrix<f64>,
    options: &BandGapOptions,
    christoffel: Option<&DMatrix<f64>>,
) -> Result<BandReport> {
    let opts = options.resolve(eigs.len())?;
    info!("method: {:?}", opts.method);

    let setup = setup_band_gaps(problem, eigs, eig_vectors, &opts)?;
    let mass = setup.mass_tensor(eigs)?;

    let settings = ScanSettings::from(&opts);
    let (logs, gaps) = scan_band_gaps(&mass, &setup.freq_info.freq_range_margins, &settings, christoffel)?;
    let kinds = describe_gaps(&gaps)?;
    for (ii, kind) in kinds.iter().enumerate() {
        debug!("interval {ii} -> {kind}");
    }

    let FreqInfo {
        freq_range_initial,
        freq_range,
        freq_range_margins,
    } = setup.freq_info;
    let eigenmomenta = setup.eigenmomenta;

    Ok(BandReport {
        logs,
        gaps,
        kinds,
        eigenmomenta: matrix_rows(&eigenmomenta.weighted),
        unweighted_eigenmomenta: eigenmomenta.unweighted.as_ref().map(matrix_rows),
        valid: eigenmomenta.valid,
        eig_range: setup.eig_range,
        n_eigs: eigs.len(),
        n_zeroed: eigenmomenta.n_zeroed,
        all_masked: freq_range.is_empty(),
        freq_range_initial,
        freq_range,
        freq_range_margins,
        dv_info: setup.dv_info,
        options: opts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Tensor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TOL: f64 = 1e-12;

    /// `value - slope·f` on the diagonal; counts evaluations.
    struct CountingTensor {
        values: Vec<f64>,
        slope: f64,
        evaluations: AtomicUsize,
    }

    impl CountingTensor {
        fn new(values: Vec<f64>, slope: f64) -> Self {
            Self {
                values,
                slope,
                evaluations: AtomicUsize::new(0),
            }
        }
    }

    impl EffectiveTensor for CountingTensor {
        fn dim(&self) -> usize {
            self.values.len()
        }

        fn evaluate(&self, freq: f64) -> Tensor {
            self.evaluations.fetch_add(1, Ordering::Relaxed);
            let n = self.values.len();
            DMatrix::from_fn(n, n, |i, j| {
                if i == j {
                    self.values[i] - self.slope * freq
                } else {
                    0.0
                }
            })
        }
    }

    #[test]
    fn positive_interval_takes_propagation_shortcut() {
        let tensor = CountingTensor::new(vec![2.0, 3.0], 0.0);
        let settings = ScanSettings::default();
        let (logs, gaps) = scan_band_gaps(&tensor, &[1.0, 2.0], &settings, None).unwrap();

        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].root_searches, 0);
        assert_eq!(logs[0].samples.len(), MIN_TRACE_SAMPLES);
        assert_eq!(tensor.evaluations.load(Ordering::Relaxed), MIN_TRACE_SAMPLES);
        assert_eq!(gaps[0].min.flag, BoundaryFlag::Left);
        assert_eq!(gaps[0].min.freq, 1.0);
        assert_eq!(describe_gaps(&gaps).unwrap(), vec![GapKind::Propagation]);
    }

    #[test]
    fn negative_interval_takes_strong_shortcut() {
        let tensor = CountingTensor::new(vec![-1.0, -0.5], 0.0);
        let (logs, gaps) = scan_band_gaps(&tensor, &[1.0, 2.0], &ScanSettings::default(), None).unwrap();
        assert_eq!(logs[0].root_searches, 0);
        assert_eq!(gaps[0].max.flag, BoundaryFlag::Right);
        assert_eq!(gaps[0].max.freq, 2.0);
        assert_eq!(describe_gaps(&gaps).unwrap(), vec![GapKind::Strong]);
    }

    #[test]
    fn crossing_is_found_and_spliced_into_log() {
        // Eigenvalues f - 1.5 (largest) and f - 1.75.
        let tensor = CountingTensor::new(vec![-1.5, -1.75], -1.0);
        let (logs, gaps) = scan_band_gaps(&tensor, &[1.0, 2.0], &ScanSettings::default(), None).unwrap();

        let gap = gaps[0];
        assert_eq!(gap.max.flag, BoundaryFlag::Zero);
        assert_eq!(gap.min.flag, BoundaryFlag::Zero);
        assert!((gap.max.freq - 1.5).abs() < 1e-8);
        assert!((gap.min.freq - 1.75).abs() < 1e-8);

        let log = &logs[0];
        assert_eq!(log.root_searches, 2);
        assert_eq!(log.samples.len(), MIN_TRACE_SAMPLES + 2);
        assert!(log.samples.windows(2).all(|w| w[0].freq <= w[1].freq));
        assert_eq!(describe_gaps(&gaps).unwrap(), vec![GapKind::StrongWeakPropagation]);
    }

    /// Smallest eigenvalue -2; largest -1 except +1 at the last trace sample.
    struct Spike {
        at: f64,
    }

    impl EffectiveTensor for Spike {
        fn dim(&self) -> usize {
            2
        }

        fn evaluate(&self, freq: f64) -> Tensor {
            let top = if (freq - self.at).abs() < 1e-12 { 1.0 } else { -1.0 };
            DMatrix::from_row_slice(2, 2, &[-2.0, 0.0, 0.0, top])
        }
    }

    #[test]
    fn negative_largest_skips_second_search() {
        let settings = ScanSettings::default();
        let tensor = Spike { at: 2.0 - settings.feps };
        let (logs, gaps) = scan_band_gaps(&tensor, &[1.0, 2.0], &settings, None).unwrap();

        assert_eq!(logs[0].root_searches, 1);
        assert_eq!(logs[0].samples.len(), MIN_TRACE_SAMPLES + 1);
        assert_eq!(gaps[0].max.flag, BoundaryFlag::Right);
        assert_eq!(gaps[0].min, BoundaryOutcome::new(BoundaryFlag::Right, 2.0, gaps[0].max.eigenvalue));
        assert_eq!(describe_gaps(&gaps).unwrap(), vec![GapKind::Strong]);
    }

    #[test]
    fn margins_follow_fractions_of_range() {
        let eigs = [1.0, 4.0, 9.0];
        let freqs = [1.0, 2.0, 3.0];
        let valid = [true, true, true];
        let (range, margins) =
            cut_freq_range(&freqs, &eigs, &valid, (0.05, 0.1), (0, 3), None, 1e-8).unwrap();
        assert_eq!(range, vec![1.0, 2.0, 3.0]);
        assert!((margins[0] - 0.9).abs() < TOL);
        assert!((margins[4] - 3.2).abs() < TOL);
    }

    #[test]
    fn margins_stay_inside_neighboring_resonances() {
        let eigs = [1.0, 4.0, 9.0, 16.0];
        let freqs = [2.0, 3.0];
        let valid = [true; 4];
        let (_, margins) =
            cut_freq_range(&freqs, &eigs, &valid, (2.0, 2.0), (1, 3), None, 1e-8).unwrap();
        assert!((margins[0] - (1.0 + 1e-8)).abs() < TOL);
        assert!((margins[3] - (4.0 - 1e-8)).abs() < TOL);
    }

    #[test]
    fn masked_resonances_are_removed_but_margins_kept() {
        let eigs = [1.0, 4.0, 9.0];
        let freqs = [1.0, 2.0, 3.0];
        let valid = [true, false, true];
        let (range, margins) =
            cut_freq_range(&freqs, &eigs, &valid, (0.05, 0.05), (0, 3), None, 1e-8).unwrap();
        assert_eq!(range, vec![1.0, 3.0]);
        assert_eq!(margins.len(), 4);
        assert!((margins[0] - 0.9).abs() < TOL);
        assert!((margins[3] - 3.1).abs() < TOL);
    }

    #[test]
    fn fixed_range_replaces_margins_and_floor_applies() {
        let eigs = [1.0, 4.0];
        let freqs = [1.0, 2.0];
        let valid = [true, true];
        let (_, margins) =
            cut_freq_range(&freqs, &eigs, &valid, (0.0, 0.0), (0, 2), Some((0.5, 2.5)), 1e-8).unwrap();
        assert_eq!(margins, vec![0.5, 1.0, 2.0, 2.5]);

        let (_, margins) =
            cut_freq_range(&freqs, &eigs, &valid, (5.0, 0.0), (0, 2), None, 1e-8).unwrap();
        assert_eq!(margins[0], 1e-8);
    }

    #[test]
    fn sample_count_is_clamped() {
        assert_eq!(sample_count(0.0, 1.0, 0.5), MIN_TRACE_SAMPLES);
        assert_eq!(sample_count(0.0, 1.0, 0.02), 50);
        assert_eq!(sample_count(0.0, 1.0, 1e-6), MAX_TRACE_SAMPLES);
        assert_eq!(sample_count(0.0, 1.0, 0.0), MAX_TRACE_SAMPLES);
    }

    #[test]
    fn fixed_frequency_range_selects_enclosed_eigenvalues() {
        let eigs = [1.0, 4.0, 9.0, 16.0, 25.0];
        assert_eq!(eig_range_in(&eigs, 1.5, 4.5).unwrap(), (1, 4));
        assert!(matches!(
            eig_range_in(&eigs, 1.1, 1.2),
            Err(BandGapError::EmptyFrequencyRange { .. })
        ));
    }
}
