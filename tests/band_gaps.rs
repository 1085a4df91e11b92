//! End-to-end band-gap detection on small cells with known resonances.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use phono_gaps::{
    detect_band_gaps, setup_band_gaps, AcousticMassTensor, BandGapOptions, BandReport, BoundaryFlag,
    CellProblem, EffectiveTensor, EigenmomentumSpec, GapKind, PrecomputedCell, PrecomputedRegion,
    RegionWeight, Result, TransformSpec, Zone,
};

const EIGS: [f64; 3] = [1.0, 4.0, 9.0];

fn spec() -> EigenmomentumSpec {
    EigenmomentumSpec {
        var: "u".into(),
        regions: vec!["Y".into()],
        term: "dw_volume_integrate.i.{region}(u)".into(),
    }
}

fn options() -> BandGapOptions {
    let mut map = BTreeMap::new();
    map.insert("Y".to_string(), "matrix".to_string());
    BandGapOptions::new(spec(), map, "d_volume.i.{region}(u)")
}

/// One region of unit volume and density with 1-D eigenmomenta `momenta`.
fn cell(momenta: &[f64]) -> PrecomputedCell {
    let mut regions = BTreeMap::new();
    regions.insert(
        "Y".to_string(),
        PrecomputedRegion {
            volume: 1.0,
            density: 1.0,
            integrals: momenta.iter().map(|&m| vec![m]).collect(),
        },
    );
    PrecomputedCell { dim: 1, regions }
}

fn run(cell: &PrecomputedCell, eigs: &[f64], options: &BandGapOptions) -> BandReport {
    let modes = DMatrix::zeros(0, eigs.len());
    detect_band_gaps(cell, eigs, &modes, options, None).unwrap()
}

fn assert_logs_sorted(report: &BandReport) {
    for (ii, log) in report.logs.iter().enumerate() {
        assert!(
            log.samples.windows(2).all(|w| w[0].freq <= w[1].freq),
            "log of interval {ii} is not sorted"
        );
    }
}

#[test]
fn three_resonances_classify_every_interval() {
    let report = run(&cell(&[0.5, 0.3, 0.4]), &EIGS, &options());

    let expected = [0.9, 1.0, 2.0, 3.0, 3.1];
    assert_eq!(report.freq_range_margins.len(), expected.len());
    for (got, want) in report.freq_range_margins.iter().zip(expected) {
        assert!((got - want).abs() < 1e-12, "{got} != {want}");
    }
    assert_eq!(report.freq_range, vec![1.0, 2.0, 3.0]);
    assert_eq!(report.eig_range, (0, 3));
    assert_eq!(report.n_zeroed, 0);

    assert_eq!(
        report.kinds,
        vec![
            GapKind::Propagation,
            GapKind::StrongWeakPropagation,
            GapKind::StrongWeakPropagation,
            GapKind::Strong,
        ]
    );
    assert_eq!(report.logs[0].root_searches, 0);
    assert_eq!(report.logs[1].root_searches, 2);
    assert_eq!(report.logs[3].root_searches, 0);
    assert_logs_sorted(&report);
}

#[test]
fn located_boundaries_are_zeros_of_the_mass_tensor() {
    let report = run(&cell(&[0.5, 0.3, 0.4]), &EIGS, &options());
    let dv = phono_gaps::DensityVolumeInfo::from_regions([("Y", 1.0, 1.0)]).unwrap();
    let mass = AcousticMassTensor::new(
        DMatrix::from_column_slice(3, 1, &[0.5, 0.3, 0.4]),
        EIGS.to_vec(),
        &dv,
    )
    .unwrap();

    for (ii, gap) in report.gaps.iter().enumerate().skip(1).take(2) {
        let (f0, f1) = (report.freq_range_margins[ii], report.freq_range_margins[ii + 1]);
        for outcome in [gap.min, gap.max] {
            assert_eq!(outcome.flag, BoundaryFlag::Zero);
            assert!(outcome.freq > f0 && outcome.freq < f1);
            assert!(outcome.eigenvalue.abs() < 1e-6);
            assert!(mass.evaluate(outcome.freq)[(0, 0)].abs() < 1e-6);
        }
    }
}

#[test]
fn segments_follow_located_boundaries() {
    let report = run(&cell(&[0.5, 0.3, 0.4]), &EIGS, &options());
    let segments = report.segments();
    assert_eq!(segments.len(), 4);

    let zones: Vec<Zone> = segments[1].iter().map(|s| s.zone).collect();
    assert_eq!(zones, vec![Zone::Strong, Zone::Weak, Zone::Propagation]);
    assert_eq!(segments[1][0].f0, 1.0);
    assert_eq!(segments[1][2].f1, 2.0);
    assert_eq!(segments[3][0].zone, Zone::Strong);

    let (lo, hi) = report.trace_bounds().unwrap();
    assert!(lo < 0.0 && hi > 0.0);
}

#[test]
fn masked_resonance_does_not_bound_an_interval() {
    let eigs = [1.0, 4.0, 9.0, 16.0];
    let report = run(&cell(&[0.5, 1e-6, 0.4, 0.3]), &eigs, &options());

    assert_eq!(report.valid, vec![true, false, true, true]);
    assert_eq!(report.n_zeroed, 1);
    assert_eq!(report.freq_range, vec![1.0, 3.0, 4.0]);
    assert_eq!(report.freq_range_margins.len(), 5);
    assert_eq!(report.kinds.len(), 4);
    assert_eq!(report.kinds[0], GapKind::Propagation);
    assert_logs_sorted(&report);
}

#[test]
fn all_masked_leaves_one_propagation_interval() {
    let options = options().with_threshold(1e3, false);
    let report = run(&cell(&[0.5, 0.3, 0.4]), &EIGS, &options);

    assert!(report.all_masked());
    assert_eq!(report.n_zeroed, 3);
    assert_eq!(report.freq_range_margins.len(), 2);
    assert_eq!(report.kinds, vec![GapKind::Propagation]);
}

#[test]
fn fixed_frequency_range_overrides_eigenvalue_range() {
    let options = options().with_fixed_freq_range(1.5, 2.5);
    let report = run(&cell(&[0.5, 0.3, 0.4]), &EIGS, &options);

    assert_eq!(report.eig_range, (1, 2));
    assert_eq!(report.freq_range_margins, vec![1.5, 2.0, 2.5]);
    assert_eq!(
        report.kinds,
        vec![GapKind::Propagation, GapKind::StrongWeakPropagation]
    );
}

#[test]
fn christoffel_scaling_keeps_gap_kinds() {
    let cell = cell(&[0.5, 0.3, 0.4]);
    let modes = DMatrix::zeros(0, EIGS.len());
    let gamma = DMatrix::from_element(1, 1, 2.0);

    let plain = detect_band_gaps(&cell, &EIGS, &modes, &options(), None).unwrap();
    let scaled = detect_band_gaps(&cell, &EIGS, &modes, &options(), Some(&gamma)).unwrap();
    assert_eq!(plain.kinds, scaled.kinds);
    for (a, b) in plain.gaps.iter().zip(&scaled.gaps) {
        assert!((a.max.freq - b.max.freq).abs() < 1e-6);
    }
}

#[test]
fn invalid_options_are_rejected_before_scanning() {
    let cell = cell(&[0.5, 0.3, 0.4]);
    let modes = DMatrix::zeros(0, EIGS.len());

    let err = detect_band_gaps(&cell, &EIGS, &modes, &BandGapOptions::default(), None).unwrap_err();
    assert!(err.to_string().contains("eigenmomentum"));

    let bad_range = options().with_eig_range(2, 3);
    assert!(detect_band_gaps(&cell, &EIGS, &modes, &bad_range, None).is_err());
}

/// Cell whose eigenmomentum is the density-weighted sum of nodal values.
struct NodalCell {
    density: f64,
}

impl CellProblem for NodalCell {
    fn dim(&self) -> usize {
        1
    }

    fn region_volume(&self, _volume_term: &str, _region: &str) -> Result<f64> {
        Ok(1.0)
    }

    fn region_density(&self, _region: &str, _material: &str) -> Result<f64> {
        Ok(self.density)
    }

    fn eigenmomentum(
        &self,
        _spec: &EigenmomentumSpec,
        weights: &[RegionWeight],
        _mode: usize,
        mode_shape: &[f64],
    ) -> Result<DVector<f64>> {
        let total: f64 = mode_shape.iter().sum();
        let value: f64 = weights.iter().map(|w| w.density * total).sum();
        Ok(DVector::from_element(1, value))
    }

    fn transform_mode_shape(
        &self,
        transform: &TransformSpec,
        mode_shape: &[f64],
        _shape: (usize, usize),
    ) -> Result<Option<Vec<f64>>> {
        let scale = transform.args.first().copied().unwrap_or(1.0);
        if scale == 0.0 {
            return Ok(None);
        }
        Ok(Some(mode_shape.iter().map(|v| v * scale).collect()))
    }
}

#[test]
fn mode_shapes_drive_eigenmomenta() {
    let modes = DMatrix::from_column_slice(2, 3, &[0.25, 0.25, 0.1, 0.2, 0.2, 0.2]);
    let report = detect_band_gaps(&NodalCell { density: 1.0 }, &EIGS, &modes, &options(), None).unwrap();
    let reference = run(&cell(&[0.5, 0.3, 0.4]), &EIGS, &options());
    assert_eq!(report.kinds, reference.kinds);
}

#[test]
fn zeroing_transform_masks_every_mode() {
    let modes = DMatrix::from_column_slice(2, 3, &[0.25, 0.25, 0.1, 0.2, 0.2, 0.2]);
    let mut options = options().with_threshold(1e-10, false);
    options.eig_vector_transform = Some(TransformSpec {
        name: "scale".into(),
        args: vec![0.0],
    });
    let report = detect_band_gaps(&NodalCell { density: 1.0 }, &EIGS, &modes, &options, None).unwrap();
    assert!(report.all_masked());
    assert_eq!(report.n_zeroed, 3);
}

#[test]
fn exact_zero_momenta_are_counted_as_zeroed() {
    let eigs = [1.0, 4.0, 9.0, 16.0];
    let report = run(&cell(&[0.5, 0.0, 0.4, 0.0]), &eigs, &options());

    assert_eq!(report.valid, vec![true, false, true, false]);
    let invalid = report.valid.iter().filter(|v| !**v).count();
    assert_eq!(report.n_zeroed, invalid);
    assert_eq!(report.freq_range, vec![1.0, 3.0]);
    assert!(!report.all_masked);
}

#[test]
fn unweighted_eigenmomenta_feed_the_load_tensor() {
    let modes = DMatrix::from_column_slice(2, 3, &[0.25, 0.25, 0.1, 0.2, 0.2, 0.2]);
    let opts = options().with_unweighted(true).resolve(EIGS.len()).unwrap();
    let setup = setup_band_gaps(&NodalCell { density: 2.0 }, &EIGS, &modes, &opts).unwrap();

    let unweighted = setup.eigenmomenta.unweighted.as_ref().unwrap();
    assert!((setup.eigenmomenta.weighted[(0, 0)] - 2.0 * unweighted[(0, 0)]).abs() < 1e-12);

    let load = setup.load_tensor(&EIGS).unwrap().unwrap();
    assert!((load.evaluate(0.0)[(0, 0)] - 1.0).abs() < 1e-12);
    assert_eq!(setup.mass_tensor(&EIGS).unwrap().n_modes(), 3);
}

#[test]
fn report_keeps_unweighted_eigenmomenta() {
    let modes = DMatrix::from_column_slice(2, 3, &[0.25, 0.25, 0.1, 0.2, 0.2, 0.2]);
    let cell = NodalCell { density: 2.0 };

    let plain = detect_band_gaps(&cell, &EIGS, &modes, &options(), None).unwrap();
    assert!(plain.unweighted_eigenmomenta.is_none());
    assert!(plain.load_tensor(&EIGS).unwrap().is_none());

    let opts = options().with_unweighted(true);
    let report = detect_band_gaps(&cell, &EIGS, &modes, &opts, None).unwrap();
    let unweighted = report.unweighted_eigenmomenta.as_ref().unwrap();
    assert_eq!(unweighted.len(), 3);
    assert!((unweighted[0][0] - 0.5).abs() < 1e-12);
    assert!((report.eigenmomenta[0][0] - 1.0).abs() < 1e-12);

    let setup = setup_band_gaps(&cell, &EIGS, &modes, &opts.resolve(EIGS.len()).unwrap()).unwrap();
    let expected = setup.load_tensor(&EIGS).unwrap().unwrap();
    let load = report.load_tensor(&EIGS).unwrap().unwrap();
    assert_eq!(load.evaluate(0.5), expected.evaluate(0.5));
    assert!(report.load_tensor(&EIGS[..2]).is_err());
}
