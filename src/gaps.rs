//! Classification of scanned intervals into band-gap kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BandGapError, Result};
use crate::root::{BoundaryFlag, BoundaryOutcome};

/// Behavior of the smallest and the largest eigenvalue over one interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub min: BoundaryOutcome,
    pub max: BoundaryOutcome,
}

/// Kind of an interval between two neighboring resonances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    Propagation,
    Weak,
    WeakPropagation,
    Strong,
    StrongWeak,
    StrongWeakPropagation,
}

/// Wave behavior inside a gap segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    /// All eigenvalues negative: no wave propagates.
    Strong,
    /// Mixed signs: some polarizations are blocked.
    Weak,
    /// All eigenvalues positive.
    Propagation,
}

/// A sub-interval of one scanned interval with a single zone type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapSegment {
    pub zone: Zone,
    pub f0: f64,
    pub f1: f64,
}

impl GapKind {
    /// Kind of the `(min, max)` boundary flag pair, `None` if impossible.
    pub fn classify(min: BoundaryFlag, max: BoundaryFlag) -> Option<Self> {
        use BoundaryFlag::{Left, Right, Zero};
        match (min, max) {
            (Left, Left) => Some(GapKind::Propagation),
            (Right, Left) => Some(GapKind::Weak),
            (Zero, Left) => Some(GapKind::WeakPropagation),
            (Right, Right) => Some(GapKind::Strong),
            (Right, Zero) => Some(GapKind::StrongWeak),
            (Zero, Zero) => Some(GapKind::StrongWeakPropagation),
            _ => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            GapKind::Propagation => "p",
            GapKind::Weak => "w",
            GapKind::WeakPropagation => "wp",
            GapKind::Strong => "s",
            GapKind::StrongWeak => "sw",
            GapKind::StrongWeakPropagation => "swp",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            GapKind::Propagation => "propagation zone",
            GapKind::Weak => "full weak band gap",
            GapKind::WeakPropagation => "weak band gap + propagation zone",
            GapKind::Strong => {
                "full strong band gap (due to end of freq. range or too large thresholds)"
            }
            GapKind::StrongWeak => "strong band gap + weak band gap",
            GapKind::StrongWeakPropagation => "strong band gap + weak band gap + propagation zone",
        }
    }

    /// Split `]f0, f1[` into zones using the boundary frequencies of `gap`.
    pub fn segments(self, f0: f64, f1: f64, gap: &Gap) -> Vec<GapSegment> {
        let seg = |zone, f0, f1| GapSegment { zone, f0, f1 };
        let (fmin, fmax) = (gap.min.freq, gap.max.freq);
        match self {
            GapKind::Propagation => vec![seg(Zone::Propagation, f0, f1)],
            GapKind::Weak => vec![seg(Zone::Weak, f0, f1)],
            GapKind::WeakPropagation => vec![
                seg(Zone::Weak, f0, fmin),
                seg(Zone::Propagation, fmin, f1),
            ],
            GapKind::Strong => vec![seg(Zone::Strong, f0, f1)],
            GapKind::StrongWeak => vec![seg(Zone::Strong, f0, fmax), seg(Zone::Weak, fmax, f1)],
            GapKind::StrongWeakPropagation => vec![
                seg(Zone::Strong, f0, fmax),
                seg(Zone::Weak, fmax, fmin),
                seg(Zone::Propagation, fmin, f1),
            ],
        }
    }
}

impl fmt::Display for GapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Classify every interval; an impossible flag pair aborts with its index.
pub fn describe_gaps(gaps: &[Gap]) -> Result<Vec<GapKind>> {
    gaps.iter()
        .enumerate()
        .map(|(interval, gap)| {
            GapKind::classify(gap.min.flag, gap.max.flag).ok_or(BandGapError::ImpossibleGap {
                interval,
                min: gap.min,
                max: gap.max,
            })
        })
        .collect()
}
