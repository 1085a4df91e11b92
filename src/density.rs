//! Region volumes and densities of the unit cell.

use std::collections::BTreeMap;

use log::info;
use serde::Serialize;

use crate::error::{BandGapError, Result};
use crate::problem::CellProblem;

/// Volumes and densities of the regions listed in `region_to_material`, with the
/// volume-weighted average density and the total volume.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensityVolumeInfo {
    pub average_density: f64,
    pub total_volume: f64,
    pub volumes: BTreeMap<String, f64>,
    pub densities: BTreeMap<String, f64>,
}

impl DensityVolumeInfo {
    /// Aggregate per-region `(volume, density)` pairs.
    pub fn from_regions<I, S>(regions: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64, f64)>,
        S: Into<String>,
    {
        let mut volumes = BTreeMap::new();
        let mut densities = BTreeMap::new();
        let mut mass = 0.0;
        let mut total_volume = 0.0;
        for (region, volume, density) in regions {
            let region = region.into();
            mass += volume * density;
            total_volume += volume;
            volumes.insert(region.clone(), volume);
            densities.insert(region, density);
        }
        if !(total_volume > 0.0) {
            return Err(BandGapError::Problem(format!(
                "total volume must be positive, got {total_volume}"
            )));
        }

        Ok(Self {
            average_density: mass / total_volume,
            total_volume,
            volumes,
            densities,
        })
    }
}

/// Compute volumes and densities of the regions in `region_to_material`.
pub fn compute_density_volume_info<P: CellProblem + ?Sized>(
    problem: &P,
    volume_term: &str,
    region_to_material: &BTreeMap<String, String>,
) -> Result<DensityVolumeInfo> {
    let mut regions = Vec::with_capacity(region_to_material.len());
    for (region, material) in region_to_material {
        let volume = problem.region_volume(volume_term, region)?;
        let density = problem.region_density(region, material)?;
        info!("region {region}: volume {volume}, density {density}");
        regions.push((region.as_str(), volume, density));
    }

    let dv_info = DensityVolumeInfo::from_regions(regions)?;
    info!("total volume: {}", dv_info.total_volume);
    Ok(dv_info)
}
