//! Write zones.
//!
//! [`compute_zones`] computes, for every output file, the volumes it receives from the buffers.
//! The result is a [`Zones`]:
//!  - [`Zones::arrays`] holds the volumes in global coordinates, which are read from the buffers, and
//!  - [`Zones::regions`] holds the same volumes relative to the origin of their output file, which are written to it.
//!
//! Both are keyed by the linear index of the output file in the file grid.
//!
//! ### Example
//! ```rust
//! # use resplit::{category::Category, zones::compute_zones};
//! let zones = compute_zones(&[1, 60, 60], &[1, 40, 40], &[1, 120, 120], &[Category::HighK])?;
//! assert_eq!(zones.arrays()[&1], vec![[0..1, 0..40, 40..80]]);
//! assert_eq!(zones.regions()[&1], vec![[0..1, 0..40, 0..40]]);
//! # Ok::<(), resplit::zones::ZonesError>(())
//! ```

mod resplit_configuration;

pub use resplit_configuration::ResplitConfiguration;

use std::collections::BTreeMap;

use itertools::Itertools;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rayon_iter_concurrent_limit::iter_concurrent_limit;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    assignment::{assign_buffer, crossed_files, TopologyError},
    category::{Category, InvalidCategoryError},
    config::global_config,
    decomposition::decompose_buffer,
    grid::{PartitionShapeError, RegularGrid},
    merge::{merge_cached_volumes, merge_rules},
    volume::{Point, Provenance, Volume, VolumeRanges},
};

/// A zones error.
#[derive(Clone, Debug, Error)]
pub enum ZonesError {
    /// A buffer or output file shape does not partition the array shape.
    #[error(transparent)]
    PartitionShape(#[from] PartitionShapeError),
    /// A kept category is not a category id.
    #[error(transparent)]
    InvalidCategory(#[from] InvalidCategoryError),
    /// A decomposed volume does not lie within exactly one output file.
    #[error(transparent)]
    Topology(#[from] TopologyError),
    /// The volumes of an output file do not tile it.
    #[error("output file {file} is not tiled by its volumes: {reason}")]
    Tiling {
        /// The linear index of the output file.
        file: u64,
        /// Why the tiling is invalid.
        reason: String,
    },
}

/// The volumes each output file receives, in global and file-local coordinates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zones {
    arrays: BTreeMap<u64, Vec<VolumeRanges>>,
    regions: BTreeMap<u64, Vec<VolumeRanges>>,
}

impl Zones {
    /// Return the volumes of each output file in global coordinates.
    #[must_use]
    pub fn arrays(&self) -> &BTreeMap<u64, Vec<VolumeRanges>> {
        &self.arrays
    }

    /// Return the volumes of each output file relative to the origin of the output file.
    #[must_use]
    pub fn regions(&self) -> &BTreeMap<u64, Vec<VolumeRanges>> {
        &self.regions
    }

    /// Consume the zones and return the `(arrays, regions)` maps.
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        BTreeMap<u64, Vec<VolumeRanges>>,
        BTreeMap<u64, Vec<VolumeRanges>>,
    ) {
        (self.arrays, self.regions)
    }

    /// Return the total number of writes, i.e. the number of volumes over every output file.
    #[must_use]
    pub fn num_writes(&self) -> usize {
        self.regions.values().map(Vec::len).sum()
    }

    /// Validate that the zones tile every output file of `file_grid`.
    ///
    /// The global and file-local volumes must also agree.
    ///
    /// # Errors
    /// Returns [`ZonesError::Tiling`] if an output file is not exactly tiled by its volumes.
    pub fn validate(&self, file_grid: &RegularGrid) -> Result<(), ZonesError> {
        let mut arrays = BTreeMap::new();
        for (&file, ranges) in &self.arrays {
            let volumes = ranges
                .iter()
                .map(|ranges| Volume::new_with_ranges(Provenance::Merged, ranges))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| ZonesError::Tiling {
                    file,
                    reason: err.to_string(),
                })?;
            arrays.insert(file, volumes);
        }
        validate_tiling(&arrays, file_grid)?;
        let regions = project(&arrays, file_grid);
        if regions == self.regions {
            Ok(())
        } else {
            let file = self
                .regions
                .keys()
                .chain(regions.keys())
                .copied()
                .find(|file| regions.get(file) != self.regions.get(file))
                .unwrap_or_default();
            Err(ZonesError::Tiling {
                file,
                reason: "regions do not match arrays".to_string(),
            })
        }
    }
}

/// Project the volumes of each output file to file-local coordinates.
///
/// The origin of each output file in `file_grid` is subtracted from its volumes.
#[must_use]
pub fn project(
    arrays: &BTreeMap<u64, Vec<Volume>>,
    file_grid: &RegularGrid,
) -> BTreeMap<u64, Vec<VolumeRanges>> {
    arrays
        .iter()
        .map(|(&file, volumes)| {
            let origin = file_grid.cell_origin(file);
            let regions = volumes
                .iter()
                .map(|volume| volume.relative_to(&origin).to_ranges())
                .collect();
            (file, regions)
        })
        .collect()
}

fn to_ranges(arrays: &BTreeMap<u64, Vec<Volume>>) -> BTreeMap<u64, Vec<VolumeRanges>> {
    arrays
        .iter()
        .map(|(&file, volumes)| (file, volumes.iter().map(Volume::to_ranges).collect()))
        .collect()
}

/// Validate that the volumes of each output file exactly tile it.
///
/// Every output file of `file_grid` must be present, and its volumes must be non-empty, contained in the file, pairwise disjoint, and cover the whole file.
///
/// # Errors
/// Returns [`ZonesError::Tiling`] for the first output file that is not exactly tiled.
pub fn validate_tiling(
    arrays: &BTreeMap<u64, Vec<Volume>>,
    file_grid: &RegularGrid,
) -> Result<(), ZonesError> {
    let tiling_error = |file: u64, reason: String| ZonesError::Tiling { file, reason };
    if let Some(&file) = arrays.keys().find(|&&file| file >= file_grid.num_cells()) {
        return Err(tiling_error(file, "not in the file grid".to_string()));
    }
    for file in 0..file_grid.num_cells() {
        let Some(volumes) = arrays.get(&file) else {
            return Err(tiling_error(file, "no volumes".to_string()));
        };
        let file_volume = file_grid.cell_volume(file);
        if let Some(volume) = volumes.iter().find(|volume| volume.is_empty()) {
            return Err(tiling_error(file, format!("{volume} is empty")));
        }
        if let Some(volume) = volumes.iter().find(|volume| !file_volume.contains(volume)) {
            return Err(tiling_error(file, format!("{volume} is outside {file_volume}")));
        }
        if let Some((a, b)) = volumes.iter().tuple_combinations().find(|(a, b)| a.overlaps(b)) {
            return Err(tiling_error(file, format!("{a} overlaps {b}")));
        }
        let num_elements: u64 = volumes.iter().map(Volume::num_elements).sum();
        if num_elements != file_volume.num_elements() {
            return Err(tiling_error(
                file,
                format!(
                    "volumes cover {num_elements} of {} elements",
                    file_volume.num_elements()
                ),
            ));
        }
    }
    Ok(())
}

/// Decompose every buffer of `buffer_grid` and assign its pieces to the output files of `file_grid`.
///
/// Buffers are processed concurrently.
/// Each output file receives its volumes in buffer order, then decomposition order.
fn assign_buffers(
    buffer_grid: &RegularGrid,
    file_grid: &RegularGrid,
    concurrent_limit: usize,
) -> Result<BTreeMap<u64, Vec<Volume>>, TopologyError> {
    let indices: Vec<u64> = (0..buffer_grid.num_cells()).collect();
    let assigned = iter_concurrent_limit!(concurrent_limit, indices, map, |buffer_index: u64| {
        let buffer = buffer_grid.cell_volume(buffer_index);
        let volumes = decompose_buffer(
            &buffer_grid.cell_indices(buffer_index),
            buffer_grid.cell_shape(),
            file_grid.cell_shape(),
        );
        assign_buffer(&buffer, volumes, file_grid)
    })
    .collect::<Result<Vec<_>, TopologyError>>()?;

    let mut arrays: BTreeMap<u64, Vec<Volume>> = BTreeMap::new();
    for (file, volume) in assigned.into_iter().flatten() {
        arrays.entry(file).or_default().push(volume);
    }
    Ok(arrays)
}

/// Compute the write zones for rechunking an array of `array_shape` read in buffers of `buffer_shape` into output files of `file_shape`.
///
/// Every buffer is decomposed into pieces that each lie within one output file.
/// The pieces of the categories in `keep` are then merged with their neighbours, so that an output file receives fewer, larger writes.
/// With nothing kept, each output file receives one volume per buffer overlapping it.
///
/// If [validate zones](crate::config::Config#validate-zones) is enabled, the tiling of every output file is validated before and after merging.
///
/// # Errors
/// Returns a [`ZonesError`] if
///  - `buffer_shape` or `file_shape` does not partition `array_shape`,
///  - a decomposed volume does not lie within exactly one output file, or
///  - validation is enabled and an output file is not tiled by its volumes.
pub fn compute_zones(
    buffer_shape: &Point,
    file_shape: &Point,
    array_shape: &Point,
    keep: &[Category],
) -> Result<Zones, ZonesError> {
    let buffer_grid = RegularGrid::new(*array_shape, *buffer_shape)?;
    let file_grid = RegularGrid::new(*array_shape, *file_shape)?;
    let (buffer_concurrent_limit, file_concurrent_limit, validate) = {
        let config = global_config();
        (
            config.buffer_concurrent_limit().max(1),
            config.file_concurrent_limit().max(1),
            config.validate_zones(),
        )
    };

    let mut arrays = assign_buffers(&buffer_grid, &file_grid, buffer_concurrent_limit)?;
    log::trace!(
        "assigned {} buffers to {} output files",
        buffer_grid.num_cells(),
        arrays.len()
    );
    if validate {
        validate_tiling(&arrays, &file_grid)?;
    }

    let rules = merge_rules(keep);
    merge_cached_volumes(&mut arrays, &rules, file_concurrent_limit);
    if validate && !rules.is_empty() {
        validate_tiling(&arrays, &file_grid)?;
    }

    Ok(Zones {
        regions: project(&arrays, &file_grid),
        arrays: to_ranges(&arrays),
    })
}

/// Compute the write zones by intersecting every buffer with every output file it crosses.
///
/// This is equivalent to [`compute_zones`] with nothing kept, without decomposing the buffers.
///
/// # Errors
/// Returns a [`ZonesError`] if `buffer_shape` or `file_shape` does not partition `array_shape`.
pub fn compute_zones_naive(
    buffer_shape: &Point,
    file_shape: &Point,
    array_shape: &Point,
) -> Result<Zones, ZonesError> {
    let buffer_grid = RegularGrid::new(*array_shape, *buffer_shape)?;
    let file_grid = RegularGrid::new(*array_shape, *file_shape)?;
    let mut arrays: BTreeMap<u64, Vec<Volume>> = BTreeMap::new();
    for (buffer_index, buffer) in buffer_grid.volumes() {
        for (file, file_volume) in crossed_files(&buffer, &file_grid) {
            if let Some(volume) = buffer.intersection(&file_volume, Provenance::Grid(buffer_index))
            {
                arrays.entry(file).or_default().push(volume);
            }
        }
    }
    Ok(Zones {
        regions: project(&arrays, &file_grid),
        arrays: to_ranges(&arrays),
    })
}

/// Compute the write zones with the kept categories given by id.
///
/// # Errors
/// Returns [`ZonesError::InvalidCategory`] if an id in `keep` is not from 1 to 7, otherwise see [`compute_zones`].
pub fn compute_zones_with_ids(
    buffer_shape: &Point,
    file_shape: &Point,
    array_shape: &Point,
    keep: &[u8],
) -> Result<Zones, ZonesError> {
    let keep = Category::from_ids(keep)?;
    compute_zones(buffer_shape, file_shape, array_shape, &keep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zones_boundary_case() {
        let b = [1, 60, 60];
        let o = [1, 40, 40];
        let r = [1, 120, 120];
        let zones = compute_zones(&b, &o, &r, &[]).unwrap();
        assert_eq!(
            zones.arrays()[&1],
            vec![[0..1, 0..40, 40..60], [0..1, 0..40, 60..80]]
        );
        assert_eq!(zones.arrays()[&4].len(), 4);

        let zones = compute_zones(&b, &o, &r, &[Category::HighK]).unwrap();
        assert_eq!(zones.arrays()[&1], vec![[0..1, 0..40, 40..80]]);
        assert_eq!(zones.regions()[&1], vec![[0..1, 0..40, 0..40]]);
        assert_eq!(zones.arrays()[&0], vec![[0..1, 0..40, 0..40]]);
        assert_eq!(zones.arrays()[&4].len(), 3);
        let file_grid = RegularGrid::new(r, o).unwrap();
        zones.validate(&file_grid).unwrap();
    }

    #[test]
    fn zones_merge_everything() {
        let b = [60, 60, 60];
        let o = [40, 40, 40];
        let r = [120, 120, 120];
        let zones = compute_zones(&b, &o, &r, &Category::ALL).unwrap();
        let unmerged = compute_zones(&b, &o, &r, &[]).unwrap();
        assert!(zones.num_writes() < unmerged.num_writes());
        // The central output file is covered by the corner pieces of eight buffers
        assert_eq!(unmerged.regions()[&13].len(), 8);
        assert_eq!(zones.regions()[&13], vec![[0..40, 0..40, 0..40]]);
        zones
            .validate(&RegularGrid::new(r, o).unwrap())
            .unwrap();
    }

    #[test]
    fn zones_project() {
        let file_grid = RegularGrid::new([1, 120, 120], [1, 40, 40]).unwrap();
        let arrays = BTreeMap::from([(
            5,
            vec![Volume::new(Provenance::Merged, [0, 40, 80], [1, 60, 120]).unwrap()],
        )]);
        assert_eq!(project(&arrays, &file_grid)[&5], vec![[0..1, 0..20, 0..40]]);
    }

    #[test]
    fn zones_validate_tiling() {
        let file_grid = RegularGrid::new([1, 80, 40], [1, 40, 40]).unwrap();
        let volume = |p1, p2| Volume::new(Provenance::Merged, p1, p2).unwrap();
        let mut arrays = BTreeMap::from([
            (0, vec![volume([0, 0, 0], [1, 40, 40])]),
            (
                1,
                vec![
                    volume([0, 40, 0], [1, 80, 20]),
                    volume([0, 40, 20], [1, 80, 40]),
                ],
            ),
        ]);
        validate_tiling(&arrays, &file_grid).unwrap();

        // Gap
        arrays.get_mut(&1).unwrap().pop();
        assert!(matches!(
            validate_tiling(&arrays, &file_grid),
            Err(ZonesError::Tiling { file: 1, .. })
        ));

        // Overlap with a matching element count
        arrays.insert(
            1,
            vec![
                volume([0, 40, 0], [1, 80, 20]),
                volume([0, 40, 20], [1, 60, 40]),
                volume([0, 50, 20], [1, 70, 40]),
            ],
        );
        let err = validate_tiling(&arrays, &file_grid).unwrap_err();
        assert!(err.to_string().contains("overlaps"));

        // Missing output file
        arrays.remove(&1);
        assert!(matches!(
            validate_tiling(&arrays, &file_grid),
            Err(ZonesError::Tiling { file: 1, .. })
        ));
    }

    #[test]
    fn zones_naive() {
        let zones = compute_zones_naive(&[1, 60, 60], &[1, 40, 40], &[1, 120, 120]).unwrap();
        assert_eq!(zones.arrays().len(), 9);
        assert_eq!(
            zones.regions()[&4],
            vec![
                [0..1, 0..20, 0..20],
                [0..1, 0..20, 20..40],
                [0..1, 20..40, 0..20],
                [0..1, 20..40, 20..40]
            ]
        );
    }

    #[test]
    fn zones_errors() {
        assert!(matches!(
            compute_zones(&[1, 50, 60], &[1, 40, 40], &[1, 120, 120], &[]),
            Err(ZonesError::PartitionShape(_))
        ));
        assert!(matches!(
            compute_zones(&[1, 60, 60], &[1, 0, 40], &[1, 120, 120], &[]),
            Err(ZonesError::PartitionShape(_))
        ));
        assert!(matches!(
            compute_zones_with_ids(&[1, 60, 60], &[1, 40, 40], &[1, 120, 120], &[8]),
            Err(ZonesError::InvalidCategory(_))
        ));
        assert_eq!(
            compute_zones_with_ids(&[1, 60, 60], &[1, 40, 40], &[1, 120, 120], &[1]).unwrap(),
            compute_zones(&[1, 60, 60], &[1, 40, 40], &[1, 120, 120], &[Category::HighK])
                .unwrap()
        );
    }
}
