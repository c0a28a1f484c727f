//! Assignment of decomposed volumes to output files.
//!
//! Every piece of a buffer decomposition lies within exactly one output file by construction.
//! The assignment checks this for every piece rather than relying on it.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::{grid::RegularGrid, volume::Volume};

/// A topology error.
///
/// A decomposed volume overlapped no output file, or was not contained in the output file it overlapped.
#[derive(Clone, Debug, Error)]
#[error("volume {volume} overlaps {overlapping} output files, expected to lie within exactly one")]
pub struct TopologyError {
    volume: Volume,
    overlapping: usize,
}

impl TopologyError {
    /// Return the offending volume.
    #[must_use]
    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    /// Return the number of output files the volume overlaps.
    #[must_use]
    pub fn overlapping(&self) -> usize {
        self.overlapping
    }
}

/// Return the output files crossed by `buffer`, as `(linear index, volume)` pairs in ascending order.
#[must_use]
pub fn crossed_files(buffer: &Volume, file_grid: &RegularGrid) -> Vec<(u64, Volume)> {
    file_grid
        .cells_overlapping(buffer)
        .into_iter()
        .map(|index| (index, file_grid.cell_volume(index)))
        .collect()
}

/// Assign the decomposed `volumes` of `buffer` to output files.
///
/// Returns `(file linear index, volume)` pairs in the order of `volumes`.
///
/// # Errors
/// Returns a [`TopologyError`] if a volume does not lie within exactly one of the output files crossed by `buffer`.
pub fn assign_buffer(
    buffer: &Volume,
    volumes: Vec<Volume>,
    file_grid: &RegularGrid,
) -> Result<Vec<(u64, Volume)>, TopologyError> {
    let crossed = crossed_files(buffer, file_grid);
    volumes
        .into_iter()
        .map(|volume| {
            let file = crossed.iter().find(|(_, file)| file.overlaps(&volume));
            match file {
                Some((index, file)) if file.contains(&volume) => Ok((*index, volume)),
                _ => Err(TopologyError {
                    volume,
                    overlapping: crossed
                        .iter()
                        .filter(|(_, file)| file.overlaps(&volume))
                        .count(),
                }),
            }
        })
        .collect()
}

/// Assign the decomposed volumes of every buffer to output files.
///
/// `buffer_volumes` maps buffer linear indices in `buffer_grid` to their decomposition in global coordinates.
/// Each output file accumulates its volumes in buffer order.
///
/// # Errors
/// Returns a [`TopologyError`] if a volume does not lie within exactly one output file.
pub fn assign(
    buffer_volumes: BTreeMap<u64, Vec<Volume>>,
    buffer_grid: &RegularGrid,
    file_grid: &RegularGrid,
) -> Result<BTreeMap<u64, Vec<Volume>>, TopologyError> {
    let mut arrays: BTreeMap<u64, Vec<Volume>> = BTreeMap::new();
    for (buffer_index, volumes) in buffer_volumes {
        let buffer = buffer_grid.cell_volume(buffer_index);
        for (file_index, volume) in assign_buffer(&buffer, volumes, file_grid)? {
            arrays.entry(file_index).or_default().push(volume);
        }
    }
    Ok(arrays)
}
