//! Regular grids of volumes.
//!
//! Both the buffers and the output files regularly partition the reconstructed array.
//! A [`RegularGrid`] describes such a partition and names each cell by its linear index.
//!
//! Linear indices are row-major: for a grid of shape `(ni, nj, nk)` the cell at `(i, j, k)` has index `i * nj * nk + j * nk + k`.
//! See [`ravel_indices`] and [`unravel_index`].

use std::collections::BTreeMap;

use itertools::iproduct;
use thiserror::Error;

use crate::volume::{Point, Provenance, Volume};

/// A partition shape error.
#[derive(Clone, Debug, Error)]
pub enum PartitionShapeError {
    /// A cell shape has a zero extent.
    #[error("cell shape {0:?} has a zero extent")]
    ZeroCellShape(Point),
    /// The cell shape does not divide the big shape.
    #[error("shape {0:?} is not divisible by cell shape {1:?}")]
    Indivisible(Point, Point),
}

/// Return the number of `small_shape` cells in `big_shape` on each axis.
///
/// # Errors
/// Returns [`PartitionShapeError`] if `small_shape` has a zero extent or does not evenly divide `big_shape` on every axis.
pub fn partition_shape(big_shape: &Point, small_shape: &Point) -> Result<Point, PartitionShapeError> {
    if small_shape.contains(&0) {
        Err(PartitionShapeError::ZeroCellShape(*small_shape))
    } else if std::iter::zip(big_shape, small_shape).any(|(big, small)| big % small != 0) {
        Err(PartitionShapeError::Indivisible(*big_shape, *small_shape))
    } else {
        Ok([0, 1, 2].map(|d| big_shape[d] / small_shape[d]))
    }
}

/// Unravel a linearised index to 3D indices in a grid of shape `shape`.
#[must_use]
pub fn unravel_index(mut index: u64, shape: &Point) -> Point {
    let mut indices = [0; 3];
    for (indices_i, &dim) in std::iter::zip(indices.iter_mut().rev(), shape.iter().rev()) {
        *indices_i = index % dim;
        index /= dim;
    }
    indices
}

/// Ravel 3D indices to a linearised index in a grid of shape `shape`.
#[must_use]
pub fn ravel_indices(indices: &Point, shape: &Point) -> u64 {
    let mut index: u64 = 0;
    let mut count = 1;
    for (i, s) in std::iter::zip(indices, shape).rev() {
        index += i * count;
        count *= s;
    }
    index
}

/// Return every cell of a grid with `partition_shape` cells of `cell_shape`, keyed by linear index.
#[must_use]
pub fn named_volumes(partition_shape: &Point, cell_shape: &Point) -> BTreeMap<u64, Volume> {
    iproduct!(
        0..partition_shape[0],
        0..partition_shape[1],
        0..partition_shape[2]
    )
    .map(|(i, j, k)| {
        let index = ravel_indices(&[i, j, k], partition_shape);
        (index, cell_volume(index, &[i, j, k], cell_shape))
    })
    .collect()
}

fn cell_volume(index: u64, indices: &Point, cell_shape: &Point) -> Volume {
    Volume::new_unchecked(
        Provenance::Grid(index),
        [0, 1, 2].map(|d| indices[d] * cell_shape[d]),
        [0, 1, 2].map(|d| (indices[d] + 1) * cell_shape[d]),
    )
}

/// A regular grid of equally shaped cells tiling an array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegularGrid {
    array_shape: Point,
    cell_shape: Point,
    grid_shape: Point,
}

impl RegularGrid {
    /// Create a new regular grid of `cell_shape` cells tiling an array with `array_shape`.
    ///
    /// # Errors
    /// Returns [`PartitionShapeError`] if `cell_shape` does not evenly partition `array_shape`.
    pub fn new(array_shape: Point, cell_shape: Point) -> Result<Self, PartitionShapeError> {
        let grid_shape = partition_shape(&array_shape, &cell_shape)?;
        Ok(Self {
            array_shape,
            cell_shape,
            grid_shape,
        })
    }

    /// Return the array shape.
    #[must_use]
    pub fn array_shape(&self) -> &Point {
        &self.array_shape
    }

    /// Return the cell shape.
    #[must_use]
    pub fn cell_shape(&self) -> &Point {
        &self.cell_shape
    }

    /// Return the grid shape (i.e. the number of cells on each axis).
    #[must_use]
    pub fn grid_shape(&self) -> &Point {
        &self.grid_shape
    }

    /// Return the number of cells in the grid.
    #[must_use]
    pub fn num_cells(&self) -> u64 {
        self.grid_shape.iter().product()
    }

    /// Return the 3D indices of the cell with linear index `index`.
    #[must_use]
    pub fn cell_indices(&self, index: u64) -> Point {
        debug_assert!(index < self.num_cells());
        unravel_index(index, &self.grid_shape)
    }

    /// Return the origin (low corner) of the cell with linear index `index`.
    #[must_use]
    pub fn cell_origin(&self, index: u64) -> Point {
        let indices = self.cell_indices(index);
        [0, 1, 2].map(|d| indices[d] * self.cell_shape[d])
    }

    /// Return the volume of the cell with linear index `index`.
    #[must_use]
    pub fn cell_volume(&self, index: u64) -> Volume {
        cell_volume(index, &self.cell_indices(index), &self.cell_shape)
    }

    /// Return every cell of the grid keyed by linear index.
    #[must_use]
    pub fn volumes(&self) -> BTreeMap<u64, Volume> {
        named_volumes(&self.grid_shape, &self.cell_shape)
    }

    /// Return the linear indices of the cells overlapping `volume` in ascending order.
    #[must_use]
    pub fn cells_overlapping(&self, volume: &Volume) -> Vec<u64> {
        if volume.is_empty() {
            return vec![];
        }
        let ranges = [0, 1, 2].map(|d| {
            let start = volume.p1()[d] / self.cell_shape[d];
            let end = volume.p2()[d].div_ceil(self.cell_shape[d]);
            start..std::cmp::min(end, self.grid_shape[d])
        });
        let [ri, rj, rk] = ranges;
        iproduct!(ri, rj, rk)
            .map(|(i, j, k)| ravel_indices(&[i, j, k], &self.grid_shape))
            .collect()
    }
}
