//! Volumes.
//!
//! A [`Volume`] is an axis-aligned box `[p1, p2)` in three dimensional integer space.
//! Buffers, output files and every piece a buffer is decomposed into are volumes.
//!
//! A volume records its [`Provenance`]: a grid cell, a decomposition [`Category`], a hidden volume, or the result of a merge.

use std::{fmt, ops::Range};

use derive_more::{Display, From};
use itertools::izip;
use thiserror::Error;

use crate::category::Category;

/// A point in three dimensional integer space.
pub type Point = [u64; 3];

/// The per-axis half-open ranges of a [`Volume`].
pub type VolumeRanges = [Range<u64>; 3];

/// The axes of three dimensional space.
///
/// Can be used to index 3-component arrays such as a [`Point`].
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, Ord, PartialOrd)]
#[repr(u8)]
pub enum Axis {
    /// The first (slowest varying) axis.
    I = 0,
    /// The second axis.
    J = 1,
    /// The third (fastest varying) axis.
    K = 2,
}

impl Axis {
    /// All three axes in order, [I, J, K].
    pub const ALL: [Self; 3] = [Self::I, Self::J, Self::K];

    /// Convert the axis to a number for indexing 3-element arrays.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// What a [`Volume`] represents.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Provenance {
    /// A cell of a buffer or output file grid, with its linear index.
    Grid(u64),
    /// A categorical piece of a buffer decomposition.
    Category(Category),
    /// A hidden volume of a buffer decomposition, numbered from 8.
    Hidden(u64),
    /// The union of several pieces. A merged volume has no single category.
    Merged,
}

impl Provenance {
    /// Return the category if this is a categorical piece.
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        match self {
            Self::Category(category) => Some(*category),
            _ => None,
        }
    }
}

/// An axis-aligned box `[p1, p2)`.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct Volume {
    provenance: Provenance,
    /// The low corner.
    p1: Point,
    /// The high corner (exclusive).
    p2: Point,
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_ranges(), f)
    }
}

/// An incompatible corners error.
///
/// The high corner of a volume must not be below its low corner on any axis.
#[derive(Clone, Debug, Error, From)]
#[error("incompatible low corner {0:?} with high corner {1:?}")]
pub struct IncompatibleCornersError(Point, Point);

impl Volume {
    /// Create a new volume from its low corner `p1` and high corner `p2` (exclusive).
    ///
    /// # Errors
    /// Returns [`IncompatibleCornersError`] if any component of `p2` is less than `p1`.
    pub fn new(provenance: Provenance, p1: Point, p2: Point) -> Result<Self, IncompatibleCornersError> {
        if std::iter::zip(&p1, &p2).any(|(low, high)| high < low) {
            Err(IncompatibleCornersError(p1, p2))
        } else {
            Ok(Self { provenance, p1, p2 })
        }
    }

    /// Create a new volume from corners that are known to be ordered.
    pub(crate) fn new_unchecked(provenance: Provenance, p1: Point, p2: Point) -> Self {
        debug_assert!(std::iter::zip(&p1, &p2).all(|(low, high)| low <= high));
        Self { provenance, p1, p2 }
    }

    /// Create a new volume from per-axis ranges.
    ///
    /// # Errors
    /// Returns [`IncompatibleCornersError`] if a range ends before it starts.
    pub fn new_with_ranges(
        provenance: Provenance,
        ranges: &VolumeRanges,
    ) -> Result<Self, IncompatibleCornersError> {
        Self::new(
            provenance,
            ranges.clone().map(|range| range.start),
            ranges.clone().map(|range| range.end),
        )
    }

    /// Return the provenance of the volume.
    #[must_use]
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Return the volume with a different provenance.
    #[must_use]
    pub fn with_provenance(self, provenance: Provenance) -> Self {
        Self { provenance, ..self }
    }

    /// Return the low corner.
    #[must_use]
    pub fn p1(&self) -> &Point {
        &self.p1
    }

    /// Return the high corner (exclusive).
    #[must_use]
    pub fn p2(&self) -> &Point {
        &self.p2
    }

    /// Return the extent of the volume on each axis.
    #[must_use]
    pub fn shape(&self) -> [u64; 3] {
        [0, 1, 2].map(|d| self.p2[d] - self.p1[d])
    }

    /// Returns true if the volume has a zero extent on any axis.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shape().contains(&0)
    }

    /// Return the number of elements (voxels) in the volume.
    #[must_use]
    pub fn num_elements(&self) -> u64 {
        self.shape().iter().product()
    }

    /// Return the volume translated by `delta`.
    #[must_use]
    pub fn offset(&self, delta: &Point) -> Self {
        let translate = |p: &Point| [0, 1, 2].map(|d| p[d] + delta[d]);
        Self {
            provenance: self.provenance,
            p1: translate(&self.p1),
            p2: translate(&self.p2),
        }
    }

    /// Return the volume relative to `origin`, i.e. with `origin` subtracted from both corners.
    ///
    /// `origin` must not exceed the low corner on any axis.
    #[must_use]
    pub fn relative_to(&self, origin: &Point) -> Self {
        debug_assert!(std::iter::zip(&self.p1, origin).all(|(p, o)| o <= p));
        let translate = |p: &Point| [0, 1, 2].map(|d| p[d] - origin[d]);
        Self {
            provenance: self.provenance,
            p1: translate(&self.p1),
            p2: translate(&self.p2),
        }
    }

    /// Returns true if this volume and `other` intersect on every axis.
    ///
    /// Volumes which only touch at a face do not overlap.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        izip!(&self.p1, &self.p2, &other.p1, &other.p2)
            .all(|(a_low, a_high, b_low, b_high)| a_high > b_low && b_high > a_low)
    }

    /// Returns true if `other` lies entirely within this volume.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        izip!(&self.p1, &self.p2, &other.p1, &other.p2)
            .all(|(a_low, a_high, b_low, b_high)| a_low <= b_low && b_high <= a_high)
    }

    /// Return the intersection of this volume and `other`, or [`None`] if they do not overlap.
    #[must_use]
    pub fn intersection(&self, other: &Self, provenance: Provenance) -> Option<Self> {
        if self.overlaps(other) {
            let p1 = [0, 1, 2].map(|d| std::cmp::max(self.p1[d], other.p1[d]));
            let p2 = [0, 1, 2].map(|d| std::cmp::min(self.p2[d], other.p2[d]));
            Some(Self::new_unchecked(provenance, p1, p2))
        } else {
            None
        }
    }

    /// Return the bounding box of this volume and `other`.
    ///
    /// The result is only the union of the two volumes if they are [adjacent](Self::is_adjacent).
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            provenance: Provenance::Merged,
            p1: [0, 1, 2].map(|d| std::cmp::min(self.p1[d], other.p1[d])),
            p2: [0, 1, 2].map(|d| std::cmp::max(self.p2[d], other.p2[d])),
        }
    }

    /// Returns true if `other` starts where this volume ends along `axis` and both have the same extent on the other axes.
    #[must_use]
    pub fn is_adjacent(&self, other: &Self, axis: Axis) -> bool {
        Axis::ALL.into_iter().all(|d| {
            let d = d.index();
            if d == axis.index() {
                self.p2[d] == other.p1[d]
            } else {
                self.p1[d] == other.p1[d] && self.p2[d] == other.p2[d]
            }
        })
    }

    /// Return the low corner a volume adjoining this one along `axis` would have.
    #[must_use]
    pub fn neighbour_corner(&self, axis: Axis) -> Point {
        let mut corner = self.p1;
        corner[axis.index()] = self.p2[axis.index()];
        corner
    }

    /// Return the volume as per-axis half-open ranges.
    #[must_use]
    pub fn to_ranges(&self) -> VolumeRanges {
        [0, 1, 2].map(|d| self.p1[d]..self.p2[d])
    }
}
