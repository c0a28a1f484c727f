//! Decomposition categories.
//!
//! Along each axis a buffer is split at its [theta](crate::decomposition::theta) into a low part `[0, T)` and a high part `[T, B)`.
//! A [`Category`] names which axes take their high part.
//! The box taking the low part on every axis is the aligned core, which is split into hidden volumes instead.
//!
//! | category | I | J | K |
//! |---|---|---|---|
//! | 1 | low | low | high |
//! | 2 | low | high | low |
//! | 3 | low | high | high |
//! | 4 | high | low | low |
//! | 5 | high | low | high |
//! | 6 | high | high | low |
//! | 7 | high | high | high |

use std::fmt::Display;

use derive_more::From;
use serde_repr::{Deserialize_repr, Serialize_repr};
use thiserror::Error;

use crate::volume::{Axis, Point, Provenance, Volume};

/// A category of a buffer decomposition.
///
/// The discriminant is the category id, with the I, J and K axes contributing 4, 2 and 1 when high.
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd, Serialize_repr, Deserialize_repr,
)]
#[repr(u8)]
pub enum Category {
    /// High on K.
    HighK = 1,
    /// High on J.
    HighJ = 2,
    /// High on J and K.
    HighJK = 3,
    /// High on I.
    HighI = 4,
    /// High on I and K.
    HighIK = 5,
    /// High on I and J.
    HighIJ = 6,
    /// High on every axis.
    HighIJK = 7,
}

/// An invalid category error.
#[derive(Clone, Copy, Debug, Error, From)]
#[error("invalid category {0}, expected an integer from 1 to 7")]
pub struct InvalidCategoryError(u8);

impl Category {
    /// All categories in ascending order of id.
    pub const ALL: [Self; 7] = [
        Self::HighK,
        Self::HighJ,
        Self::HighJK,
        Self::HighI,
        Self::HighIK,
        Self::HighIJ,
        Self::HighIJK,
    ];

    /// Return the category id, from 1 to 7.
    #[must_use]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Returns true if the category takes the high part of the buffer along `axis`.
    #[must_use]
    pub const fn is_high(self, axis: Axis) -> bool {
        let bit = match axis {
            Axis::I => 4,
            Axis::J => 2,
            Axis::K => 1,
        };
        self.id() & bit != 0
    }

    /// Convert a list of category ids to categories.
    ///
    /// # Errors
    /// Returns [`InvalidCategoryError`] if an id is not in `1..=7`.
    pub fn from_ids(ids: &[u8]) -> Result<Vec<Self>, InvalidCategoryError> {
        ids.iter().map(|&id| Self::try_from(id)).collect()
    }
}

impl TryFrom<u8> for Category {
    type Error = InvalidCategoryError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            1..=7 => Ok(Self::ALL[usize::from(id - 1)]),
            _ => Err(InvalidCategoryError(id)),
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Return the box of `category` in buffer coordinates, or [`None`] if it is empty.
///
/// `buffer_shape` is the buffer shape B and `theta` the buffer theta T.
/// On a high axis the box spans `[T, B)`, on a low axis `[0, T)`.
#[must_use]
pub fn category_box(category: Category, buffer_shape: &Point, theta: &Point) -> Option<Volume> {
    let mut p1 = [0; 3];
    let mut p2 = [0; 3];
    for axis in Axis::ALL {
        let d = axis.index();
        debug_assert!(theta[d] <= buffer_shape[d]);
        (p1[d], p2[d]) = if category.is_high(axis) {
            (theta[d], buffer_shape[d])
        } else {
            (0, theta[d])
        };
        if p1[d] == p2[d] {
            return None;
        }
    }
    Some(Volume::new_unchecked(Provenance::Category(category), p1, p2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_ids() {
        for (id, category) in (1..=7).zip(Category::ALL) {
            assert_eq!(category.id(), id);
            assert_eq!(Category::try_from(id).unwrap(), category);
        }
        assert!(Category::try_from(0).is_err());
        assert!(Category::try_from(8).is_err());
        assert_eq!(
            Category::from_ids(&[1, 3]).unwrap(),
            vec![Category::HighK, Category::HighJK]
        );
        assert!(Category::from_ids(&[1, 9]).is_err());
        assert_eq!(Category::HighIJ.to_string(), "6");
    }

    #[test]
    fn category_high_axes() {
        assert!(Category::HighK.is_high(Axis::K));
        assert!(!Category::HighK.is_high(Axis::J));
        assert!(Category::HighIK.is_high(Axis::I));
        assert!(!Category::HighIK.is_high(Axis::J));
        assert!(Category::HighIJK.is_high(Axis::J));
    }

    #[test]
    fn category_boxes() {
        let buffer_shape = [10, 60, 60];
        let theta = [4, 40, 20];
        let box_of = |category| {
            category_box(category, &buffer_shape, &theta)
                .unwrap()
                .to_ranges()
        };
        assert_eq!(box_of(Category::HighK), [0..4, 0..40, 20..60]);
        assert_eq!(box_of(Category::HighJ), [0..4, 40..60, 0..20]);
        assert_eq!(box_of(Category::HighJK), [0..4, 40..60, 20..60]);
        assert_eq!(box_of(Category::HighI), [4..10, 0..40, 0..20]);
        assert_eq!(box_of(Category::HighIK), [4..10, 0..40, 20..60]);
        assert_eq!(box_of(Category::HighIJ), [4..10, 40..60, 0..20]);
        assert_eq!(box_of(Category::HighIJK), [4..10, 40..60, 20..60]);
    }

    #[test]
    fn category_boxes_empty() {
        // Aligned on I: no high part on I
        let buffer_shape = [1, 60, 60];
        let theta = [1, 40, 40];
        for category in Category::ALL {
            assert_eq!(
                category_box(category, &buffer_shape, &theta).is_some(),
                !category.is_high(Axis::I)
            );
        }
        // No boundary inside the buffer on K: no low part on K
        let theta = [1, 40, 0];
        assert!(category_box(Category::HighJ, &buffer_shape, &theta).is_none());
        assert!(category_box(Category::HighJK, &buffer_shape, &theta).is_some());
    }

    #[test]
    fn category_serde() {
        let json = serde_json::to_string(&[Category::HighK, Category::HighIJK]).unwrap();
        assert_eq!(json, "[1,7]");
        assert_eq!(
            serde_json::from_str::<Vec<Category>>("[2,4]").unwrap(),
            vec![Category::HighJ, Category::HighI]
        );
        assert!(serde_json::from_str::<Vec<Category>>("[0]").is_err());
    }
}
