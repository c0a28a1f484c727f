//! Buffer decomposition.
//!
//! A buffer is split against the output file grid into pieces that each lie within exactly one output file:
//!  - the [categorical volumes](main_volumes), which take the high part of the buffer on at least one axis, and
//!  - the [hidden volumes](hidden_volumes), which tile the aligned core of the buffer.
//!
//! The split point on each axis is the buffer [theta](theta).

use itertools::{iproduct, Itertools};

use crate::{
    category::{category_box, Category},
    volume::{Axis, Point, Provenance, Volume},
};

/// The number of the first hidden volume. Ids 1 to 7 are taken by the categories.
pub const FIRST_HIDDEN_VOLUME: u64 = 8;

/// Return the theta of the buffer at `buffer_indices` in the buffer grid.
///
/// On each axis, theta is the distance from the lower face of the buffer to the last output file boundary inside it.
/// It is equal to the buffer shape if the buffer and file shape match on that axis, and zero if no file boundary lies inside the buffer.
#[must_use]
pub fn theta(buffer_indices: &Point, buffer_shape: &Point, file_shape: &Point) -> Point {
    [0, 1, 2].map(|d| {
        let upper = (buffer_indices[d] + 1) * buffer_shape[d];
        let mut c = upper % file_shape[d];
        if c == 0 && buffer_shape[d] != file_shape[d] {
            c = file_shape[d];
        }
        buffer_shape[d].saturating_sub(c)
    })
}

/// Return the output file boundaries within `[0, theta]` on one axis, in ascending order.
///
/// The points are spaced by `file_size` back from `theta`, and always include `0`.
#[must_use]
pub fn cut_points(theta: u64, file_size: u64) -> Vec<u64> {
    let mut points = Vec::with_capacity(usize::try_from(theta / file_size).unwrap_or(0) + 2);
    let mut point = theta;
    points.push(point);
    for _ in 0..theta / file_size {
        point -= file_size;
        points.push(point);
    }
    if point != 0 {
        points.push(0);
    }
    points.reverse();
    points
}

/// Return the intervals between consecutive [`cut_points`].
fn low_intervals(theta: u64, file_size: u64) -> Vec<(u64, u64)> {
    cut_points(theta, file_size)
        .into_iter()
        .tuple_windows()
        .collect()
}

/// Return the categorical volumes of a buffer in buffer coordinates.
///
/// Each category box is further split on its low axes at the [`cut_points`] so that every piece lies within one output file.
/// That split only has an effect if the low part of an axis spans more than one output file.
/// Empty categories are omitted.
#[must_use]
pub fn main_volumes(buffer_shape: &Point, file_shape: &Point, theta: &Point) -> Vec<Volume> {
    let mut volumes = Vec::with_capacity(Category::ALL.len());
    for category in Category::ALL {
        let Some(category_box) = category_box(category, buffer_shape, theta) else {
            continue;
        };
        let [ii, ij, ik] = Axis::ALL.map(|axis| {
            let d = axis.index();
            if category.is_high(axis) {
                vec![(category_box.p1()[d], category_box.p2()[d])]
            } else {
                low_intervals(theta[d], file_shape[d])
            }
        });
        volumes.extend(iproduct!(ii, ij, ik).map(|((i0, i1), (j0, j1), (k0, k1))| {
            Volume::new_unchecked(category_box.provenance(), [i0, j0, k0], [i1, j1, k1])
        }));
    }
    volumes
}

/// Return the hidden volumes of a buffer in buffer coordinates.
///
/// Hidden volumes tile the aligned core `[0, theta)` of the buffer, which may span several output files.
/// They are numbered from [`FIRST_HIDDEN_VOLUME`], with K varying fastest.
#[must_use]
pub fn hidden_volumes(theta: &Point, file_shape: &Point) -> Vec<Volume> {
    let [ii, ij, ik] = [0, 1, 2].map(|d| low_intervals(theta[d], file_shape[d]));
    iproduct!(ii, ij, ik)
        .zip(FIRST_HIDDEN_VOLUME..)
        .map(|(((i0, i1), (j0, j1), (k0, k1)), number)| {
            Volume::new_unchecked(Provenance::Hidden(number), [i0, j0, k0], [i1, j1, k1])
        })
        .collect()
}

/// Decompose the buffer at `buffer_indices` and return its pieces in global coordinates.
///
/// Categorical volumes come first in ascending category order, followed by the hidden volumes.
#[must_use]
pub fn decompose_buffer(buffer_indices: &Point, buffer_shape: &Point, file_shape: &Point) -> Vec<Volume> {
    let theta = theta(buffer_indices, buffer_shape, file_shape);
    let offset = [0, 1, 2].map(|d| buffer_shape[d] * buffer_indices[d]);
    let mut volumes = main_volumes(buffer_shape, file_shape, &theta);
    volumes.extend(hidden_volumes(&theta, file_shape));
    log::trace!(
        "buffer {buffer_indices:?} theta {theta:?}: {} volumes",
        volumes.len()
    );
    volumes
        .into_iter()
        .map(|volume| volume.offset(&offset))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(volumes: &[Volume]) -> Vec<u8> {
        volumes
            .iter()
            .filter_map(|volume| volume.provenance().category())
            .map(Category::id)
            .collect()
    }

    #[test]
    fn decomposition_theta() {
        let b = [1, 60, 60];
        let o = [1, 40, 40];
        assert_eq!(theta(&[0, 0, 0], &b, &o), [1, 40, 40]);
        assert_eq!(theta(&[0, 0, 1], &b, &o), [1, 40, 20]);
        assert_eq!(theta(&[0, 1, 1], &b, &o), [1, 20, 20]);

        // Buffer smaller than the output file
        let b = [30, 30, 30];
        let o = [40, 40, 40];
        assert_eq!(theta(&[0, 1, 2], &b, &o), [0, 10, 20]);
        assert_eq!(theta(&[3, 3, 3], &b, &o), [0, 0, 0]);

        // Buffer a multiple of the output file
        assert_eq!(theta(&[0, 1, 2], &[80, 80, 80], &[40, 40, 40]), [40, 40, 40]);
    }

    #[test]
    fn decomposition_theta_bounds() {
        for b in 1..=12 {
            for o in 1..=12 {
                let buffer_shape = [b, b, b];
                let file_shape = [o, o, o];
                for index in 0..o {
                    let t = theta(&[index, index, index], &buffer_shape, &file_shape);
                    assert!(t.iter().all(|&t| t <= b));
                    if b == o {
                        assert_eq!(t, buffer_shape);
                    }
                }
            }
        }
    }

    #[test]
    fn decomposition_cut_points() {
        assert_eq!(cut_points(40, 40), vec![0, 40]);
        assert_eq!(cut_points(1, 1), vec![0, 1]);
        assert_eq!(cut_points(90, 40), vec![0, 10, 50, 90]);
        assert_eq!(cut_points(80, 40), vec![0, 40, 80]);
        assert_eq!(cut_points(20, 40), vec![0, 20]);
        assert_eq!(cut_points(0, 40), vec![0]);
    }

    #[test]
    fn decomposition_boundary_case() {
        let b = [1, 60, 60];
        let o = [1, 40, 40];
        let t = theta(&[0, 0, 0], &b, &o);
        let main = main_volumes(&b, &o, &t);
        assert_eq!(categories(&main), vec![1, 2, 3]);
        let hidden = hidden_volumes(&t, &o);
        assert_eq!(hidden.len(), 1);
        assert_eq!(hidden[0].provenance(), Provenance::Hidden(FIRST_HIDDEN_VOLUME));
        assert_eq!(hidden[0].to_ranges(), [0..1, 0..40, 0..40]);
        assert_eq!(main[0].to_ranges(), [0..1, 0..40, 40..60]);
        assert_eq!(main[1].to_ranges(), [0..1, 40..60, 0..40]);
        assert_eq!(main[2].to_ranges(), [0..1, 40..60, 40..60]);
    }

    #[test]
    fn decomposition_degenerate_axis() {
        // Matching buffer and file shape on I and J: only K is ever split
        let b = [20, 40, 60];
        let o = [20, 40, 40];
        for k in 0..2 {
            let volumes = decompose_buffer(&[1, 1, k], &b, &o);
            for volume in &volumes {
                assert_eq!(volume.shape()[0], 20);
                assert_eq!(volume.shape()[1], 40);
            }
            assert_eq!(categories(&volumes), vec![1]);
        }
    }

    #[test]
    fn decomposition_hidden_volumes() {
        // The aligned core spans 2 x 3 output files
        let t = [1, 80, 100];
        let o = [1, 40, 40];
        let hidden = hidden_volumes(&t, &o);
        assert_eq!(hidden.len(), 6);
        assert_eq!(hidden[0].to_ranges(), [0..1, 0..40, 0..20]);
        assert_eq!(hidden[1].to_ranges(), [0..1, 0..40, 20..60]);
        assert_eq!(hidden[5].to_ranges(), [0..1, 40..80, 60..100]);
        assert_eq!(hidden[5].provenance(), Provenance::Hidden(13));
        assert!(hidden_volumes(&[1, 0, 100], &o).is_empty());
    }

    #[test]
    fn decomposition_low_part_split() {
        // theta 80 > file size 40: category 1 is split on J
        let b = [1, 100, 100];
        let o = [1, 40, 40];
        let t = theta(&[0, 0, 0], &b, &o);
        assert_eq!(t, [1, 80, 80]);
        let main = main_volumes(&b, &o, &t);
        assert_eq!(categories(&main), vec![1, 1, 2, 2, 3]);
        assert_eq!(main[0].to_ranges(), [0..1, 0..40, 80..100]);
        assert_eq!(main[1].to_ranges(), [0..1, 40..80, 80..100]);
    }

    #[test]
    fn decomposition_tiles_buffer() {
        for (b, o) in [
            ([60, 60, 60], [40, 40, 40]),
            ([40, 60, 60], [40, 40, 40]),
            ([30, 50, 100], [20, 40, 40]),
            ([10, 10, 10], [40, 40, 40]),
        ] {
            for indices in [[0, 0, 0], [1, 2, 3], [3, 1, 0]] {
                let volumes = decompose_buffer(&indices, &b, &o);
                let total: u64 = volumes.iter().map(Volume::num_elements).sum();
                assert_eq!(total, b.iter().product::<u64>());
                assert!(volumes.iter().all(|v| !v.is_empty()));
                for (x, y) in volumes.iter().tuple_combinations() {
                    assert!(!x.overlaps(y), "{x} overlaps {y}");
                }
            }
        }
    }
}
