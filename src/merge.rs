//! Merging of kept volumes.
//!
//! A kept category is a partial write which is cached in memory until the pieces completing it have been read from later buffers.
//! Its volume is then fused with those pieces so that the output file receives one larger write instead of several.
//!
//! The [merge rules](merge_rules) give, for each kept category, the axes along which it is fused with its neighbours.

use std::collections::BTreeMap;

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rayon_iter_concurrent_limit::iter_concurrent_limit;

use crate::{
    category::Category,
    volume::{Axis, Provenance, Volume},
};

/// Merge rules: the axes along which each kept category is fused with its neighbours.
pub type MergeRules = BTreeMap<Category, Vec<Axis>>;

/// Return the merge rules for the categories in `keep`.
///
/// Categories which are not kept have no rule and are left unmerged.
/// Category 3 is also fused along J if category 2 is kept, and categories 5, 6 and 7 are also fused along I if category 4 is kept.
#[must_use]
pub fn merge_rules(keep: &[Category]) -> MergeRules {
    let kept = |category| keep.contains(&category);
    let mut rules = MergeRules::new();
    for category in keep.iter().copied() {
        let mut axes = match category {
            Category::HighK | Category::HighJK | Category::HighIK => vec![Axis::K],
            Category::HighJ | Category::HighIJ => vec![Axis::J],
            Category::HighI => vec![Axis::I],
            Category::HighIJK => vec![Axis::K, Axis::J],
        };
        match category {
            Category::HighJK if kept(Category::HighJ) => axes.push(Axis::J),
            Category::HighIK | Category::HighIJ | Category::HighIJK if kept(Category::HighI) => {
                axes.push(Axis::I);
            }
            _ => {}
        }
        rules.insert(category, axes);
    }
    rules
}

/// Merge the kept volumes of one output file in place.
///
/// For each category with a rule, in ascending order, every volume of that category is taken out of `volumes`, fused with its neighbours, and the result is appended back.
/// A volume without a neighbour is kept as is.
pub fn merge_file_volumes(volumes: &mut Vec<Volume>, rules: &MergeRules) {
    for (&category, axes) in rules {
        let (pending, remaining): (Vec<_>, Vec<_>) = std::mem::take(volumes)
            .into_iter()
            .partition(|volume| volume.provenance() == Provenance::Category(category));
        *volumes = remaining;
        for volume in pending {
            let merged = merge_along(volume, axes, volumes);
            volumes.extend(merged);
        }
    }
}

/// Merge the kept volumes of every output file.
///
/// Output files are independent, so they are merged concurrently.
/// This must only run once all buffers have been assigned, since a neighbour which has not been assigned yet cannot be distinguished from one that does not exist.
pub fn merge_cached_volumes(
    arrays: &mut BTreeMap<u64, Vec<Volume>>,
    rules: &MergeRules,
    concurrent_limit: usize,
) {
    if rules.is_empty() {
        return;
    }
    let files: Vec<(&u64, &mut Vec<Volume>)> = arrays.iter_mut().collect();
    iter_concurrent_limit!(concurrent_limit, files, for_each, |(_, volumes)| {
        merge_file_volumes(volumes, rules);
    });
}

/// Fuse `volume` with its neighbours in `remaining` along `axes`.
///
/// The last axis is peeled off: the volume is fused along the other axes, its neighbour along the peeled axis is fused along the other axes, and the two results are fused.
/// Returns the pieces that could not be fused together, or a single merged volume.
fn merge_along(volume: Volume, axes: &[Axis], remaining: &mut Vec<Volume>) -> Vec<Volume> {
    let Some((&axis, axes_other)) = axes.split_last() else {
        return vec![volume];
    };
    let neighbour_corner = volume.neighbour_corner(axis);
    let here = merge_along(volume, axes_other, remaining);
    let Some(position) = remaining
        .iter()
        .position(|other| other.p1() == &neighbour_corner)
    else {
        log::debug!("no neighbour of {volume} along {axis}, keeping it unmerged");
        return here;
    };
    let neighbour = remaining.remove(position);
    let there = merge_along(neighbour, axes_other, remaining);
    fuse(here, there, axis)
}

/// Fuse two sides of a merge if their union is a single volume.
fn fuse(mut here: Vec<Volume>, mut there: Vec<Volume>, axis: Axis) -> Vec<Volume> {
    if let ([a], [b]) = (here.as_slice(), there.as_slice()) {
        if a.is_adjacent(b, axis) {
            return vec![a.merge(b)];
        }
    }
    log::debug!("cannot fuse {here:?} with {there:?} along {axis}");
    here.append(&mut there);
    here
}
