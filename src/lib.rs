//! A rust library for planning the rechunking of three dimensional arrays.
//!
//! An array of shape `R` is read in buffers of shape `B` and written to output files of shape `O`.
//! The buffer and file grids are not aligned, so a buffer may straddle several output files and an output file may receive parts of several buffers.
//! `resplit` computes which volume of which buffer goes to which output file, without performing any I/O.
//!
//! ## Overview
//! Each buffer is split at its [theta](decomposition::theta) into pieces that each lie within exactly one output file:
//!  - [categorical volumes](category::Category), which take the high part of the buffer on at least one axis, and
//!  - [hidden volumes](decomposition::hidden_volumes), which tile the aligned core of the buffer.
//!
//! The pieces are [assigned](assignment) to the output files that contain them.
//! A caller can keep some categories in memory until the pieces completing them have been read from later buffers.
//! Kept categories are [merged](merge) with their neighbours so that each output file receives fewer, larger writes.
//!
//! [`compute_zones`](zones::compute_zones) runs the whole pipeline and returns the [`Zones`](zones::Zones) of every output file, in global coordinates for reading and file-local coordinates for writing.
//!
//! ## Example
//! ```rust
//! # use resplit::{category::Category, zones::compute_zones};
//! let buffer_shape = [1, 60, 60];
//! let file_shape = [1, 40, 40];
//! let array_shape = [1, 120, 120];
//! let zones = compute_zones(&buffer_shape, &file_shape, &array_shape, &[Category::HighK])?;
//! for (file, regions) in zones.regions() {
//!     println!("output file {file}: {regions:?}");
//! }
//! # Ok::<(), resplit::zones::ZonesError>(())
//! ```
//!
//! ## Conventions
//! Axes are named I, J and K, with K varying fastest.
//! Grid cells are named by their row-major linear index, see [`grid::ravel_indices`].
//!
//! ## Licence
//! `resplit` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.
//!
//! Unless you explicitly state otherwise, any contribution intentionally submitted for inclusion in the work by you, as defined in the Apache-2.0 license, shall be dual licensed as above, without any additional terms or conditions.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]

pub mod assignment;
pub mod category;
pub mod config;
pub mod decomposition;
pub mod grid;
pub mod merge;
pub mod volume;
pub mod zones;

pub use zones::{compute_zones, compute_zones_naive, ResplitConfiguration, Zones, ZonesError};
