use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{category::Category, volume::Point};

use super::{compute_zones, Zones, ZonesError};

/// The parameters of a rechunking plan.
///
/// ### Example
/// ```rust
/// # let JSON = r#"
/// {
///     "array_shape": [1, 120, 120],
///     "buffer_shape": [1, 60, 60],
///     "file_shape": [1, 40, 40],
///     "keep": [1]
/// }
/// # "#;
/// # use resplit::zones::ResplitConfiguration;
/// # let configuration: ResplitConfiguration = serde_json::from_str(JSON).unwrap();
/// # let zones = configuration.compute_zones().unwrap();
/// # assert_eq!(zones.regions()[&1].len(), 1);
/// ```
#[derive(Serialize, Deserialize, Clone, Eq, PartialEq, Debug, Display)]
#[serde(deny_unknown_fields)]
#[display("{}", serde_json::to_string(self).unwrap_or_default())]
pub struct ResplitConfiguration {
    /// The shape of the reconstructed array.
    pub array_shape: Point,
    /// The shape of the buffers the array is read in.
    pub buffer_shape: Point,
    /// The shape of the output files.
    pub file_shape: Point,
    /// The categories kept in memory and merged with their neighbours.
    #[serde(default)]
    pub keep: Vec<Category>,
}

impl ResplitConfiguration {
    /// Create a new configuration which keeps nothing.
    #[must_use]
    pub fn new(array_shape: Point, buffer_shape: Point, file_shape: Point) -> Self {
        Self {
            array_shape,
            buffer_shape,
            file_shape,
            keep: Vec::new(),
        }
    }

    /// Set the kept categories.
    #[must_use]
    pub fn with_keep(mut self, keep: Vec<Category>) -> Self {
        self.keep = keep;
        self
    }

    /// Compute the write zones of the configuration.
    ///
    /// # Errors
    /// See [`compute_zones`].
    pub fn compute_zones(&self) -> Result<Zones, ZonesError> {
        compute_zones(
            &self.buffer_shape,
            &self.file_shape,
            &self.array_shape,
            &self.keep,
        )
    }
}
