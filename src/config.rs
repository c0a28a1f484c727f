//! Resplit global configuration options.

use std::{
    num::NonZeroUsize,
    sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// Global configuration options for the resplit crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
///
/// ## Validate Zones
///  > default: [`true`] in debug builds, [`false`] otherwise
///
/// If enabled, [`compute_zones`](crate::zones::compute_zones) validates that the volumes of every output file exactly tile it, before and after merging.
/// Validation compares every pair of volumes of an output file, so it can be slow for output files receiving many volumes.
///
/// ## Concurrency Configuration Options
/// ### Buffer Concurrent Limit
/// > default: [`std::thread::available_parallelism`]`()`
///
/// The maximum number of buffers decomposed and assigned concurrently.
///
/// ### File Concurrent Limit
/// > default: [`std::thread::available_parallelism`]`()`
///
/// The maximum number of output files merged concurrently.
///
/// A concurrent limit of zero is treated as one.
#[derive(Debug)]
pub struct Config {
    validate_zones: bool,
    buffer_concurrent_limit: usize,
    file_concurrent_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        let concurrency = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        Config {
            validate_zones: cfg!(debug_assertions),
            buffer_concurrent_limit: concurrency,
            file_concurrent_limit: concurrency,
        }
    }
}

impl Config {
    /// Get the [validate zones](#validate-zones) configuration.
    #[must_use]
    pub fn validate_zones(&self) -> bool {
        self.validate_zones
    }

    /// Set the [validate zones](#validate-zones) configuration.
    pub fn set_validate_zones(&mut self, validate_zones: bool) {
        self.validate_zones = validate_zones;
    }

    /// Get the [buffer concurrent limit](#buffer-concurrent-limit) configuration.
    #[must_use]
    pub fn buffer_concurrent_limit(&self) -> usize {
        self.buffer_concurrent_limit
    }

    /// Set the [buffer concurrent limit](#buffer-concurrent-limit) configuration.
    pub fn set_buffer_concurrent_limit(&mut self, concurrent_limit: usize) {
        self.buffer_concurrent_limit = concurrent_limit;
    }

    /// Get the [file concurrent limit](#file-concurrent-limit) configuration.
    #[must_use]
    pub fn file_concurrent_limit(&self) -> usize {
        self.file_concurrent_limit
    }

    /// Set the [file concurrent limit](#file-concurrent-limit) configuration.
    pub fn set_file_concurrent_limit(&mut self, concurrent_limit: usize) {
        self.file_concurrent_limit = concurrent_limit;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global resplit configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global resplit configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}
