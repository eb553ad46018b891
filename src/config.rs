//! Engine configuration.
//!
//! Construct a [`DepRuntime`](crate::runtime::DepRuntime) through
//! [`DepRuntimeBuilder`](crate::runtime::DepRuntimeBuilder) rather than
//! assembling one from a [`DepConfig`] directly.
//!
//! # Defaults
//!
//! | Field | Default |
//! |-------|---------|
//! | `bucket_count` | 1023 |
//! | `entry_pool_capacity` | 64 |

use thiserror::Error;

/// Rejected configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The dependency table needs at least one bucket.
    #[error("bucket_count must be at least 1")]
    ZeroBuckets,
}

impl From<ConfigError> for crate::error::Error {
    fn from(err: ConfigError) -> Self {
        Self::new(crate::error::ErrorKind::InvalidConfig)
            .with_message(err.to_string())
            .with_source(err)
    }
}

/// Configuration of the dependency engine.
#[derive(Debug, Clone)]
pub struct DepConfig {
    /// Number of buckets in each group's dependency table.
    ///
    /// The bucket array is fixed at table creation; entries chain within
    /// a bucket, so this bounds slot contention, not capacity.
    pub bucket_count: usize,
    /// Entry slots preallocated per dependency table.
    pub entry_pool_capacity: usize,
}

impl DepConfig {
    /// Checks the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket_count == 0 {
            return Err(ConfigError::ZeroBuckets);
        }
        Ok(())
    }
}

impl Default for DepConfig {
    fn default() -> Self {
        Self {
            bucket_count: 1023,
            entry_pool_capacity: 64,
        }
    }
}
