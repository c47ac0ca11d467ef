//! Configuration for the permissions module.

use serde::Deserialize;

/// Largest id list the reference backend accepts in one `IN (...)` clause.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PermissionsConfig {
    /// Maximum number of ids sent to the store in one query. Values below 1
    /// are treated as 1.
    pub batch_size: usize,

    /// Chunk queries a single resolver call keeps in flight.
    pub chunk_concurrency: usize,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_concurrency: 4,
        }
    }
}
