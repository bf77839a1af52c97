//! Collect core configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the collect buffer and dispatcher.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Bulk-events endpoint URL.
    pub collect_url: String,

    /// Path of the on-disk event cache (one file per buffer instance).
    pub cache_path: PathBuf,

    /// Disk cache ceiling in bytes. Appends that would cross it are skipped;
    /// the in-memory buffer stays the source of truth.
    pub max_cache_bytes: u64,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            collect_url: "https://collect.beacon-analytics.io/v1/events".to_string(),
            cache_path: PathBuf::from("eventcache"),
            max_cache_bytes: 5 * 1024 * 1024,
        }
    }
}
