//! Configuration and option types for the index engine.
//!
//! This module provides streamlined, serializable types for configuring
//! index builds and describing index state.

use crate::progress::ProgressToken;
use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Default number of rows fetched per chunk during builds and scans.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default symmetric padding applied to query bounds during manual
/// scans, absorbing floating-point round-trip error.
pub const DEFAULT_TOLERANCE: f64 = 1e-14;

/// Index engine configuration.
///
/// This configuration is designed to be easily serializable and loadable
/// from JSON, TOML, or other formats while keeping complexity minimal.
///
/// # Example
///
/// ```rust
/// use featurebox::IndexConfig;
///
/// // Create default config
/// let config = IndexConfig::default();
///
/// // Load from JSON
/// let json = r#"{
///     "chunk_size": 500,
///     "geodesic": true
/// }"#;
/// let config: IndexConfig = serde_json::from_str(json).unwrap();
/// assert_eq!(config.chunk_size, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Rows per chunk for index builds and manual scans
    #[serde(default = "IndexConfig::default_chunk_size")]
    pub chunk_size: usize,

    /// Symmetric tolerance padding for manual-scan intersection tests
    #[serde(default = "IndexConfig::default_tolerance")]
    pub tolerance: f64,

    /// Store geodesic envelopes (antimeridian/pole aware) instead of
    /// planar ones. Fixed at build time: changing it requires a
    /// rebuild, since it changes what the index stores.
    #[serde(default)]
    pub geodesic: bool,
}

impl IndexConfig {
    const fn default_chunk_size() -> usize {
        DEFAULT_CHUNK_SIZE
    }

    const fn default_tolerance() -> f64 {
        DEFAULT_TOLERANCE
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "Chunk size must be greater than zero");
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        assert!(
            tolerance.is_finite() && tolerance >= 0.0,
            "Tolerance must be finite and non-negative"
        );
        self.tolerance = tolerance;
        self
    }

    pub fn with_geodesic(mut self, geodesic: bool) -> Self {
        self.geodesic = geodesic;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("Chunk size must be greater than zero".to_string());
        }

        if !self.tolerance.is_finite() {
            return Err("Tolerance must be finite (not NaN or infinity)".to_string());
        }
        if self.tolerance < 0.0 {
            return Err("Tolerance must be non-negative".to_string());
        }

        Ok(())
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: IndexConfig = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: IndexConfig = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::default_chunk_size(),
            tolerance: Self::default_tolerance(),
            geodesic: false,
        }
    }
}

/// Options for a full index build.
#[derive(Clone, Default)]
pub struct IndexOptions {
    /// Drop and rebuild even if the table is already indexed
    pub force: bool,
    /// Cooperative progress/cancellation token polled during the build
    pub progress: Option<Arc<dyn ProgressToken>>,
}

impl IndexOptions {
    /// Options for a forced rebuild
    pub fn force() -> Self {
        Self {
            force: true,
            progress: None,
        }
    }

    /// Attach a progress/cancellation token
    pub fn with_progress(mut self, progress: Arc<dyn ProgressToken>) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl fmt::Debug for IndexOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexOptions")
            .field("force", &self.force)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Snapshot of a table's index state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatus {
    /// Whether the table carries a completed index
    pub indexed: bool,
    /// When the index was last successfully built or refreshed
    pub last_indexed: Option<SystemTime>,
    /// Number of geometry entries currently stored
    pub entry_count: u64,
}
