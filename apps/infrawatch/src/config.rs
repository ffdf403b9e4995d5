//! # Configuration Loading
//!
//! Reads an [`EngineConfig`] from TOML and keeps the active one behind a
//! swappable handle.
//!
//! Every table is optional; missing keys fall back to the compiled-in
//! thresholds:
//!
//! ```toml
//! [stage]
//! coverage_sustainable = 1.0
//! s0_min_conditions = 3
//!
//! [signals]
//! coverage_boundaries = [0.3, 0.7, 1.0]
//! crossing_basis = "lower_bound"
//!
//! [[indices]]
//! name = "gpu_hourly_index"
//! weights = { h100 = 0.6, a100 = 0.4 }
//! ```

use infrawatch_core::{EngineConfig, InfraWatchError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Parse and validate a TOML config.
pub fn parse(text: &str) -> Result<EngineConfig, InfraWatchError> {
    let config: EngineConfig = toml::from_str(text)
        .map_err(|e| InfraWatchError::InvalidConfig(format!("TOML: {}", e)))?;
    config.validate()?;
    Ok(config)
}

/// Read, parse and validate a TOML config file.
pub fn load(path: &Path) -> Result<EngineConfig, InfraWatchError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        InfraWatchError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
    })?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(InfraWatchError::InvalidConfig(format!(
            "Config file size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_CONFIG_FILE_SIZE
        )));
    }

    let text = std::fs::read_to_string(path).map_err(|e| {
        InfraWatchError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
    })?;
    parse(&text)
}

// =============================================================================
// CONFIG HANDLE
// =============================================================================

/// Shared, atomically swappable engine configuration.
///
/// Readers take one `Arc` per cycle and keep it for the whole cycle, so a
/// swap never lands halfway through an evaluation. A candidate config is
/// validated before the swap; a bad one leaves the current config in place.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    current: Arc<RwLock<Arc<EngineConfig>>>,
    source: Option<PathBuf>,
}

impl ConfigHandle {
    /// Wrap an in-memory config, validating it.
    pub fn new(config: EngineConfig) -> Result<Self, InfraWatchError> {
        config.validate()?;
        Ok(Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
            source: None,
        })
    }

    /// Load from `path`, or use the defaults when no path is given.
    pub fn open(path: Option<&Path>) -> Result<Self, InfraWatchError> {
        match path {
            Some(path) => {
                let config = load(path)?;
                tracing::info!(path = %path.display(), "Loaded engine config");
                Ok(Self {
                    current: Arc::new(RwLock::new(Arc::new(config))),
                    source: Some(path.to_path_buf()),
                })
            }
            None => {
                tracing::debug!("No config file given, using built-in thresholds");
                Self::new(EngineConfig::default())
            }
        }
    }

    /// File the config was loaded from, if any.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Snapshot of the active config.
    #[must_use]
    pub fn current(&self) -> Arc<EngineConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate `config` and make it the active one.
    pub fn replace(&self, config: EngineConfig) -> Result<(), InfraWatchError> {
        config.validate()?;
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(config);
        Ok(())
    }

    /// Re-read the source file and swap it in if it changed and is valid.
    ///
    /// Returns `Ok(true)` when a new config was swapped in. On error the
    /// active config is untouched.
    pub fn reload(&self) -> Result<bool, InfraWatchError> {
        let Some(path) = self.source.as_deref() else {
            return Ok(false);
        };

        let candidate = load(path)?;
        if *self.current() == candidate {
            return Ok(false);
        }

        self.replace(candidate)?;
        tracing::info!(path = %path.display(), "Engine config reloaded");
        Ok(true)
    }
}

// =============================================================================
// TESTS
// =============================================================================
