//! Configuration system for the tree-walk engine.
//!
//! Load engine configuration from TOML or YAML files so that the export
//! buffer budget, thread count, and hsml convergence ceiling can be tuned
//! without code changes.
//!
//! # Examples
//!
//! Load configuration from a TOML string:
//!
//! ```
//! use treewalk_config::EngineConfig;
//!
//! let config = EngineConfig::from_toml_str(r#"
//!     import_buffer_boost = 2
//!     bunch_size = 20000
//!     thread_count = "auto"
//!
//!     [hsml]
//!     target_neighbours = 32
//!     tolerance = 2
//!     max_iterations = 60
//! "#).unwrap();
//!
//! assert_eq!(config.import_buffer_boost, 2);
//! assert_eq!(config.hsml.max_iterations, 60);
//! ```
//!
//! Use default configuration when a file is missing:
//!
//! ```
//! use treewalk_config::EngineConfig;
//!
//! let config = EngineConfig::load("treewalk.toml").unwrap_or_default();
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Thread count configuration for the phase runners.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadCount {
    /// One thread per available core.
    #[default]
    Auto,
    /// A specific worker thread count.
    Count(usize),
}

impl ThreadCount {
    /// Resolves to a concrete thread count, defaulting to
    /// `std::thread::available_parallelism()` for `Auto`.
    pub fn resolve(&self) -> usize {
        match self {
            ThreadCount::Auto => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            ThreadCount::Count(n) => (*n).max(1),
        }
    }
}

/// Convergence configuration for the adaptive hsml loop.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HsmlLoopConfig {
    /// Desired neighbour count kernels converge towards.
    pub target_neighbours: u32,
    /// Acceptable ± tolerance around `target_neighbours`.
    #[serde(default = "default_tolerance")]
    pub tolerance: u32,
    /// Iteration ceiling; exceeding it is `TreeWalkError::Convergence`
    /// (fatal).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_tolerance() -> u32 {
    2
}

fn default_max_iterations() -> u32 {
    60
}

impl Default for HsmlLoopConfig {
    fn default() -> Self {
        Self {
            target_neighbours: 32,
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
        }
    }
}

/// Export/import buffer sizing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct BufferConfig {
    /// Bytes of free memory held back as a safety margin before sizing the
    /// export/import buffers.
    #[serde(default = "default_safety_margin_bytes")]
    pub safety_margin_bytes: u64,
    /// MPI-safe ceiling on a single send/recv transfer (~3 GiB by
    /// default, per the source protocol's comment on 32-bit `int` counts).
    #[serde(default = "default_mpi_transfer_ceiling_bytes")]
    pub mpi_transfer_ceiling_bytes: u64,
    /// Minimum number of export records that must fit or the engine
    /// aborts with `TreeWalkError::Configuration`.
    #[serde(default = "default_min_export_records")]
    pub min_export_records: usize,
}

fn default_safety_margin_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_mpi_transfer_ceiling_bytes() -> u64 {
    3 * 1024 * 1024 * 1024
}

fn default_min_export_records() -> usize {
    100
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            safety_margin_bytes: default_safety_margin_bytes(),
            mpi_transfer_ceiling_bytes: default_mpi_transfer_ceiling_bytes(),
            min_export_records: default_min_export_records(),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    /// Extra budget factor for the import buffer when import pressure is
    /// expected to exceed export pressure.
    #[serde(default)]
    pub import_buffer_boost: u32,

    /// Per-thread export record cap (`BunchSize`); the unit of
    /// back-pressure on the Top-tree Runner.
    #[serde(default = "default_bunch_size")]
    pub bunch_size: usize,

    /// Worker thread count for the phase runners.
    #[serde(default)]
    pub thread_count: ThreadCount,

    /// Export/import buffer sizing knobs.
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Adaptive hsml loop convergence configuration. `None` disables the
    /// outer convergence loop entirely (a bare `run` is still usable for
    /// kernels, like gravity, that don't search for a neighbour count).
    pub hsml: Option<HsmlLoopConfig>,

    /// Enables the debug-only ID echo check between a query and its
    /// reduced result.
    #[serde(default)]
    pub debug_checks: bool,
}

impl EngineConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file, falling back to caller
    /// handling (e.g. `.unwrap_or_default()`) if the file is missing.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Sets the import buffer boost.
    pub fn with_import_buffer_boost(mut self, boost: u32) -> Self {
        self.import_buffer_boost = boost;
        self
    }

    /// Sets the per-thread export bunch size.
    pub fn with_bunch_size(mut self, bunch_size: usize) -> Self {
        self.bunch_size = bunch_size;
        self
    }

    /// Sets the hsml convergence loop configuration.
    pub fn with_hsml(mut self, hsml: HsmlLoopConfig) -> Self {
        self.hsml = Some(hsml);
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bunch_size == 0 {
            return Err(ConfigError::Invalid(
                "bunch_size must be greater than zero".to_string(),
            ));
        }
        if self.buffer.min_export_records == 0 {
            return Err(ConfigError::Invalid(
                "buffer.min_export_records must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_bunch_size() -> usize {
    20_000
}

#[cfg(test)]
mod tests;
