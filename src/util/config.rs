//! Configuration file support for ifacesim.
//!
//! Two locations are read:
//! - Global: `<config dir>/ifacesim/config.toml` - User-wide defaults
//! - Project: `.ifacesim/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. Command-line flags
//! take precedence over both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::context::RunSettings;

/// ifacesim configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Simulation settings
    pub simulation: SimulationConfig,

    /// Output settings
    pub output: OutputConfig,
}

/// Simulation-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SimulationConfig {
    /// Cap on task engine passes
    pub max_engine_iterations: Option<usize>,

    /// Register the system snap carrying implicit slots
    pub system_snap: Option<bool>,

    /// Base declaration file replacing the built-in one
    pub base_declaration: Option<PathBuf>,
}

/// Output-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// `json` or `human`
    pub format: Option<String>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.simulation.max_engine_iterations.is_some() {
            self.simulation.max_engine_iterations = other.simulation.max_engine_iterations;
        }
        if other.simulation.system_snap.is_some() {
            self.simulation.system_snap = other.simulation.system_snap;
        }
        if other.simulation.base_declaration.is_some() {
            self.simulation.base_declaration = other.simulation.base_declaration;
        }

        if other.output.format.is_some() {
            self.output.format = other.output.format;
        }
    }

    /// Run settings with config values applied over the defaults.
    pub fn run_settings(&self) -> RunSettings {
        let defaults = RunSettings::default();
        RunSettings {
            max_engine_iterations: self
                .simulation
                .max_engine_iterations
                .unwrap_or(defaults.max_engine_iterations),
            system_component: self
                .simulation
                .system_snap
                .unwrap_or(defaults.system_component),
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.ifacesim/config.toml)
/// 2. Global config
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path.filter(|p| p.exists()) {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the project config path (.ifacesim/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".ifacesim").join("config.toml")
}
