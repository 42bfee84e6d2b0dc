//! Global context for ifacesim invocations.
//!
//! Holds the working directory, output preferences, and where configuration
//! lives. Built once per process by the binary; the library never reads it.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::util::config::{load_config, project_config_path, Config};

/// Project directories for ifacesim
static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("io", "ifacesim", "ifacesim"));

/// Global context containing configuration paths and output settings.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Directory holding the global config.toml, if the platform has one
    config_dir: Option<PathBuf>,

    /// Whether to use verbose output
    verbose: bool,

    /// Whether to use colors in output
    color: bool,
}

impl GlobalContext {
    /// Create a new GlobalContext with defaults.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        GlobalContext {
            cwd,
            config_dir: PROJECT_DIRS
                .as_ref()
                .map(|dirs| dirs.config_dir().to_path_buf()),
            verbose: false,
            color: true,
        }
    }

    /// Override the global config directory.
    pub fn with_config_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config_dir = dir;
        self
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the global configuration file path.
    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.config_dir.as_ref().map(|dir| dir.join("config.toml"))
    }

    /// Get the project configuration file path.
    pub fn project_config_path(&self) -> PathBuf {
        project_config_path(&self.cwd)
    }

    /// Load the merged global and project configuration.
    pub fn config(&self) -> Config {
        load_config(
            self.global_config_path().as_deref(),
            &self.project_config_path(),
        )
    }

    /// Resolve a path given on the command line or in config against cwd.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if color output is enabled.
    pub fn color(&self) -> bool {
        self.color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_paths() {
        let ctx = GlobalContext::new().unwrap();
        assert!(ctx.cwd().is_absolute());
        assert!(ctx.project_config_path().ends_with(".ifacesim/config.toml"));
        assert_eq!(ctx.resolve(Path::new("scenarios")), ctx.cwd().join("scenarios"));
    }

    #[test]
    fn test_context_config() {
        let tmp = TempDir::new().unwrap();
        let global = tmp.path().join("global");
        std::fs::create_dir_all(&global).unwrap();
        std::fs::write(
            global.join("config.toml"),
            "[output]\nformat = \"human\"\n",
        )
        .unwrap();

        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).with_config_dir(Some(global));
        assert_eq!(ctx.config().output.format.as_deref(), Some("human"));

        let ctx = ctx.with_config_dir(None);
        assert!(ctx.global_config_path().is_none());
        assert_eq!(ctx.config(), Config::default());
    }
}
