//! Command implementations

pub mod auto_connections;
pub mod check_decls;
pub mod completions;

use std::path::Path;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

use ifacesim::core::context::RunSettings;
use ifacesim::decl::BaseDeclaration;
use ifacesim::ops::{to_json, DirLoader, Envelope, LoadError, SimulationError};
use ifacesim::util::diagnostic::emit;
use ifacesim::GlobalContext;

use crate::cli::{GlobalOptions, OutputFormat};

/// Everything an operation needs, resolved from flags and config.
pub struct Session {
    pub loader: DirLoader,
    pub base_declaration: Option<std::path::PathBuf>,
    pub settings: RunSettings,
    pub format: OutputFormat,
    pub color: bool,
}

impl Session {
    /// Flags override project config, which overrides global config.
    pub fn new(gctx: &GlobalContext, options: &GlobalOptions) -> Session {
        let config = gctx.config();

        let format = options.format.unwrap_or_else(|| {
            match config.output.format.as_deref() {
                None | Some("json") => OutputFormat::Json,
                Some("human") => OutputFormat::Human,
                Some(other) => {
                    tracing::warn!("unknown output format `{}` in config, using json", other);
                    OutputFormat::Json
                }
            }
        });

        let base_declaration = options
            .base_declaration
            .clone()
            .or_else(|| config.simulation.base_declaration.clone())
            .map(|p| gctx.resolve(&p));

        Session {
            loader: DirLoader::new(gctx.resolve(&options.dir)),
            base_declaration,
            settings: config.run_settings(),
            format,
            color: gctx.color(),
        }
    }

    /// The configured base declaration, or the built-in one.
    pub fn base(&self) -> Result<BaseDeclaration, SimulationError> {
        match &self.base_declaration {
            Some(path) => load_base(path),
            None => Ok(BaseDeclaration::builtin()?),
        }
    }

    /// Write a result as the report or the error envelope. Never fails the
    /// process for a simulation error.
    pub fn emit<T: Serialize>(
        &self,
        result: Result<T, SimulationError>,
        human: impl FnOnce(&T) -> String,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                if let Err(e) = &result {
                    tracing::debug!("simulation failed: {}", e);
                }
                print!("{}", to_json(&Envelope::from_result(result))?);
            }
            OutputFormat::Human => match result {
                Ok(report) => print!("{}", human(&report)),
                Err(e) => emit(&e.to_diagnostic(), self.color),
            },
        }
        Ok(())
    }
}

fn load_base(path: &Path) -> Result<BaseDeclaration, SimulationError> {
    tracing::debug!("using base declaration {}", path.display());
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BaseDeclaration::from_json_str(&text)?)
}

/// Decode operation parameters. A bad document is an input error.
pub fn parse_params<T: DeserializeOwned>(params: &str) -> Result<T, SimulationError> {
    serde_json::from_str(params).map_err(|e| SimulationError::InvalidParams(e.to_string()))
}
