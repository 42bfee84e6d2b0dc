//! High-level operations.
//!
//! The driver side of ifacesim: loading components, running a simulation
//! from start to finish, checking declarations, and shaping the reports.
//! This is the only layer that reads files or decides between a report and
//! an error envelope.

pub mod check_decls;
pub mod loader;
pub mod report;
pub mod simulate;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::manifest::ManifestError;
use crate::core::registry::RegistryError;
use crate::decl::DeclError;
use crate::engine::EngineError;
use crate::util::diagnostic::{hints, Diagnostic, Note};

pub use check_decls::{check_decls, CheckDeclsParams, CheckDeclsReport, DeclarationStatus};
pub use loader::{
    ComponentLoader, ComponentRef, ComponentSource, DirLoader, DynamicAttrs, InMemoryLoader,
    LoadError,
};
pub use report::{render_human, to_json, AutoConnectReport, EndpointEntry, Envelope, InstallEntry};
pub use simulate::{simulate_auto_connect, AutoConnectParams};

/// A failure of the simulation itself, as opposed to a rejected connection.
///
/// Every variant ends the run and is reported as the error envelope.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum SimulationError {
    #[error("invalid parameters: {0}")]
    #[diagnostic(code(ifacesim::input::params))]
    InvalidParams(String),

    #[error(transparent)]
    #[diagnostic(code(ifacesim::input::load))]
    Load(#[from] LoadError),

    #[error("cannot parse snap.yaml of `{component}`: {source}")]
    #[diagnostic(code(ifacesim::input::manifest))]
    Manifest {
        component: String,
        #[source]
        source: ManifestError,
    },

    #[error(transparent)]
    #[diagnostic(code(ifacesim::decl::malformed))]
    Declaration(#[from] DeclError),

    #[error(transparent)]
    #[diagnostic(code(ifacesim::registry))]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    #[diagnostic(code(ifacesim::engine))]
    Engine(#[from] EngineError),
}

impl SimulationError {
    /// What to show on stderr when the run fails in human mode.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            SimulationError::InvalidParams(_) => diag.hint(hints::PARAMS),
            SimulationError::Load(LoadError::Io { path, .. })
            | SimulationError::Load(LoadError::Json { path, .. }) => diag
                .note(Note::File(path.clone()))
                .hint(hints::COMPONENT_LAYOUT),
            SimulationError::Load(LoadError::NotFound(id)) => diag
                .note(Note::Component(id.clone()))
                .hint(hints::COMPONENT_LAYOUT),
            SimulationError::Load(LoadError::UnknownEndpoint { component, .. })
            | SimulationError::Manifest { component, .. } => {
                diag.note(Note::Component(component.clone()))
            }
            SimulationError::Declaration(DeclError::MalformedDeclaration { context, .. }) => diag
                .note(Note::Rule(context.clone()))
                .hint(hints::CHECK_DECLS),
            SimulationError::Declaration(DeclError::ConflictingRecord { key, .. }) => {
                diag.note(Note::Component(key.clone()))
            }
            SimulationError::Registry(RegistryError::DuplicateComponent(name))
            | SimulationError::Registry(RegistryError::UnknownComponent(name)) => {
                diag.note(Note::Component(name.clone()))
            }
            SimulationError::Engine(EngineError::ChangeAborted { change, task, .. }) => diag.note(
                Note::Change(format!("\"{}\" rolled back after task \"{}\"", change, task)),
            ),
            SimulationError::Engine(EngineError::EngineStalled { .. }) => {
                diag.hint(hints::MAX_ITERATIONS)
            }
        }
    }
}
