//! Per-run context.
//!
//! A RunContext is built fresh for every simulation run and passed by
//! reference to each stage. Nothing in it outlives the run.

use crate::decl::BaseDeclaration;

/// Default bound on task engine passes.
pub const DEFAULT_MAX_ENGINE_ITERATIONS: usize = 1000;

/// Name given to the system component that carries implicit slots.
pub const SYSTEM_COMPONENT_NAME: &str = "snapd";

/// The simulated device: model assertion plus optional store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceContext {
    /// Classic system (true) or Ubuntu Core style device (false)
    pub classic: bool,

    /// Brand account id
    pub brand: String,

    /// Model name
    pub model: String,

    /// Store id, if the model is tied to a brand store
    pub store: Option<String>,
}

impl DeviceContext {
    /// Create a device context for a brand/model pair.
    pub fn new(brand: impl Into<String>, model: impl Into<String>) -> Self {
        DeviceContext {
            classic: false,
            brand: brand.into(),
            model: model.into(),
            store: None,
        }
    }

    pub fn with_classic(mut self, classic: bool) -> Self {
        self.classic = classic;
        self
    }

    /// Set the store; an empty id means no store.
    pub fn with_store(mut self, store: Option<String>) -> Self {
        self.store = store.filter(|s| !s.is_empty());
        self
    }

    /// `brand/model` form used by `on-model` constraints.
    pub fn model_id(&self) -> String {
        format!("{}/{}", self.brand, self.model)
    }
}

/// Knobs that shape one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Maximum scheduler passes before the engine reports a stall
    pub max_engine_iterations: usize,

    /// Register the system component with its implicit slots
    pub system_component: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            max_engine_iterations: DEFAULT_MAX_ENGINE_ITERATIONS,
            system_component: true,
        }
    }
}

/// Everything a single simulation run needs besides its components.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub device: DeviceContext,
    pub base: BaseDeclaration,
    pub settings: RunSettings,
}

impl RunContext {
    pub fn new(device: DeviceContext, base: BaseDeclaration) -> Self {
        RunContext {
            device,
            base,
            settings: RunSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }
}
