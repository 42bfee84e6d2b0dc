//! ifacesim - an offline simulator for interface auto-connection decisions
//!
//! Given a target component, its companions and a device model, this crate
//! decides which plugs and slots may be installed, which pairs would be
//! auto-connected, and why every other candidate pair was rejected.

pub mod core;
pub mod decl;
pub mod engine;
pub mod matcher;
pub mod ops;
pub mod policy;
pub mod util;

/// Fixtures and mock backends for unit tests.
#[cfg(test)]
pub mod test_support;

pub use core::{
    component::Component, context::DeviceContext, context::RunContext,
    registry::ComponentRegistry,
};
pub use decl::BaseDeclaration;
pub use ops::{simulate_auto_connect, AutoConnectParams, AutoConnectReport, SimulationError};
pub use util::context::GlobalContext;
