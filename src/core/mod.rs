//! Core data structures.
//!
//! This module contains the foundational types used throughout ifacesim:
//! - Endpoint attributes and attribute paths
//! - Components with their plugs and slots
//! - Component manifests
//! - The component registry
//! - The per-run context (device model, store, settings)

pub mod attrs;
pub mod component;
pub mod context;
pub mod manifest;
pub mod registry;

pub use attrs::{AttrPath, Attrs};
pub use component::{
    Component, ComponentIdentity, ComponentType, Direction, Endpoint, PlugRef, SlotRef,
};
pub use context::{DeviceContext, RunContext, RunSettings};
pub use manifest::{ComponentManifest, ManifestError};
pub use registry::{ComponentRegistry, RegistryError};
