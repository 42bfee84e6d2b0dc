//! Component registry.
//!
//! The registry is the in-memory catalogue of every component taking part in
//! one simulation run. It is append-only and preserves registration order,
//! which is also the order companions are considered during matching.
//!
//! Components never change once added. Endpoints rejected by the install
//! check are recorded next to them and left out of matching.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::core::component::{Component, Direction, Endpoint};

/// Registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("component `{0}` is already registered")]
    DuplicateComponent(String),

    #[error("component `{0}` is not registered")]
    UnknownComponent(String),
}

/// Catalogue of registered components, keyed by instance name.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: Vec<Component>,
    index: HashMap<String, usize>,
    bad: HashSet<(String, Direction, String)>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        ComponentRegistry::default()
    }

    /// Register a component.
    pub fn add(&mut self, component: Component) -> Result<(), RegistryError> {
        let name = component.instance_name();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateComponent(name));
        }
        self.index.insert(name, self.components.len());
        self.components.push(component);
        Ok(())
    }

    /// Look up a component by instance name.
    pub fn lookup(&self, name: &str) -> Result<&Component, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::UnknownComponent(name.to_string()))
    }

    /// Look up a component, returning `None` when absent.
    pub fn get(&self, name: &str) -> Option<&Component> {
        self.index.get(name).map(|&i| &self.components[i])
    }

    /// Endpoints of a component on one side, in manifest order.
    pub fn endpoints_of(
        &self,
        name: &str,
        direction: Direction,
    ) -> Result<&[Endpoint], RegistryError> {
        Ok(self.lookup(name)?.endpoints(direction))
    }

    /// Record that an endpoint failed its install check.
    pub fn mark_bad(
        &mut self,
        component: &str,
        direction: Direction,
        endpoint: &str,
    ) -> Result<(), RegistryError> {
        self.lookup(component)?;
        self.bad
            .insert((component.to_string(), direction, endpoint.to_string()));
        Ok(())
    }

    /// Whether an endpoint was marked bad.
    pub fn is_bad(&self, endpoint: &Endpoint) -> bool {
        self.bad.contains(&(
            endpoint.component.clone(),
            endpoint.direction,
            endpoint.name.clone(),
        ))
    }

    /// Endpoints on one side that may take part in matching.
    pub fn usable_endpoints<'a>(
        &'a self,
        component: &'a Component,
        direction: Direction,
    ) -> impl Iterator<Item = &'a Endpoint> + 'a {
        component
            .endpoints(direction)
            .iter()
            .filter(move |e| !self.is_bad(e))
    }

    /// Whether a component with this instance name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All components in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::component::ComponentIdentity;
    use crate::core::manifest::ComponentManifest;

    fn component(yaml: &str) -> Component {
        let manifest = ComponentManifest::parse(yaml).unwrap();
        Component::from_manifest(manifest, ComponentIdentity::default(), None)
    }

    #[test]
    fn test_add_and_lookup() {
        let mut registry = ComponentRegistry::new();
        registry
            .add(component("name: a\nplugs:\n  network:\n  home:\n"))
            .unwrap();
        registry.add(component("name: b\nslots:\n  x: network\n")).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("a").unwrap().name(), "a");
        assert!(registry.contains("b"));

        let plugs = registry.endpoints_of("a", Direction::Plug).unwrap();
        let names: Vec<_> = plugs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["network", "home"]);
        assert!(registry.endpoints_of("a", Direction::Slot).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = ComponentRegistry::new();
        registry.add(component("name: a\n")).unwrap();
        let err = registry.add(component("name: a\n")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateComponent("a".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_instance_names_are_distinct() {
        let mut registry = ComponentRegistry::new();
        registry.add(component("name: a\n")).unwrap();

        let keyed = ComponentManifest::parse("name: a_two\n").unwrap();
        registry
            .add(Component::from_manifest(keyed, ComponentIdentity::default(), None))
            .unwrap();

        assert!(registry.contains("a_two"));
    }

    #[test]
    fn test_unknown_component() {
        let registry = ComponentRegistry::new();
        assert_eq!(
            registry.lookup("ghost").unwrap_err(),
            RegistryError::UnknownComponent("ghost".to_string())
        );
    }

    #[test]
    fn test_bad_endpoints() {
        let mut registry = ComponentRegistry::new();
        registry
            .add(component("name: a\nplugs:\n  network:\n  home:\n"))
            .unwrap();
        registry.mark_bad("a", Direction::Plug, "home").unwrap();
        assert!(registry.mark_bad("ghost", Direction::Plug, "home").is_err());

        let a = registry.lookup("a").unwrap();
        assert!(registry.is_bad(&a.plugs()[1]));
        let usable: Vec<_> = registry
            .usable_endpoints(a, Direction::Plug)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(usable, ["network"]);
    }

    #[test]
    fn test_iteration_preserves_order() {
        let mut registry = ComponentRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.add(component(&format!("name: {}\n", name))).unwrap();
        }
        let names: Vec<_> = registry.iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }
}
