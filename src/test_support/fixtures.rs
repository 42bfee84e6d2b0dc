//! Components and registries for unit tests.

use serde_json::Value;

use crate::core::component::{Component, ComponentIdentity};
use crate::core::manifest::ComponentManifest;
use crate::core::registry::ComponentRegistry;
use crate::decl::ComponentDeclaration;

fn identity(manifest: &ComponentManifest, publisher: &str) -> ComponentIdentity {
    ComponentIdentity {
        id: format!("{}-id", manifest.name),
        publisher_id: publisher.to_string(),
    }
}

/// A component with no declaration of its own.
pub fn component(yaml: &str, publisher: &str) -> Component {
    let manifest = ComponentManifest::parse(yaml).expect("fixture manifest");
    let identity = identity(&manifest, publisher);
    Component::from_manifest(manifest, identity, None)
}

/// A component whose declaration carries `rules` (`plugs` / `slots` maps).
pub fn component_with_decl(yaml: &str, publisher: &str, rules: Value) -> Component {
    let manifest = ComponentManifest::parse(yaml).expect("fixture manifest");
    let identity = identity(&manifest, publisher);

    let mut body = match rules {
        Value::Object(map) => map,
        other => panic!("declaration rules must be an object, got {}", other),
    };
    body.insert("snap-name".into(), Value::from(manifest.name.clone()));
    body.insert("snap-id".into(), Value::from(identity.id.clone()));
    body.insert("publisher-id".into(), Value::from(publisher));
    let decl = ComponentDeclaration::decode(&Value::Object(body)).expect("fixture declaration");

    Component::from_manifest(manifest, identity, Some(decl))
}

/// A registry holding `components` in order.
pub fn registry(components: Vec<Component>) -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    for component in components {
        registry.add(component).expect("fixture registry");
    }
    registry
}
