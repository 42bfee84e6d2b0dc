//! Components and their endpoints.
//!
//! A Component is one installed unit (a snap) with its identity, publisher,
//! optional declaration and the plugs and slots it exposes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::attrs::{lookup_merged, AttrPath, Attrs};
use crate::core::manifest::ComponentManifest;
use crate::decl::ComponentDeclaration;

/// Which side of a connection an endpoint is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Plug,
    Slot,
}

impl Direction {
    /// The opposite side.
    pub fn other(self) -> Direction {
        match self {
            Direction::Plug => Direction::Slot,
            Direction::Slot => Direction::Plug,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Plug => "plug",
            Direction::Slot => "slot",
        }
    }

    /// Plural form used as a key in manifests and declarations.
    pub fn plural(self) -> &'static str {
        match self {
            Direction::Plug => "plugs",
            Direction::Slot => "slots",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The type of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    #[default]
    App,
    Gadget,
    Kernel,
    Base,
    Core,
    Os,
    Snapd,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::App => "app",
            ComponentType::Gadget => "gadget",
            ComponentType::Kernel => "kernel",
            ComponentType::Base => "base",
            ComponentType::Core => "core",
            ComponentType::Os => "os",
            ComponentType::Snapd => "snapd",
        }
    }

    /// Whether this type satisfies a snap-type constraint value.
    ///
    /// The system types (`core`, `os`, `snapd`) all satisfy `core`.
    pub fn satisfies(&self, wanted: ComponentType) -> bool {
        if *self == wanted {
            return true;
        }
        wanted == ComponentType::Core && self.is_system()
    }

    /// Whether this is a type that provides the system's implicit slots.
    pub fn is_system(&self) -> bool {
        matches!(
            self,
            ComponentType::Core | ComponentType::Os | ComponentType::Snapd
        )
    }
}

impl FromStr for ComponentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app" | "application" => Ok(ComponentType::App),
            "gadget" => Ok(ComponentType::Gadget),
            "kernel" => Ok(ComponentType::Kernel),
            "base" => Ok(ComponentType::Base),
            "core" => Ok(ComponentType::Core),
            "os" => Ok(ComponentType::Os),
            "snapd" => Ok(ComponentType::Snapd),
            _ => Err(format!("unknown snap type `{}`", s)),
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plug or slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    /// Endpoint name, unique per component and direction
    pub name: String,

    /// Interface type tag
    pub interface: String,

    /// Plug or slot
    pub direction: Direction,

    /// Instance name of the owning component
    pub component: String,

    /// Attributes fixed at declaration time
    pub static_attrs: Attrs,

    /// Attributes computed at connection time
    pub dynamic_attrs: Attrs,
}

impl Endpoint {
    /// Look up an attribute, dynamic values first.
    pub fn attr(&self, path: &AttrPath) -> Option<&serde_json::Value> {
        lookup_merged(&self.static_attrs, &self.dynamic_attrs, path)
    }
}

/// Reference to a plug as it appears in reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlugRef {
    pub snap: String,
    pub plug: String,
}

impl fmt::Display for PlugRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.snap, self.plug)
    }
}

/// Reference to a slot as it appears in reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRef {
    pub snap: String,
    pub slot: String,
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.snap, self.slot)
    }
}

/// Identity of a component as recorded by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentIdentity {
    /// Store-assigned id (snap-id), may be empty for local components
    pub id: String,

    /// Publisher account id
    pub publisher_id: String,
}

/// An installed component.
#[derive(Debug, Clone)]
pub struct Component {
    name: String,
    instance_key: Option<String>,
    kind: ComponentType,
    identity: ComponentIdentity,
    declaration: Option<ComponentDeclaration>,
    plugs: Vec<Endpoint>,
    slots: Vec<Endpoint>,
}

impl Component {
    /// Build a component from its parsed manifest.
    pub fn from_manifest(
        manifest: ComponentManifest,
        identity: ComponentIdentity,
        declaration: Option<ComponentDeclaration>,
    ) -> Self {
        let instance = match &manifest.instance_key {
            Some(key) => format!("{}_{}", manifest.name, key),
            None => manifest.name.clone(),
        };

        let to_endpoint = |spec: crate::core::manifest::EndpointSpec, direction| Endpoint {
            name: spec.name,
            interface: spec.interface,
            direction,
            component: instance.clone(),
            static_attrs: spec.attrs,
            dynamic_attrs: Attrs::new(),
        };

        let plugs = manifest
            .plugs
            .into_iter()
            .map(|s| to_endpoint(s, Direction::Plug))
            .collect();
        let slots = manifest
            .slots
            .into_iter()
            .map(|s| to_endpoint(s, Direction::Slot))
            .collect();

        Component {
            name: manifest.name,
            instance_key: manifest.instance_key,
            kind: manifest.kind,
            identity,
            declaration,
            plugs,
            slots,
        }
    }

    /// Create the system component that carries the implicit slots.
    pub fn system(name: &str, implicit_interfaces: &[String]) -> Self {
        let slots = implicit_interfaces
            .iter()
            .map(|iface| Endpoint {
                name: iface.clone(),
                interface: iface.clone(),
                direction: Direction::Slot,
                component: name.to_string(),
                static_attrs: Attrs::new(),
                dynamic_attrs: Attrs::new(),
            })
            .collect();

        Component {
            name: name.to_string(),
            instance_key: None,
            kind: ComponentType::Snapd,
            identity: ComponentIdentity::default(),
            declaration: None,
            plugs: Vec::new(),
            slots,
        }
    }

    /// The snap name (without instance key).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The instance name (`name_key` when an instance key is set).
    pub fn instance_name(&self) -> String {
        match &self.instance_key {
            Some(key) => format!("{}_{}", self.name, key),
            None => self.name.clone(),
        }
    }

    pub fn kind(&self) -> ComponentType {
        self.kind
    }

    pub fn identity(&self) -> &ComponentIdentity {
        &self.identity
    }

    pub fn publisher_id(&self) -> &str {
        &self.identity.publisher_id
    }

    pub fn declaration(&self) -> Option<&ComponentDeclaration> {
        self.declaration.as_ref()
    }

    pub fn plugs(&self) -> &[Endpoint] {
        &self.plugs
    }

    pub fn slots(&self) -> &[Endpoint] {
        &self.slots
    }

    /// Endpoints on one side, in manifest order.
    pub fn endpoints(&self, direction: Direction) -> &[Endpoint] {
        match direction {
            Direction::Plug => &self.plugs,
            Direction::Slot => &self.slots,
        }
    }

    /// Find an endpoint by name.
    pub fn endpoint(&self, direction: Direction, name: &str) -> Option<&Endpoint> {
        self.endpoints(direction).iter().find(|e| e.name == name)
    }

    /// Set dynamic attributes on an endpoint. Returns false if no such endpoint.
    pub fn set_dynamic_attrs(&mut self, direction: Direction, name: &str, attrs: Attrs) -> bool {
        let endpoints = match direction {
            Direction::Plug => &mut self.plugs,
            Direction::Slot => &mut self.slots,
        };
        match endpoints.iter_mut().find(|e| e.name == name) {
            Some(endpoint) => {
                endpoint.dynamic_attrs = attrs;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instance_name())
    }
}
