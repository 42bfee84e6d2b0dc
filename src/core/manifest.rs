//! Component manifest (`snap.yaml`) parsing.
//!
//! Only the parts that matter for interface decisions are read: the name,
//! the type, top-level plugs and slots, and the plugs and slots that apps and
//! hooks reference without declaring them.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_yaml::{Mapping, Value as YamlValue};
use thiserror::Error;

use crate::core::attrs::Attrs;
use crate::core::component::{ComponentType, Direction};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9](?:-?[a-z0-9])*$").expect("valid name regex"));

static INSTANCE_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]{1,10}$").expect("valid instance key regex"));

/// Error parsing a component manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot parse snap.yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid snap name `{0}`")]
    InvalidName(String),

    #[error("unknown snap type `{0}`")]
    InvalidType(String),

    #[error("plug and slot both named `{0}`")]
    EndpointClash(String),

    #[error("invalid {direction} `{name}`: {reason}")]
    InvalidEndpoint {
        direction: Direction,
        name: String,
        reason: String,
    },
}

/// A plug or slot as declared in a manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSpec {
    pub name: String,
    pub interface: String,
    pub attrs: Attrs,
}

/// The parsed manifest of a component.
#[derive(Debug, Clone)]
pub struct ComponentManifest {
    pub name: String,
    pub instance_key: Option<String>,
    pub kind: ComponentType,
    pub plugs: Vec<EndpointSpec>,
    pub slots: Vec<EndpointSpec>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    name: String,

    #[serde(rename = "type", default)]
    kind: Option<String>,

    #[serde(default)]
    plugs: Option<Mapping>,

    #[serde(default)]
    slots: Option<Mapping>,

    #[serde(default)]
    apps: Option<Mapping>,

    #[serde(default)]
    hooks: Option<Mapping>,
}

/// App or hook entry; only its endpoint references matter here.
#[derive(Debug, Default, Deserialize)]
struct RawEndpointUser {
    #[serde(default)]
    plugs: Vec<String>,

    #[serde(default)]
    slots: Vec<String>,
}

impl ComponentManifest {
    /// Parse manifest YAML.
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let raw: RawManifest = serde_yaml::from_str(content)?;
        let (name, instance_key) = split_instance_name(&raw.name)?;

        let kind = match raw.kind.as_deref() {
            None => ComponentType::App,
            Some(s) => s
                .parse()
                .map_err(|_| ManifestError::InvalidType(s.to_string()))?,
        };

        let mut plugs = convert_endpoints(raw.plugs.as_ref(), Direction::Plug)?;
        let mut slots = convert_endpoints(raw.slots.as_ref(), Direction::Slot)?;

        // Endpoints referenced only by apps and hooks are implicitly declared
        // with the interface of the same name.
        for users in [raw.apps.as_ref(), raw.hooks.as_ref()].into_iter().flatten() {
            for (_, user) in users {
                let user: RawEndpointUser = if user.is_null() {
                    RawEndpointUser::default()
                } else {
                    serde_yaml::from_value(user.clone())?
                };
                add_implicit(&mut plugs, &user.plugs, Direction::Plug)?;
                add_implicit(&mut slots, &user.slots, Direction::Slot)?;
            }
        }

        if let Some(clash) = plugs
            .iter()
            .find(|p| slots.iter().any(|s| s.name == p.name))
        {
            return Err(ManifestError::EndpointClash(clash.name.clone()));
        }

        Ok(ComponentManifest {
            name,
            instance_key,
            kind,
            plugs,
            slots,
        })
    }
}

/// Split `name_key` into the snap name and its instance key.
fn split_instance_name(full: &str) -> Result<(String, Option<String>), ManifestError> {
    let invalid = || ManifestError::InvalidName(full.to_string());
    let (name, key) = match full.split_once('_') {
        Some((name, key)) => {
            if !INSTANCE_KEY_RE.is_match(key) {
                return Err(invalid());
            }
            (name, Some(key.to_string()))
        }
        None => (full, None),
    };

    if !NAME_RE.is_match(name) {
        return Err(invalid());
    }
    Ok((name.to_string(), key))
}

fn convert_endpoints(
    mapping: Option<&Mapping>,
    direction: Direction,
) -> Result<Vec<EndpointSpec>, ManifestError> {
    let Some(mapping) = mapping else {
        return Ok(Vec::new());
    };

    let mut specs = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = key
            .as_str()
            .ok_or_else(|| ManifestError::InvalidEndpoint {
                direction,
                name: format!("{:?}", key),
                reason: "name must be a string".to_string(),
            })?
            .to_string();
        specs.push(convert_endpoint(name, value, direction)?);
    }
    Ok(specs)
}

fn convert_endpoint(
    name: String,
    value: &YamlValue,
    direction: Direction,
) -> Result<EndpointSpec, ManifestError> {
    let invalid = |name: &str, reason: String| ManifestError::InvalidEndpoint {
        direction,
        name: name.to_string(),
        reason,
    };

    if !NAME_RE.is_match(&name) {
        return Err(invalid(&name, "invalid name".to_string()));
    }

    let (interface, attrs) = match value {
        YamlValue::Null => (name.clone(), Attrs::new()),
        YamlValue::String(iface) => (iface.clone(), Attrs::new()),
        YamlValue::Mapping(map) => {
            let mut interface = name.clone();
            let mut attrs = Attrs::new();
            for (k, v) in map {
                let key = k
                    .as_str()
                    .ok_or_else(|| invalid(&name, "attribute names must be strings".to_string()))?;
                if key == "interface" {
                    interface = v
                        .as_str()
                        .ok_or_else(|| invalid(&name, "interface must be a string".to_string()))?
                        .to_string();
                    continue;
                }
                let json = serde_json::to_value(v)
                    .map_err(|e| invalid(&name, format!("attribute `{}`: {}", key, e)))?;
                attrs.insert(key.to_string(), json);
            }
            (interface, attrs)
        }
        other => {
            return Err(invalid(
                &name,
                format!("expected interface name or attribute map, got {:?}", other),
            ))
        }
    };

    if !NAME_RE.is_match(&interface) {
        return Err(invalid(&name, format!("invalid interface name `{}`", interface)));
    }

    Ok(EndpointSpec {
        name,
        interface,
        attrs,
    })
}

fn add_implicit(
    specs: &mut Vec<EndpointSpec>,
    names: &[String],
    direction: Direction,
) -> Result<(), ManifestError> {
    for name in names {
        if specs.iter().any(|s| &s.name == name) {
            continue;
        }
        specs.push(convert_endpoint(name.clone(), &YamlValue::Null, direction)?);
    }
    Ok(())
}
