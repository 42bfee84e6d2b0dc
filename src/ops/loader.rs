//! Component loading.
//!
//! A component identifier resolves to a directory holding:
//!
//! - `.snap.json`: `{"snap-name", "snap-id", "publisher-id"}` (required)
//! - `snap.yaml`: the manifest (required)
//! - `plugs.json` / `slots.json`: declaration rules keyed by interface
//! - `dynamic-attrs.json`: `{"plugs": {name: attrs}, "slots": {name: attrs}}`
//!
//! Loading is a blocking one-shot read per component, done before matching.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::core::attrs::Attrs;

/// Loading errors. All are fatal to a run.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("component `{0}` is not available")]
    NotFound(String),

    #[error("dynamic attributes for unknown {direction} `{name}` of `{component}`")]
    UnknownEndpoint {
        component: String,
        direction: String,
        name: String,
    },
}

/// Store reference record of a component (`.snap.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ComponentRef {
    pub snap_name: String,
    #[serde(default)]
    pub snap_id: String,
    #[serde(default)]
    pub publisher_id: String,
}

/// Dynamic attributes to apply to a component's endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicAttrs {
    pub plugs: BTreeMap<String, Attrs>,
    pub slots: BTreeMap<String, Attrs>,
}

/// Everything loaded for one component identifier.
#[derive(Debug, Clone, Default)]
pub struct ComponentSource {
    pub reference: ComponentRef,
    pub plug_rules: Option<Value>,
    pub slot_rules: Option<Value>,
    pub manifest: String,
    pub dynamic_attrs: DynamicAttrs,
}

impl ComponentSource {
    pub fn new(reference: ComponentRef, manifest: impl Into<String>) -> Self {
        ComponentSource {
            reference,
            manifest: manifest.into(),
            ..ComponentSource::default()
        }
    }

    pub fn with_plug_rules(mut self, rules: Value) -> Self {
        self.plug_rules = Some(rules);
        self
    }

    pub fn with_slot_rules(mut self, rules: Value) -> Self {
        self.slot_rules = Some(rules);
        self
    }

    pub fn with_dynamic_attrs(mut self, attrs: DynamicAttrs) -> Self {
        self.dynamic_attrs = attrs;
        self
    }

    /// Snap declaration body built from the reference and rule files.
    pub fn declaration_body(&self) -> Value {
        let mut body = serde_json::Map::new();
        body.insert("snap-name".into(), Value::from(self.reference.snap_name.clone()));
        body.insert("snap-id".into(), Value::from(self.reference.snap_id.clone()));
        body.insert(
            "publisher-id".into(),
            Value::from(self.reference.publisher_id.clone()),
        );
        if let Some(plugs) = &self.plug_rules {
            body.insert("plugs".into(), plugs.clone());
        }
        if let Some(slots) = &self.slot_rules {
            body.insert("slots".into(), slots.clone());
        }
        Value::Object(body)
    }
}

/// Resolves component identifiers to their sources.
pub trait ComponentLoader {
    fn load(&self, id: &str) -> Result<ComponentSource, LoadError>;
}

/// Loads components from `<root>/<id>/`.
#[derive(Debug, Clone)]
pub struct DirLoader {
    root: PathBuf,
}

impl DirLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirLoader { root: root.into() }
    }
}

impl ComponentLoader for DirLoader {
    fn load(&self, id: &str) -> Result<ComponentSource, LoadError> {
        let dir = self.root.join(id);
        debug!("loading component {} from {}", id, dir.display());

        let reference: ComponentRef = read_json(&dir.join(".snap.json"))?;
        let manifest_path = dir.join("snap.yaml");
        let manifest = std::fs::read_to_string(&manifest_path).map_err(|source| LoadError::Io {
            path: manifest_path,
            source,
        })?;

        Ok(ComponentSource {
            reference,
            plug_rules: read_optional_json(&dir.join("plugs.json"))?,
            slot_rules: read_optional_json(&dir.join("slots.json"))?,
            manifest,
            dynamic_attrs: read_optional_json(&dir.join("dynamic-attrs.json"))?
                .unwrap_or_default(),
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn read_optional_json<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, LoadError> {
    match read_json(path) {
        Ok(value) => Ok(Some(value)),
        Err(LoadError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Serves components from memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoader {
    sources: HashMap<String, ComponentSource>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        InMemoryLoader::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, source: ComponentSource) {
        self.sources.insert(id.into(), source);
    }

    pub fn with(mut self, id: impl Into<String>, source: ComponentSource) -> Self {
        self.insert(id, source);
        self
    }
}

impl ComponentLoader for InMemoryLoader {
    fn load(&self, id: &str) -> Result<ComponentSource, LoadError> {
        self.sources
            .get(id)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(id.to_string()))
    }
}
