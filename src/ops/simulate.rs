//! The `auto-connections` operation.
//!
//! Loads the target and its companions, installs each one into a fresh
//! registry (recording which endpoints the install check rejected), matches
//! the target against everything registered, and runs the resulting
//! connections through the task engine.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::component::{Component, ComponentIdentity, Direction};
use crate::core::context::{DeviceContext, RunContext, RunSettings, SYSTEM_COMPONENT_NAME};
use crate::core::manifest::ComponentManifest;
use crate::core::registry::ComponentRegistry;
use crate::decl::{BaseDeclaration, ComponentDeclaration, Lookup, Record, RecordType, TrustStore};
use crate::engine::{Change, RecordingBackend, TaskEngine};
use crate::matcher::AutoConnector;
use crate::ops::loader::{ComponentLoader, ComponentSource, LoadError};
use crate::ops::report::{AutoConnectReport, EndpointEntry, InstallEntry};
use crate::ops::SimulationError;
use crate::policy::check_install;

/// Parameters of an `auto-connections` run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AutoConnectParams {
    /// Classic system instead of a core device
    pub classic: bool,
    pub brand: String,
    pub model: String,
    pub store: Option<String>,

    /// Identifier of the component being installed
    pub target_snap: String,

    /// Companion identifiers
    pub snaps: Vec<String>,

    /// Append a task that always fails
    pub error_trigger: bool,
}

impl AutoConnectParams {
    pub fn device(&self) -> DeviceContext {
        DeviceContext::new(&self.brand, &self.model)
            .with_classic(self.classic)
            .with_store(self.store.clone())
    }

    /// Companions then the target, each once, in input order.
    pub fn component_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.snaps
            .iter()
            .chain(std::iter::once(&self.target_snap))
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Simulate installing `target-snap` next to its companions.
pub fn simulate_auto_connect<L: ComponentLoader + ?Sized>(
    params: &AutoConnectParams,
    loader: &L,
    base: &BaseDeclaration,
    settings: &RunSettings,
) -> Result<AutoConnectReport, SimulationError> {
    if params.target_snap.is_empty() {
        return Err(SimulationError::InvalidParams(
            "`target-snap` is required".into(),
        ));
    }

    let ctx = RunContext::new(params.device(), base.clone()).with_settings(settings.clone());
    info!(
        "simulating auto-connect of {} on {} ({})",
        params.target_snap,
        ctx.device.model_id(),
        if ctx.device.classic { "classic" } else { "core" }
    );

    let ids = params.component_ids();
    let mut sources = Vec::with_capacity(ids.len());
    let mut store = TrustStore::new();
    for id in &ids {
        let source = loader.load(id)?;
        store_records(&mut store, &source)?;
        sources.push((*id, source));
    }

    let mut registry = ComponentRegistry::new();
    let mut installing = Vec::with_capacity(sources.len());
    let mut target = None;
    for (id, source) in sources {
        let component = build_component(id, &source, &store)?;
        let check = check_install(&component, &ctx.base, &ctx.device);
        if !check.ok {
            debug!("{}: {}", component, check.error);
        }

        let bad: Vec<(Direction, String)> = component
            .plugs()
            .iter()
            .chain(component.slots())
            .filter(|e| check.is_bad(e))
            .map(|e| (e.direction, e.name.clone()))
            .collect();

        let instance = component.instance_name();
        installing.push(InstallEntry {
            snap_name: instance.clone(),
            error: check.error,
            bad_interfaces: check.bad_interfaces,
        });
        if id == params.target_snap {
            target = Some(instance.clone());
        }

        registry.add(component)?;
        for (direction, name) in bad {
            registry.mark_bad(&instance, direction, &name)?;
        }
    }

    if ctx.settings.system_component && !registry.contains(SYSTEM_COMPONENT_NAME) {
        let implicit = ctx.base.implicit_slots(ctx.device.classic);
        if !implicit.is_empty() {
            registry.add(Component::system(SYSTEM_COMPONENT_NAME, implicit))?;
        }
    }

    let target = target.ok_or_else(|| {
        SimulationError::InvalidParams(format!("target `{}` was not loaded", params.target_snap))
    })?;
    let outcome = AutoConnector::new(&registry, &ctx.base, &ctx.device).run(&target)?;
    info!(
        "{} candidates, {} connections",
        outcome.candidates().count(),
        outcome.connections.len()
    );

    let mut change = Change::install(&target, &outcome.connections, params.error_trigger);
    let mut backend = RecordingBackend::new();
    TaskEngine::new(&mut backend, ctx.settings.max_engine_iterations).run(&mut change)?;
    debug!("backend saw {} calls", backend.calls().len());

    let component = registry.lookup(&target)?;
    let entries = |direction: Direction| -> Vec<EndpointEntry> {
        component
            .endpoints(direction)
            .iter()
            .map(|e| EndpointEntry {
                interface: e.interface.clone(),
                name: e.name.clone(),
            })
            .collect()
    };

    Ok(AutoConnectReport {
        plugs: entries(Direction::Plug),
        slots: entries(Direction::Slot),
        target,
        installing,
        connections: outcome.connections,
        slot_candidates: outcome.slot_candidates,
        plug_candidates: outcome.plug_candidates,
    })
}

/// Add the publisher account and snap declaration of a component.
pub(crate) fn store_records(
    store: &mut TrustStore,
    source: &ComponentSource,
) -> Result<(), SimulationError> {
    let reference = &source.reference;
    if !reference.publisher_id.is_empty() {
        store.add(Record::account(&reference.publisher_id))?;
    }
    store.add(Record::new(
        RecordType::SnapDeclaration,
        reference.snap_name.clone(),
        source.declaration_body(),
    ))?;
    Ok(())
}

fn build_component(
    id: &str,
    source: &ComponentSource,
    store: &TrustStore,
) -> Result<Component, SimulationError> {
    let manifest =
        ComponentManifest::parse(&source.manifest).map_err(|e| SimulationError::Manifest {
            component: id.to_string(),
            source: e,
        })?;

    let (declaration, identity) =
        match store.find(RecordType::SnapDeclaration, &manifest.name) {
            Lookup::Found(record) => {
                store.verify_chain(record)?;
                let decl = ComponentDeclaration::from_record(record)?;
                let identity = ComponentIdentity {
                    id: decl.snap_id().to_string(),
                    publisher_id: decl.publisher_id().to_string(),
                };
                (Some(decl), identity)
            }
            Lookup::NotFound => {
                debug!("no declaration for {}", manifest.name);
                (None, ComponentIdentity::default())
            }
        };

    let mut component = Component::from_manifest(manifest, identity, declaration);
    for (direction, attrs) in [
        (Direction::Plug, &source.dynamic_attrs.plugs),
        (Direction::Slot, &source.dynamic_attrs.slots),
    ] {
        for (name, values) in attrs {
            if !component.set_dynamic_attrs(direction, name, values.clone()) {
                return Err(LoadError::UnknownEndpoint {
                    component: id.to_string(),
                    direction: direction.to_string(),
                    name: name.clone(),
                }
                .into());
            }
        }
    }

    Ok(component)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::ManifestError;
    use crate::decl::DeclError;
    use crate::engine::EngineError;
    use crate::ops::loader::{ComponentRef, DynamicAttrs, InMemoryLoader};
    use crate::policy::RejectionKind;
    use serde_json::json;

    fn source(name: &str, publisher: &str, manifest: &str) -> ComponentSource {
        ComponentSource::new(
            ComponentRef {
                snap_name: name.into(),
                snap_id: format!("{}-id", name),
                publisher_id: publisher.into(),
            },
            manifest,
        )
    }

    fn params(target: &str, snaps: &[&str]) -> AutoConnectParams {
        AutoConnectParams {
            brand: "canonical".into(),
            model: "pc".into(),
            target_snap: target.into(),
            snaps: snaps.iter().map(|s| s.to_string()).collect(),
            ..AutoConnectParams::default()
        }
    }

    fn simulate(
        params: &AutoConnectParams,
        loader: &InMemoryLoader,
    ) -> Result<AutoConnectReport, SimulationError> {
        let base = BaseDeclaration::builtin().unwrap();
        simulate_auto_connect(params, loader, &base, &RunSettings::default())
    }

    #[test]
    fn test_component_ids_dedup() {
        let p = params("app", &["b", "a", "b", "app", "a"]);
        assert_eq!(p.component_ids(), ["b", "a", "app"]);
        assert_eq!(params("app", &["b"]).component_ids(), ["b", "app"]);
    }

    #[test]
    fn test_params_decode() {
        let p: AutoConnectParams = serde_json::from_value(json!({
            "brand": "acme", "model": "router", "store": "",
            "target-snap": "app", "snaps": ["lib"], "error-trigger": true
        }))
        .unwrap();
        assert!(!p.classic);
        assert!(p.error_trigger);
        assert_eq!(p.device().store, None);
        assert_eq!(p.snaps, ["lib"]);
    }

    #[test]
    fn test_network_plug_connects_to_system() {
        let loader = InMemoryLoader::new().with(
            "app",
            source("app", "acme", "name: app\nplugs:\n  network:\n"),
        );
        let report = simulate(&params("app", &[]), &loader).unwrap();

        assert_eq!(report.installing.len(), 1);
        assert_eq!(report.installing[0].snap_name, "app");
        assert_eq!(report.installing[0].error, "");
        assert_eq!(report.plugs.len(), 1);
        assert_eq!(report.connections.len(), 1);
        assert_eq!(report.connections[0].slot.to_string(), "snapd:network");
        assert_eq!(report.connections[0].on_target, [Direction::Plug]);
    }

    #[test]
    fn test_forbidden_plug_is_bad() {
        let loader = InMemoryLoader::new().with(
            "app",
            source("app", "acme", "name: app\nplugs:\n  snapd-control:\n  network:\n"),
        );
        let report = simulate(&params("app", &[]), &loader).unwrap();

        let entry = &report.installing[0];
        assert!(!entry.error.is_empty());
        assert!(entry.bad_interfaces.contains_key("snapd-control"));
        assert!(!report.plug_candidates.contains_key("snapd-control"));
        assert!(report.plug_candidates.contains_key("network"));
        assert_eq!(report.plugs.len(), 2);
    }

    #[test]
    fn test_declaration_grants_forbidden_plug() {
        let loader = InMemoryLoader::new().with(
            "app",
            source("app", "acme", "name: app\nplugs:\n  snapd-control:\n").with_plug_rules(
                json!({"snapd-control": {"allow-installation": true, "allow-auto-connection": true}}),
            ),
        );
        let report = simulate(&params("app", &[]), &loader).unwrap();
        assert_eq!(report.installing[0].error, "");
        assert_eq!(report.connections.len(), 1);
    }

    #[test]
    fn test_content_between_same_publisher() {
        let loader = InMemoryLoader::new()
            .with(
                "provider",
                source(
                    "provider",
                    "acme",
                    "name: provider\nslots:\n  db:\n    interface: content\n    content: db\n",
                ),
            )
            .with(
                "app",
                source(
                    "app",
                    "acme",
                    "name: app\nplugs:\n  db:\n    interface: content\n    content: db\n",
                ),
            );
        let report = simulate(&params("app", &["provider"]), &loader).unwrap();
        assert_eq!(report.connections.len(), 1);
        assert_eq!(report.connections[0].slot.snap, "provider");

        let candidates = &report.plug_candidates["db"];
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].is_accepted());
    }

    #[test]
    fn test_slots_per_plug_lists_every_candidate() {
        let slot = "slots:\n  db:\n    interface: content\n    content: db\n";
        let loader = InMemoryLoader::new()
            .with("first", source("first", "acme", &format!("name: first\n{}", slot)))
            .with("second", source("second", "acme", &format!("name: second\n{}", slot)))
            .with(
                "app",
                source(
                    "app",
                    "acme",
                    "name: app\nplugs:\n  db:\n    interface: content\n    content: db\n",
                ),
            );
        let report = simulate(&params("app", &["first", "second"]), &loader).unwrap();

        assert_eq!(report.connections.len(), 1);
        assert_eq!(report.connections[0].slot.snap, "first");

        let candidates = &report.plug_candidates["db"];
        let slots: Vec<_> = candidates.iter().map(|c| c.slot.snap.as_str()).collect();
        assert_eq!(slots, ["first", "second"]);
        assert!(candidates[0].is_accepted());
        assert_eq!(candidates[1].rejection, Some(RejectionKind::ArityExceeded));
        assert_eq!(candidates[1].slots_per_plug_any, Some(false));
    }

    #[test]
    fn test_instance_name_in_report() {
        let loader = InMemoryLoader::new()
            .with(
                "lib",
                source(
                    "lib",
                    "acme",
                    "name: lib\nslots:\n  db:\n    interface: content\n    content: db\n",
                ),
            )
            .with(
                "app",
                source(
                    "app",
                    "acme",
                    "name: app_dev\nplugs:\n  network:\n  db:\n    interface: content\n    content: db\n",
                ),
            );
        let report = simulate(&params("app", &["lib"]), &loader).unwrap();

        assert_eq!(report.target, "app_dev");
        assert_eq!(report.installing[1].snap_name, "app_dev");
        let plugs: Vec<_> = report.connections.iter().map(|c| c.plug.to_string()).collect();
        assert_eq!(plugs, ["app_dev:network", "app_dev:db"]);
    }

    #[test]
    fn test_plug_and_slot_sharing_a_name_is_rejected() {
        let loader = InMemoryLoader::new().with(
            "app",
            source(
                "app",
                "acme",
                "name: app\nplugs:\n  dup: snapd-control\nslots:\n  dup:\n    interface: content\n",
            ),
        );
        let err = simulate(&params("app", &[]), &loader).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Manifest {
                source: ManifestError::EndpointClash(_),
                ..
            }
        ));
    }

    #[test]
    fn test_bad_plug_keeps_other_slots_matchable() {
        let loader = InMemoryLoader::new()
            .with(
                "lib",
                source(
                    "lib",
                    "acme",
                    "name: lib\nplugs:\n  dup:\n    interface: content\n    content: db\n",
                ),
            )
            .with(
                "app",
                source(
                    "app",
                    "acme",
                    "name: app\nplugs:\n  other: snapd-control\nslots:\n  dup:\n    interface: content\n    content: db\n",
                ),
            );
        let report = simulate(&params("app", &["lib"]), &loader).unwrap();

        assert!(report.installing[1].bad_interfaces.contains_key("other"));
        assert_eq!(report.connections.len(), 1);
        assert_eq!(report.connections[0].slot.to_string(), "app:dup");
        assert!(report.slot_candidates.contains_key("dup"));
    }

    #[test]
    fn test_content_across_publishers_not_allowed() {
        let loader = InMemoryLoader::new()
            .with(
                "provider",
                source(
                    "provider",
                    "other",
                    "name: provider\nslots:\n  db:\n    interface: content\n    content: db\n",
                ),
            )
            .with(
                "app",
                source(
                    "app",
                    "acme",
                    "name: app\nplugs:\n  db:\n    interface: content\n    content: db\n",
                ),
            );
        let report = simulate(&params("app", &["provider"]), &loader).unwrap();
        assert!(report.connections.is_empty());
        assert_eq!(
            report.plug_candidates["db"][0].rejection,
            Some(RejectionKind::NotAllowed)
        );
    }

    #[test]
    fn test_dynamic_attrs_applied() {
        let mut dynamic = DynamicAttrs::default();
        dynamic
            .plugs
            .insert("network".into(), [("x".to_string(), json!(1))].into());
        let loader = InMemoryLoader::new().with(
            "app",
            source("app", "acme", "name: app\nplugs:\n  network:\n").with_dynamic_attrs(dynamic),
        );
        let report = simulate(&params("app", &[]), &loader).unwrap();
        assert_eq!(
            report.plug_candidates["network"][0].plug_dynamic_attrs["x"],
            json!(1)
        );
    }

    #[test]
    fn test_dynamic_attrs_unknown_endpoint() {
        let mut dynamic = DynamicAttrs::default();
        dynamic.slots.insert("ghost".into(), Default::default());
        let loader = InMemoryLoader::new().with(
            "app",
            source("app", "acme", "name: app\n").with_dynamic_attrs(dynamic),
        );
        let err = simulate(&params("app", &[]), &loader).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Load(LoadError::UnknownEndpoint { .. })
        ));
    }

    #[test]
    fn test_error_trigger_aborts() {
        let loader = InMemoryLoader::new().with(
            "app",
            source("app", "acme", "name: app\nplugs:\n  network:\n"),
        );
        let mut p = params("app", &[]);
        p.error_trigger = true;
        let err = simulate(&p, &loader).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Engine(EngineError::ChangeAborted { .. })
        ));
    }

    #[test]
    fn test_malformed_declaration() {
        let loader = InMemoryLoader::new().with(
            "app",
            source("app", "acme", "name: app\nplugs:\n  network:\n")
                .with_plug_rules(json!({"network": {"allow-connection": {"no-such-constraint": 1}}})),
        );
        let err = simulate(&params("app", &[]), &loader).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::Declaration(DeclError::MalformedDeclaration { .. })
        ));
    }

    #[test]
    fn test_missing_component() {
        let loader = InMemoryLoader::new();
        let err = simulate(&params("app", &[]), &loader).unwrap_err();
        assert!(matches!(err, SimulationError::Load(LoadError::NotFound(_))));
    }

    #[test]
    fn test_empty_target() {
        let err = simulate(&params("", &[]), &InMemoryLoader::new()).unwrap_err();
        assert!(matches!(err, SimulationError::InvalidParams(_)));
    }

    #[test]
    fn test_duplicate_manifest_name() {
        let loader = InMemoryLoader::new()
            .with("a", source("a", "acme", "name: same\n"))
            .with("b", source("b", "acme", "name: same\n"));
        let err = simulate(&params("b", &["a"]), &loader).unwrap_err();
        assert!(matches!(err, SimulationError::Registry(_)));
    }

    #[test]
    fn test_without_system_component() {
        let loader = InMemoryLoader::new().with(
            "app",
            source("app", "acme", "name: app\nplugs:\n  network:\n"),
        );
        let base = BaseDeclaration::builtin().unwrap();
        let settings = RunSettings {
            system_component: false,
            ..RunSettings::default()
        };
        let report = simulate_auto_connect(&params("app", &[]), &loader, &base, &settings).unwrap();
        assert!(report.connections.is_empty());
        assert!(report.plug_candidates.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let loader = InMemoryLoader::new()
            .with(
                "lib",
                source("lib", "acme", "name: lib\nslots:\n  db:\n    interface: content\n"),
            )
            .with(
                "app",
                source("app", "acme", "name: app\nplugs:\n  network:\n  db: content\n"),
            );
        let p = params("app", &["lib"]);
        let first = simulate(&p, &loader).unwrap();
        let second = simulate(&p, &loader).unwrap();
        assert_eq!(first, second);
    }
}
