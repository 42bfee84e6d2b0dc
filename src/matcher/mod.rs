//! Auto-connect matching.
//!
//! Enumerates every plug/slot pair of the same interface with at least one
//! side on the target component, checks each against auto-connection policy,
//! applies arity limits first-come in enumeration order, and returns the
//! accepted connections plus one candidate record per pair.
//!
//! Enumeration order is fixed:
//!
//! 1. each usable target plug in manifest order, against every component in
//!    registration order and each of its usable slots;
//! 2. each usable target slot, against every other component in registration
//!    order and each of its usable plugs.
//!
//! Pairs where both sides are on the target appear once, in the first pass.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::core::attrs::Attrs;
use crate::core::component::{Component, Direction, Endpoint, PlugRef, SlotRef};
use crate::core::context::DeviceContext;
use crate::core::registry::{ComponentRegistry, RegistryError};
use crate::decl::{Arity, BaseDeclaration};
use crate::policy::{check_auto_connect, Rejection, RejectionKind, Side};

/// A plug/slot pair considered for auto-connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Candidate {
    pub interface: String,
    pub plug: PlugRef,
    pub slot: SlotRef,
    pub plug_static_attrs: Attrs,
    pub plug_dynamic_attrs: Attrs,
    pub slot_static_attrs: Attrs,
    pub slot_dynamic_attrs: Attrs,

    /// Rejection reason, absent when accepted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<RejectionKind>,

    /// Whether the plug may take any number of slots; known once policy allowed the pair
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slots_per_plug_any: Option<bool>,
}

impl Candidate {
    fn new(plug: &Endpoint, slot: &Endpoint) -> Self {
        Candidate {
            interface: plug.interface.clone(),
            plug: PlugRef {
                snap: plug.component.clone(),
                plug: plug.name.clone(),
            },
            slot: SlotRef {
                snap: slot.component.clone(),
                slot: slot.name.clone(),
            },
            plug_static_attrs: plug.static_attrs.clone(),
            plug_dynamic_attrs: plug.dynamic_attrs.clone(),
            slot_static_attrs: slot.static_attrs.clone(),
            slot_dynamic_attrs: slot.dynamic_attrs.clone(),
            check_error: None,
            rejection: None,
            slots_per_plug_any: None,
        }
    }

    fn reject(&mut self, rejection: Rejection) {
        self.check_error = Some(rejection.message);
        self.rejection = Some(rejection.kind);
    }

    pub fn is_accepted(&self) -> bool {
        self.rejection.is_none()
    }
}

/// An accepted pairing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Connection {
    pub interface: String,
    pub plug: PlugRef,
    pub slot: SlotRef,

    /// Which sides belong to the target component
    pub on_target: Vec<Direction>,
}

/// Everything the matcher produced for one target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchOutcome {
    /// Accepted connections in acceptance order
    pub connections: Vec<Connection>,

    /// Candidates whose plug is on the target, by plug name
    pub plug_candidates: BTreeMap<String, Vec<Candidate>>,

    /// Candidates whose plug is elsewhere, by target slot name
    pub slot_candidates: BTreeMap<String, Vec<Candidate>>,
}

impl MatchOutcome {
    /// All candidates, plug-keyed first.
    pub fn candidates(&self) -> impl Iterator<Item = &Candidate> {
        self.plug_candidates
            .values()
            .chain(self.slot_candidates.values())
            .flatten()
    }
}

/// Runs matching for one target against a registry.
pub struct AutoConnector<'a> {
    registry: &'a ComponentRegistry,
    base: &'a BaseDeclaration,
    device: &'a DeviceContext,
}

impl<'a> AutoConnector<'a> {
    pub fn new(
        registry: &'a ComponentRegistry,
        base: &'a BaseDeclaration,
        device: &'a DeviceContext,
    ) -> Self {
        AutoConnector {
            registry,
            base,
            device,
        }
    }

    /// Match the target's endpoints against every registered component.
    pub fn run(&self, target: &str) -> Result<MatchOutcome, RegistryError> {
        let target = self.registry.lookup(target)?;
        let mut state = MatchState::default();

        for plug in self.registry.usable_endpoints(target, Direction::Plug) {
            for other in self.registry.iter() {
                for slot in self.registry.usable_endpoints(other, Direction::Slot) {
                    if slot.interface == plug.interface {
                        self.consider(&mut state, target, (plug, target), (slot, other));
                    }
                }
            }
        }

        let target_name = target.instance_name();
        for slot in self.registry.usable_endpoints(target, Direction::Slot) {
            for other in self.registry.iter() {
                if other.instance_name() == target_name {
                    continue;
                }
                for plug in self.registry.usable_endpoints(other, Direction::Plug) {
                    if plug.interface == slot.interface {
                        self.consider(&mut state, target, (plug, other), (slot, target));
                    }
                }
            }
        }

        Ok(state.outcome)
    }

    fn consider(
        &self,
        state: &mut MatchState,
        target: &Component,
        (plug, plug_owner): (&Endpoint, &Component),
        (slot, slot_owner): (&Endpoint, &Component),
    ) {
        let mut candidate = Candidate::new(plug, slot);
        let verdict = check_auto_connect(
            Side {
                endpoint: plug,
                component: plug_owner,
            },
            Side {
                endpoint: slot,
                component: slot_owner,
            },
            self.base,
            self.device,
        );

        match verdict {
            Ok(grant) => {
                candidate.slots_per_plug_any = Some(grant.slots_per_plug.is_any());
                if grant.slots_per_plug == Arity::One
                    && state.connected_plugs.contains(&candidate.plug)
                {
                    candidate.reject(Rejection {
                        kind: RejectionKind::ArityExceeded,
                        message: format!(
                            "plug {} already connected and slots-per-plug is 1",
                            candidate.plug
                        ),
                    });
                } else if grant.plugs_per_slot == Arity::One
                    && state.connected_slots.contains(&candidate.slot)
                {
                    candidate.reject(Rejection {
                        kind: RejectionKind::ArityExceeded,
                        message: format!(
                            "slot {} already connected and plugs-per-slot is 1",
                            candidate.slot
                        ),
                    });
                } else {
                    state.connected_plugs.insert(candidate.plug.clone());
                    state.connected_slots.insert(candidate.slot.clone());

                    let target_name = target.instance_name();
                    let mut on_target = Vec::new();
                    if plug.component == target_name {
                        on_target.push(Direction::Plug);
                    }
                    if slot.component == target_name {
                        on_target.push(Direction::Slot);
                    }
                    state.outcome.connections.push(Connection {
                        interface: candidate.interface.clone(),
                        plug: candidate.plug.clone(),
                        slot: candidate.slot.clone(),
                        on_target,
                    });
                }
            }
            Err(rejection) => candidate.reject(rejection),
        }

        let (bucket, key) = if plug.component == target.instance_name() {
            (&mut state.outcome.plug_candidates, &plug.name)
        } else {
            (&mut state.outcome.slot_candidates, &slot.name)
        };
        bucket.entry(key.clone()).or_default().push(candidate);
    }
}

#[derive(Default)]
struct MatchState {
    outcome: MatchOutcome,
    connected_plugs: HashSet<PlugRef>,
    connected_slots: HashSet<SlotRef>,
}
