//! Constraint evaluation.
//!
//! Evaluation is three-valued. `Allow` and `Deny` come only from explicit
//! verdict leaves; predicates yield `Allow` when they hold and `NoMatch`
//! otherwise. Composition:
//!
//! - `All` stops at the first `NoMatch`; otherwise any `Deny` makes it `Deny`.
//! - `Any` stops at the first `Deny`; otherwise any `Allow` makes it `Allow`.
//! - `Not` swaps `Allow` and `NoMatch` and leaves `Deny` alone.
//!
//! So a matching deny branch wins over every allow branch of the same rule.

use serde_json::Value;

use crate::core::attrs::scalar_string;
use crate::core::component::{Component, Direction, Endpoint};
use crate::core::context::DeviceContext;
use crate::decl::{AttrPattern, Constraint, NamePattern, PublisherRef};

/// Result of evaluating a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Allow,
    Deny,
    NoMatch,
}

impl Outcome {
    fn from_bool(holds: bool) -> Outcome {
        if holds {
            Outcome::Allow
        } else {
            Outcome::NoMatch
        }
    }

    pub fn is_allow(self) -> bool {
        self == Outcome::Allow
    }
}

/// One endpoint and the component that owns it.
#[derive(Debug, Clone, Copy)]
pub struct Side<'a> {
    pub endpoint: &'a Endpoint,
    pub component: &'a Component,
}

/// Everything a constraint can observe.
///
/// Installation checks see one side only; connection checks see both.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub interface: &'a str,
    pub plug: Option<Side<'a>>,
    pub slot: Option<Side<'a>>,
    pub device: &'a DeviceContext,
}

impl<'a> EvalContext<'a> {
    /// Context for a plug/slot pair.
    pub fn connection(plug: Side<'a>, slot: Side<'a>, device: &'a DeviceContext) -> Self {
        EvalContext {
            interface: &plug.endpoint.interface,
            plug: Some(plug),
            slot: Some(slot),
            device,
        }
    }

    /// Context for installing one endpoint.
    pub fn installation(side: Side<'a>, device: &'a DeviceContext) -> Self {
        let (plug, slot) = match side.endpoint.direction {
            Direction::Plug => (Some(side), None),
            Direction::Slot => (None, Some(side)),
        };
        EvalContext {
            interface: &side.endpoint.interface,
            plug,
            slot,
            device,
        }
    }

    fn side(&self, direction: Direction) -> Option<Side<'a>> {
        match direction {
            Direction::Plug => self.plug,
            Direction::Slot => self.slot,
        }
    }
}

/// Evaluate a constraint tree.
pub fn evaluate(constraint: &Constraint, ctx: &EvalContext<'_>) -> Outcome {
    match constraint {
        Constraint::Allow => Outcome::Allow,
        Constraint::Deny => Outcome::Deny,
        Constraint::All(children) => {
            let mut denied = false;
            for child in children {
                match evaluate(child, ctx) {
                    Outcome::NoMatch => return Outcome::NoMatch,
                    Outcome::Deny => denied = true,
                    Outcome::Allow => {}
                }
            }
            if denied {
                Outcome::Deny
            } else {
                Outcome::Allow
            }
        }
        Constraint::Any(children) => {
            let mut allowed = false;
            for child in children {
                match evaluate(child, ctx) {
                    Outcome::Deny => return Outcome::Deny,
                    Outcome::Allow => allowed = true,
                    Outcome::NoMatch => {}
                }
            }
            Outcome::from_bool(allowed)
        }
        Constraint::Not(inner) => match evaluate(inner, ctx) {
            Outcome::Allow => Outcome::NoMatch,
            Outcome::NoMatch => Outcome::Allow,
            Outcome::Deny => Outcome::Deny,
        },
        predicate => Outcome::from_bool(holds(predicate, ctx)),
    }
}

fn holds(predicate: &Constraint, ctx: &EvalContext<'_>) -> bool {
    match predicate {
        Constraint::AttrMatches {
            side,
            path,
            pattern,
        } => ctx
            .side(*side)
            .is_some_and(|s| matches_pattern(pattern, s.endpoint.attr(path), ctx)),
        Constraint::AttrPresent { side, path } => ctx
            .side(*side)
            .is_some_and(|s| s.endpoint.attr(path).is_some()),
        Constraint::PublisherIn { side, ids } => {
            let Some(own) = ctx.side(*side) else {
                return false;
            };
            let publisher = own.component.publisher_id();
            ids.iter().any(|id| match id {
                PublisherRef::Id(id) => id == publisher,
                PublisherRef::OtherSide => ctx.side(side.other()).is_some_and(|other| {
                    !publisher.is_empty() && other.component.publisher_id() == publisher
                }),
            })
        }
        Constraint::ComponentIdIn { side, ids } => ctx
            .side(*side)
            .is_some_and(|s| ids.iter().any(|id| *id == s.component.identity().id)),
        Constraint::ComponentTypeIn { side, types } => ctx
            .side(*side)
            .is_some_and(|s| types.iter().any(|t| s.component.kind().satisfies(*t))),
        Constraint::EndpointNameIn { side, names } => ctx.side(*side).is_some_and(|s| {
            names.iter().any(|name| match name {
                NamePattern::Literal(n) => *n == s.endpoint.name,
                NamePattern::Interface => s.endpoint.name == ctx.interface,
            })
        }),
        Constraint::StoreIn(stores) => ctx
            .device
            .store
            .as_ref()
            .is_some_and(|store| stores.contains(store)),
        Constraint::BrandIn(brands) => brands.contains(&ctx.device.brand),
        Constraint::ModelIn(models) => models.contains(&ctx.device.model_id()),
        Constraint::OnClassic(classic) => ctx.device.classic == *classic,
        Constraint::Allow
        | Constraint::Deny
        | Constraint::All(_)
        | Constraint::Any(_)
        | Constraint::Not(_) => false,
    }
}

fn matches_pattern(pattern: &AttrPattern, value: Option<&Value>, ctx: &EvalContext<'_>) -> bool {
    match pattern {
        AttrPattern::Missing => value.is_none(),
        AttrPattern::Any(alternatives) => alternatives
            .iter()
            .any(|alt| matches_pattern(alt, value, ctx)),
        AttrPattern::Map(entries) => match value {
            Some(Value::Object(map)) => entries
                .iter()
                .all(|(key, sub)| matches_pattern(sub, map.get(key), ctx)),
            _ => false,
        },
        AttrPattern::Regex(re) => match value {
            Some(Value::Array(items)) => {
                !items.is_empty()
                    && items
                        .iter()
                        .all(|item| scalar_string(item).is_some_and(|s| re.is_match(&s)))
            }
            Some(scalar) => scalar_string(scalar).is_some_and(|s| re.is_match(&s)),
            None => false,
        },
        AttrPattern::Ref(reference) => {
            let Some(value) = value else {
                return false;
            };
            ctx.side(reference.side)
                .and_then(|s| s.endpoint.attr(&reference.path))
                .is_some_and(|other| other == value)
        }
    }
}
