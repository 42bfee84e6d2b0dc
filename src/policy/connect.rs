//! Connection and auto-connection checks.
//!
//! Which rules decide a pair:
//!
//! 1. a rule in the plug component's own declaration decides alone;
//! 2. otherwise a rule in the slot component's own declaration decides alone;
//! 3. otherwise the base declaration's plug rule and slot rule must both allow.
//!
//! A side with no rule at all denies.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::component::{Component, Direction};
use crate::core::context::DeviceContext;
use crate::decl::{
    resolve_rule, Arity, ArityConstraints, BaseDeclaration, PolicyKind, ResolvedRule, RuleOrigin,
};
use crate::policy::eval::{evaluate, EvalContext, Outcome, Side};

/// Why a candidate was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectionKind {
    /// A deny subrule matched
    Denied,
    /// No allow subrule matched, or no rule applies
    NotAllowed,
    /// Policy allowed it but an endpoint is already at its connection limit
    ArityExceeded,
}

/// A policy or arity rejection. This is an expected outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub message: String,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Arity granted to an accepted auto-connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArityGrant {
    pub slots_per_plug: Arity,
    pub plugs_per_slot: Arity,
}

impl From<ArityConstraints> for ArityGrant {
    fn from(arity: ArityConstraints) -> Self {
        let (slots_per_plug, plugs_per_slot) = arity.effective();
        ArityGrant {
            slots_per_plug,
            plugs_per_slot,
        }
    }
}

/// Evaluate one resolved rule for one kind of decision.
///
/// `owner` is the component whose declaration or endpoint the rule belongs
/// to; it only shapes the rejection message.
pub fn check_rule(
    resolved: ResolvedRule<'_>,
    direction: Direction,
    kind: PolicyKind,
    owner: &Component,
    ctx: &EvalContext<'_>,
) -> Result<(), Rejection> {
    let ResolvedRule::Found { rule, origin } = resolved else {
        return Err(Rejection {
            kind: RejectionKind::NotAllowed,
            message: format!(
                "{} not allowed: no {} rule for interface \"{}\"",
                kind, direction, ctx.interface
            ),
        });
    };

    let describe = || {
        let mut s = format!("{} rule of interface \"{}\"", direction, ctx.interface);
        if origin == RuleOrigin::Component {
            s.push_str(&format!(" for \"{}\" snap", owner.name()));
        }
        s
    };

    match evaluate(rule.policy(kind), ctx) {
        Outcome::Allow => Ok(()),
        Outcome::Deny => Err(Rejection {
            kind: RejectionKind::Denied,
            message: format!("{} denied by {}", kind, describe()),
        }),
        Outcome::NoMatch => Err(Rejection {
            kind: RejectionKind::NotAllowed,
            message: format!("{} not allowed by {}", kind, describe()),
        }),
    }
}

/// Check a pair for manual connection.
pub fn check_connect(
    plug: Side<'_>,
    slot: Side<'_>,
    base: &BaseDeclaration,
    device: &DeviceContext,
) -> Result<(), Rejection> {
    check_pair(plug, slot, base, device, PolicyKind::Connection).map(|_| ())
}

/// Check a pair for auto-connection, returning the arity it may use.
pub fn check_auto_connect(
    plug: Side<'_>,
    slot: Side<'_>,
    base: &BaseDeclaration,
    device: &DeviceContext,
) -> Result<ArityGrant, Rejection> {
    check_pair(plug, slot, base, device, PolicyKind::AutoConnection)
}

fn check_pair(
    plug: Side<'_>,
    slot: Side<'_>,
    base: &BaseDeclaration,
    device: &DeviceContext,
    kind: PolicyKind,
) -> Result<ArityGrant, Rejection> {
    let interface = plug.endpoint.interface.as_str();
    let ctx = EvalContext::connection(plug, slot, device);

    for (side, direction) in [(plug, Direction::Plug), (slot, Direction::Slot)] {
        let own_rule = side
            .component
            .declaration()
            .and_then(|decl| decl.rules().get(direction, interface));
        if let Some(rule) = own_rule {
            let resolved = ResolvedRule::Found {
                rule,
                origin: RuleOrigin::Component,
            };
            check_rule(resolved, direction, kind, side.component, &ctx)?;
            return Ok(rule.arity().into());
        }
    }

    let plug_rule = resolve_rule(interface, Direction::Plug, None, base);
    let slot_rule = resolve_rule(interface, Direction::Slot, None, base);
    check_rule(plug_rule, Direction::Plug, kind, plug.component, &ctx)?;
    check_rule(slot_rule, Direction::Slot, kind, slot.component, &ctx)?;

    let declared = ArityConstraints::default();
    let declared = plug_rule.rule().map_or(declared, |r| declared.or(r.arity()));
    let declared = slot_rule.rule().map_or(declared, |r| declared.or(r.arity()));
    Ok(declared.into())
}
