//! Typed declaration rules.
//!
//! A [`Rule`] holds the decoded policy for one interface on one side
//! (plugs or slots): an installation policy, a connection policy and an
//! auto-connection policy, plus the arity limits declared by
//! `allow-auto-connection`.

use std::fmt;

use serde_json::{Map, Value};

use crate::core::component::Direction;
use crate::decl::constraint::{as_bool, decode_subrule, Constraint, Scope};
use crate::decl::DeclError;

/// Which decision a policy governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Installation,
    Connection,
    AutoConnection,
}

impl PolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::Installation => "installation",
            PolicyKind::Connection => "connection",
            PolicyKind::AutoConnection => "auto-connection",
        }
    }

    fn allow_key(self) -> &'static str {
        match self {
            PolicyKind::Installation => "allow-installation",
            PolicyKind::Connection => "allow-connection",
            PolicyKind::AutoConnection => "allow-auto-connection",
        }
    }

    fn deny_key(self) -> &'static str {
        match self {
            PolicyKind::Installation => "deny-installation",
            PolicyKind::Connection => "deny-connection",
            PolicyKind::AutoConnection => "deny-auto-connection",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const SUBRULE_KEYS: [&str; 6] = [
    "allow-installation",
    "deny-installation",
    "allow-connection",
    "deny-connection",
    "allow-auto-connection",
    "deny-auto-connection",
];

/// Fan-out limit for one side of an auto-connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// At most one connection (`1`)
    One,
    /// Unbounded (`*`)
    Any,
}

impl Arity {
    /// Parse `1`, `"1"` or `"*"`.
    pub fn from_value(value: &Value) -> Option<Arity> {
        match value {
            Value::Number(n) if n.as_u64() == Some(1) => Some(Arity::One),
            Value::String(s) if s == "1" => Some(Arity::One),
            Value::String(s) if s == "*" => Some(Arity::Any),
            _ => None,
        }
    }

    pub fn is_any(self) -> bool {
        self == Arity::Any
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::One => f.write_str("1"),
            Arity::Any => f.write_str("*"),
        }
    }
}

/// Arity limits as declared; unset sides fall back to a less specific rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArityConstraints {
    pub slots_per_plug: Option<Arity>,
    pub plugs_per_slot: Option<Arity>,
}

impl ArityConstraints {
    /// Fill unset limits from `other`.
    pub fn or(self, other: ArityConstraints) -> ArityConstraints {
        ArityConstraints {
            slots_per_plug: self.slots_per_plug.or(other.slots_per_plug),
            plugs_per_slot: self.plugs_per_slot.or(other.plugs_per_slot),
        }
    }

    /// Resolve to concrete limits: one slot per plug, any plugs per slot.
    pub fn effective(self) -> (Arity, Arity) {
        (
            self.slots_per_plug.unwrap_or(Arity::One),
            self.plugs_per_slot.unwrap_or(Arity::Any),
        )
    }
}

/// Decoded rule for one interface on one side.
#[derive(Debug, Clone)]
pub struct Rule {
    interface: String,
    direction: Direction,
    installation: Constraint,
    connection: Constraint,
    auto_connection: Constraint,
    arity: ArityConstraints,
}

impl Rule {
    /// Decode a rule document.
    ///
    /// The document is a map of subrules, or the `true` / `false` shorthand
    /// which allows or denies every kind.
    pub fn decode(interface: &str, direction: Direction, value: &Value) -> Result<Rule, DeclError> {
        if let Some(allowed) = as_bool(value) {
            let mut rule = Rule::permissive(interface, direction);
            if !allowed {
                let deny = Constraint::policy(Constraint::always(), Constraint::never());
                rule.installation = deny.clone();
                rule.connection = deny.clone();
                rule.auto_connection = deny;
            }
            return Ok(rule);
        }

        let Value::Object(map) = value else {
            return Err(DeclError::malformed(
                format!("{} rule of interface `{}`", direction, interface),
                format!("expected a map of subrules, got {}", value),
            ));
        };

        for key in map.keys() {
            if !SUBRULE_KEYS.contains(&key.as_str()) {
                return Err(DeclError::malformed(
                    format!("{} rule of interface `{}`", direction, interface),
                    format!("unknown subrule `{}`", key),
                ));
            }
        }

        let installation = decode_kind(map, interface, direction, PolicyKind::Installation)?;
        let connection = decode_kind(map, interface, direction, PolicyKind::Connection)?;

        // Auto-connection inherits from connection subrule by subrule.
        let (auto_allow, arity) = match map.get("allow-auto-connection") {
            Some(v) => decode_subrule(
                v,
                &scope(interface, direction, PolicyKind::AutoConnection, "allow-auto-connection"),
                true,
            )?,
            None => (
                decode_guard(map, interface, direction, PolicyKind::Connection, true)?,
                ArityConstraints::default(),
            ),
        };
        let auto_deny = match map.get("deny-auto-connection") {
            Some(_) => decode_guard(map, interface, direction, PolicyKind::AutoConnection, false)?,
            None => decode_guard(map, interface, direction, PolicyKind::Connection, false)?,
        };

        Ok(Rule {
            interface: interface.to_string(),
            direction,
            installation,
            connection,
            auto_connection: Constraint::policy(auto_deny, auto_allow),
            arity,
        })
    }

    /// A rule that allows everything and declares no arity.
    pub fn permissive(interface: &str, direction: Direction) -> Rule {
        let allow = Constraint::policy(Constraint::never(), Constraint::always());
        Rule {
            interface: interface.to_string(),
            direction,
            installation: allow.clone(),
            connection: allow.clone(),
            auto_connection: allow,
            arity: ArityConstraints::default(),
        }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// The policy tree for one kind of decision.
    pub fn policy(&self, kind: PolicyKind) -> &Constraint {
        match kind {
            PolicyKind::Installation => &self.installation,
            PolicyKind::Connection => &self.connection,
            PolicyKind::AutoConnection => &self.auto_connection,
        }
    }

    /// Arity declared by `allow-auto-connection`.
    pub fn arity(&self) -> ArityConstraints {
        self.arity
    }
}

fn scope<'a>(
    interface: &'a str,
    direction: Direction,
    kind: PolicyKind,
    subrule: &'a str,
) -> Scope<'a> {
    Scope {
        interface,
        direction,
        kind,
        subrule,
    }
}

fn decode_kind(
    map: &Map<String, Value>,
    interface: &str,
    direction: Direction,
    kind: PolicyKind,
) -> Result<Constraint, DeclError> {
    let allow = decode_guard(map, interface, direction, kind, true)?;
    let deny = decode_guard(map, interface, direction, kind, false)?;
    Ok(Constraint::policy(deny, allow))
}

/// Decode one subrule; a missing allow matches, a missing deny never does.
fn decode_guard(
    map: &Map<String, Value>,
    interface: &str,
    direction: Direction,
    kind: PolicyKind,
    allow: bool,
) -> Result<Constraint, DeclError> {
    let key = if allow { kind.allow_key() } else { kind.deny_key() };
    match map.get(key) {
        Some(value) => {
            let (guard, _) = decode_subrule(value, &scope(interface, direction, kind, key), false)?;
            Ok(guard)
        }
        None if allow => Ok(Constraint::always()),
        None => Ok(Constraint::never()),
    }
}
