//! Constraint expressions.
//!
//! A [`Constraint`] is a tagged tree decoded from a declaration subrule such
//! as `allow-auto-connection`. Leaves are predicates over the endpoints,
//! their components and the device; `Allow` and `Deny` are explicit verdict
//! leaves; `All`, `Any` and `Not` compose.
//!
//! Decoding accepts the snap-declaration syntax:
//!
//! ```json
//! {
//!   "plug-attributes": { "content": "$SLOT(content)" },
//!   "slot-snap-type": ["core"],
//!   "plug-publisher-id": ["$SLOT_PUBLISHER_ID"],
//!   "on-classic": false
//! }
//! ```
//!
//! A list of such maps is an OR of alternatives. Every structural problem is
//! reported as [`DeclError::MalformedDeclaration`].

use regex::Regex;
use serde_json::{Map, Value};

use crate::core::attrs::AttrPath;
use crate::core::component::{ComponentType, Direction};
use crate::decl::rule::{Arity, ArityConstraints, PolicyKind};
use crate::decl::DeclError;

/// A reference to an attribute of one endpoint (`$PLUG(path)`, `$SLOT(path)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrRef {
    pub side: Direction,
    pub path: AttrPath,
}

/// Pattern an attribute value must match.
#[derive(Debug, Clone)]
pub enum AttrPattern {
    /// Anchored regular expression over the scalar string form.
    Regex(Regex),
    /// Any of the alternatives.
    Any(Vec<AttrPattern>),
    /// Nested map; every listed key must match.
    Map(Vec<(String, AttrPattern)>),
    /// The attribute must be absent (`$MISSING`).
    Missing,
    /// Equal to an attribute of an endpoint.
    Ref(AttrRef),
}

/// Publisher id entry in a `*-publisher-id` constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublisherRef {
    Id(String),
    /// Same publisher as the other side of the connection.
    OtherSide,
}

/// Endpoint name entry in a `*-names` constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamePattern {
    Literal(String),
    /// The endpoint is named after its interface (`$INTERFACE`).
    Interface,
}

/// A decoded constraint expression.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Explicit allow verdict.
    Allow,
    /// Explicit deny verdict; wins over any sibling allow.
    Deny,
    AttrMatches {
        side: Direction,
        path: AttrPath,
        pattern: AttrPattern,
    },
    AttrPresent {
        side: Direction,
        path: AttrPath,
    },
    PublisherIn {
        side: Direction,
        ids: Vec<PublisherRef>,
    },
    ComponentIdIn {
        side: Direction,
        ids: Vec<String>,
    },
    ComponentTypeIn {
        side: Direction,
        types: Vec<ComponentType>,
    },
    EndpointNameIn {
        side: Direction,
        names: Vec<NamePattern>,
    },
    StoreIn(Vec<String>),
    BrandIn(Vec<String>),
    /// `brand/model` identifiers.
    ModelIn(Vec<String>),
    OnClassic(bool),
    All(Vec<Constraint>),
    Any(Vec<Constraint>),
    Not(Box<Constraint>),
}

impl Constraint {
    /// A guard that always matches.
    pub fn always() -> Constraint {
        Constraint::All(Vec::new())
    }

    /// A guard that never matches.
    pub fn never() -> Constraint {
        Constraint::Any(Vec::new())
    }

    /// Combine a deny guard and an allow guard into one policy tree.
    ///
    /// The result is `Any[All[deny, Deny], All[allow, Allow]]`: when the deny
    /// guard matches the policy denies regardless of the allow branch.
    pub fn policy(deny: Constraint, allow: Constraint) -> Constraint {
        Constraint::Any(vec![
            Constraint::All(vec![deny, Constraint::Deny]),
            Constraint::All(vec![allow, Constraint::Allow]),
        ])
    }
}

/// Where a subrule is being decoded, for validation and error messages.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope<'a> {
    pub interface: &'a str,
    pub direction: Direction,
    pub kind: PolicyKind,
    pub subrule: &'a str,
}

impl Scope<'_> {
    fn context(&self) -> String {
        format!(
            "{} rule of interface `{}`, {}",
            self.direction, self.interface, self.subrule
        )
    }

    fn malformed(&self, message: impl Into<String>) -> DeclError {
        DeclError::malformed(self.context(), message)
    }

    fn check_side(&self, side: Direction, key: &str) -> Result<(), DeclError> {
        if self.kind == PolicyKind::Installation && side != self.direction {
            return Err(self.malformed(format!(
                "installation constraints of a {} rule cannot use `{}`",
                self.direction, key
            )));
        }
        Ok(())
    }
}

/// Decode a subrule value into a guard plus any arity it declares.
///
/// Accepts a boolean (or `"true"`/`"false"`), a constraints map, or a
/// non-empty list of constraints maps.
pub(crate) fn decode_subrule(
    value: &Value,
    scope: &Scope<'_>,
    allow_arity: bool,
) -> Result<(Constraint, ArityConstraints), DeclError> {
    if let Some(b) = as_bool(value) {
        let guard = if b {
            Constraint::always()
        } else {
            Constraint::never()
        };
        return Ok((guard, ArityConstraints::default()));
    }

    match value {
        Value::Object(map) => decode_constraints(map, scope, allow_arity),
        Value::Array(items) => {
            if items.is_empty() {
                return Err(scope.malformed("alternative list cannot be empty"));
            }
            let mut alternatives = Vec::with_capacity(items.len());
            let mut arity = ArityConstraints::default();
            for item in items {
                let Value::Object(map) = item else {
                    return Err(scope.malformed("alternatives must be constraint maps"));
                };
                let (guard, alt_arity) = decode_constraints(map, scope, allow_arity)?;
                arity = arity.or(alt_arity);
                alternatives.push(guard);
            }
            Ok((Constraint::Any(alternatives), arity))
        }
        other => Err(scope.malformed(format!(
            "expected boolean, constraints map or list of them, got {}",
            other
        ))),
    }
}

fn decode_constraints(
    map: &Map<String, Value>,
    scope: &Scope<'_>,
    allow_arity: bool,
) -> Result<(Constraint, ArityConstraints), DeclError> {
    let mut parts = Vec::new();
    let mut arity = ArityConstraints::default();

    for (key, value) in map {
        match key.as_str() {
            "plug-attributes" | "slot-attributes" => {
                let side = side_of(key);
                scope.check_side(side, key)?;
                let Value::Object(attrs) = value else {
                    return Err(scope.malformed(format!("`{}` must be a map", key)));
                };
                for (name, pattern) in attrs {
                    let path = AttrPath::parse(name).ok_or_else(|| {
                        scope.malformed(format!("invalid attribute name `{}`", name))
                    })?;
                    match decode_pattern(pattern, scope)? {
                        AttrPattern::Missing => parts.push(Constraint::Not(Box::new(
                            Constraint::AttrPresent { side, path },
                        ))),
                        pattern => parts.push(Constraint::AttrMatches {
                            side,
                            path,
                            pattern,
                        }),
                    }
                }
            }
            "plug-snap-type" | "slot-snap-type" => {
                let side = side_of(key);
                scope.check_side(side, key)?;
                let types = string_list(value, key, scope)?
                    .into_iter()
                    .map(|t| {
                        t.parse::<ComponentType>()
                            .map_err(|e| scope.malformed(format!("`{}`: {}", key, e)))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                parts.push(Constraint::ComponentTypeIn { side, types });
            }
            "plug-snap-id" | "slot-snap-id" => {
                let side = side_of(key);
                scope.check_side(side, key)?;
                let ids = string_list(value, key, scope)?;
                parts.push(Constraint::ComponentIdIn { side, ids });
            }
            "plug-publisher-id" | "slot-publisher-id" => {
                let side = side_of(key);
                scope.check_side(side, key)?;
                let ids = string_list(value, key, scope)?
                    .into_iter()
                    .map(|id| decode_publisher(&id, side, key, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                parts.push(Constraint::PublisherIn { side, ids });
            }
            "plug-names" | "slot-names" => {
                let side = side_of(key);
                scope.check_side(side, key)?;
                let names = string_list(value, key, scope)?
                    .into_iter()
                    .map(|n| match n.as_str() {
                        "$INTERFACE" => Ok(NamePattern::Interface),
                        s if s.starts_with('$') => {
                            Err(scope.malformed(format!("`{}`: unknown directive `{}`", key, s)))
                        }
                        _ => Ok(NamePattern::Literal(n)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                parts.push(Constraint::EndpointNameIn { side, names });
            }
            "on-classic" => {
                let b = as_bool(value)
                    .ok_or_else(|| scope.malformed("`on-classic` must be a boolean"))?;
                parts.push(Constraint::OnClassic(b));
            }
            "on-store" => parts.push(Constraint::StoreIn(string_list(value, key, scope)?)),
            "on-brand" => parts.push(Constraint::BrandIn(string_list(value, key, scope)?)),
            "on-model" => {
                let models = string_list(value, key, scope)?;
                for model in &models {
                    let valid = model
                        .split_once('/')
                        .is_some_and(|(b, m)| !b.is_empty() && !m.is_empty() && !m.contains('/'));
                    if !valid {
                        return Err(scope.malformed(format!(
                            "`on-model` entries must be `brand/model`, got `{}`",
                            model
                        )));
                    }
                }
                parts.push(Constraint::ModelIn(models));
            }
            "slots-per-plug" | "plugs-per-slot" => {
                if !allow_arity {
                    return Err(scope.malformed(format!(
                        "`{}` is only valid in allow-auto-connection",
                        key
                    )));
                }
                let parsed = Arity::from_value(value).ok_or_else(|| {
                    scope.malformed(format!("`{}` must be 1 or \"*\", got {}", key, value))
                })?;
                if key == "slots-per-plug" {
                    arity.slots_per_plug = Some(parsed);
                } else {
                    arity.plugs_per_slot = Some(parsed);
                }
            }
            other => {
                return Err(scope.malformed(format!("unknown constraint `{}`", other)));
            }
        }
    }

    Ok((Constraint::All(parts), arity))
}

/// Decode an attribute pattern.
pub(crate) fn decode_pattern(value: &Value, scope: &Scope<'_>) -> Result<AttrPattern, DeclError> {
    match value {
        Value::String(s) if s.starts_with('$') => decode_directive(s, scope),
        Value::String(s) => {
            let re = Regex::new(&format!("^(?:{})$", s))
                .map_err(|e| scope.malformed(format!("invalid pattern `{}`: {}", s, e)))?;
            Ok(AttrPattern::Regex(re))
        }
        Value::Bool(_) | Value::Number(_) => {
            let literal = regex::escape(&value.to_string());
            let re = Regex::new(&format!("^{}$", literal))
                .map_err(|e| scope.malformed(format!("invalid pattern `{}`: {}", value, e)))?;
            Ok(AttrPattern::Regex(re))
        }
        Value::Array(items) => {
            if items.is_empty() {
                return Err(scope.malformed("attribute alternatives cannot be empty"));
            }
            let alternatives = items
                .iter()
                .map(|item| decode_pattern(item, scope))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AttrPattern::Any(alternatives))
        }
        Value::Object(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, sub) in map {
                if AttrPath::parse(key).is_none() || key.contains('.') {
                    return Err(scope.malformed(format!("invalid attribute name `{}`", key)));
                }
                entries.push((key.clone(), decode_pattern(sub, scope)?));
            }
            Ok(AttrPattern::Map(entries))
        }
        Value::Null => Err(scope.malformed("attribute pattern cannot be null")),
    }
}

fn decode_directive(s: &str, scope: &Scope<'_>) -> Result<AttrPattern, DeclError> {
    if s == "$MISSING" {
        return Ok(AttrPattern::Missing);
    }

    let (side, rest) = if let Some(rest) = s.strip_prefix("$PLUG(") {
        (Direction::Plug, rest)
    } else if let Some(rest) = s.strip_prefix("$SLOT(") {
        (Direction::Slot, rest)
    } else {
        return Err(scope.malformed(format!("unknown directive `{}`", s)));
    };

    let path = rest
        .strip_suffix(')')
        .and_then(AttrPath::parse)
        .ok_or_else(|| scope.malformed(format!("invalid attribute reference `{}`", s)))?;

    if scope.kind == PolicyKind::Installation && side != scope.direction {
        return Err(scope.malformed(format!(
            "installation constraints cannot reference `{}`",
            s
        )));
    }

    Ok(AttrPattern::Ref(AttrRef { side, path }))
}

fn decode_publisher(
    id: &str,
    side: Direction,
    key: &str,
    scope: &Scope<'_>,
) -> Result<PublisherRef, DeclError> {
    let other = match id {
        "$PLUG_PUBLISHER_ID" => Direction::Plug,
        "$SLOT_PUBLISHER_ID" => Direction::Slot,
        s if s.starts_with('$') => {
            return Err(scope.malformed(format!("`{}`: unknown directive `{}`", key, s)));
        }
        _ => return Ok(PublisherRef::Id(id.to_string())),
    };

    if other == side || scope.kind == PolicyKind::Installation {
        return Err(scope.malformed(format!("`{}` cannot use `{}`", key, id)));
    }
    Ok(PublisherRef::OtherSide)
}

fn side_of(key: &str) -> Direction {
    if key.starts_with("plug-") {
        Direction::Plug
    } else {
        Direction::Slot
    }
}

/// Booleans may appear as JSON booleans or as the strings used in signed
/// assertion headers.
pub(crate) fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s == "true" => Some(true),
        Value::String(s) if s == "false" => Some(false),
        _ => None,
    }
}

fn string_list(value: &Value, key: &str, scope: &Scope<'_>) -> Result<Vec<String>, DeclError> {
    let list = match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| scope.malformed(format!("`{}` entries must be strings", key)))
            })
            .collect::<Result<Vec<_>, _>>()?,
        _ => {
            return Err(scope.malformed(format!("`{}` must be a string or list of strings", key)));
        }
    };

    if list.is_empty() {
        return Err(scope.malformed(format!("`{}` cannot be empty", key)));
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scope(kind: PolicyKind) -> Scope<'static> {
        Scope {
            interface: "content",
            direction: Direction::Slot,
            kind,
            subrule: "allow-auto-connection",
        }
    }

    fn decode(value: Value) -> Result<(Constraint, ArityConstraints), DeclError> {
        decode_subrule(&value, &scope(PolicyKind::AutoConnection), true)
    }

    #[test]
    fn test_bool_subrules() {
        assert!(matches!(decode(json!(true)).unwrap().0, Constraint::All(ref c) if c.is_empty()));
        assert!(matches!(decode(json!("false")).unwrap().0, Constraint::Any(ref c) if c.is_empty()));
    }

    #[test]
    fn test_decode_constraints_map() {
        let (c, arity) = decode(json!({
            "plug-attributes": {"content": "$SLOT(content)", "legacy": "$MISSING"},
            "plug-publisher-id": ["$SLOT_PUBLISHER_ID", "acme"],
            "slot-snap-type": ["core", "gadget"],
            "on-classic": "false",
            "slots-per-plug": "*"
        }))
        .unwrap();

        let Constraint::All(parts) = c else {
            panic!("expected All");
        };
        assert_eq!(parts.len(), 5);
        assert!(parts.iter().any(|p| matches!(p, Constraint::AttrMatches {
            pattern: AttrPattern::Ref(AttrRef { side: Direction::Slot, .. }),
            ..
        })));
        assert!(parts.iter().any(|p| matches!(p, Constraint::Not(inner)
            if matches!(**inner, Constraint::AttrPresent { .. }))));
        assert!(parts.iter().any(|p| matches!(p, Constraint::PublisherIn { ids, .. }
            if ids[0] == PublisherRef::OtherSide && ids[1] == PublisherRef::Id("acme".into()))));
        assert!(parts.iter().any(|p| matches!(p, Constraint::OnClassic(false))));
        assert_eq!(arity.slots_per_plug, Some(Arity::Any));
        assert_eq!(arity.plugs_per_slot, None);
    }

    #[test]
    fn test_alternatives_take_first_arity() {
        let (c, arity) = decode(json!([
            {"on-store": ["a"], "plugs-per-slot": 1},
            {"on-store": "b", "plugs-per-slot": "*", "slots-per-plug": "*"}
        ]))
        .unwrap();
        assert!(matches!(c, Constraint::Any(ref alts) if alts.len() == 2));
        assert_eq!(arity.plugs_per_slot, Some(Arity::One));
        assert_eq!(arity.slots_per_plug, Some(Arity::Any));
    }

    #[test]
    fn test_malformed_references() {
        for bad in [
            json!({"plug-attributes": {"content": "$SLOT()"}}),
            json!({"plug-attributes": {"content": "$SLOT(a..b)"}}),
            json!({"plug-attributes": {"content": "$SLOT(content"}}),
            json!({"plug-attributes": {"content": "$OTHER(content)"}}),
            json!({"plug-attributes": {"bad key": "x"}}),
            json!({"plug-attributes": {"content": "("}}),
            json!({"plug-publisher-id": ["$PLUG_PUBLISHER_ID"]}),
            json!({"plug-publisher-id": ["$NOBODY"]}),
            json!({"plug-attrbutes": {}}),
            json!({"on-classic": "maybe"}),
            json!({"on-model": ["no-slash"]}),
            json!({"slot-snap-type": ["toaster"]}),
            json!({"slots-per-plug": 2}),
            json!({"on-store": []}),
            json!([]),
            json!(42),
        ] {
            let err = decode(bad.clone()).unwrap_err();
            assert!(
                matches!(err, DeclError::MalformedDeclaration { .. }),
                "expected malformed for {}",
                bad
            );
        }
    }

    #[test]
    fn test_arity_outside_auto_connection() {
        let err = decode_subrule(
            &json!({"slots-per-plug": "*"}),
            &scope(PolicyKind::Connection),
            false,
        )
        .unwrap_err();
        assert!(err.to_string().contains("only valid in allow-auto-connection"));
    }

    #[test]
    fn test_installation_cannot_reference_other_side() {
        let install = scope(PolicyKind::Installation);
        assert!(decode_subrule(&json!({"slot-snap-type": ["core"]}), &install, false).is_ok());
        assert!(decode_subrule(&json!({"plug-snap-type": ["app"]}), &install, false).is_err());
        assert!(decode_subrule(
            &json!({"slot-attributes": {"content": "$PLUG(content)"}}),
            &install,
            false
        )
        .is_err());
    }

    #[test]
    fn test_scalar_patterns_are_literal() {
        let pattern = decode_pattern(&json!(1.5), &scope(PolicyKind::Connection)).unwrap();
        let AttrPattern::Regex(re) = pattern else {
            panic!("expected regex");
        };
        assert!(re.is_match("1.5"));
        assert!(!re.is_match("105"));
    }
}
