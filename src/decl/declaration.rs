//! Component and base declarations, and rule resolution.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::core::component::Direction;
use crate::decl::constraint::as_bool;
use crate::decl::rule::Rule;
use crate::decl::store::Record;
use crate::decl::DeclError;

/// Rules keyed by interface, one map per side.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    plugs: BTreeMap<String, Rule>,
    slots: BTreeMap<String, Rule>,
}

impl RuleSet {
    /// Decode the rule map for one side and add it to the set.
    fn decode_side(
        &mut self,
        direction: Direction,
        value: &Value,
        context: &str,
    ) -> Result<(), DeclError> {
        let Value::Object(map) = value else {
            return Err(DeclError::malformed(
                context,
                format!("`{}` must be a map keyed by interface", direction.plural()),
            ));
        };

        for (interface, rule) in map {
            let rule = Rule::decode(interface, direction, rule)?;
            self.side_mut(direction).insert(interface.clone(), rule);
        }
        Ok(())
    }

    fn side_mut(&mut self, direction: Direction) -> &mut BTreeMap<String, Rule> {
        match direction {
            Direction::Plug => &mut self.plugs,
            Direction::Slot => &mut self.slots,
        }
    }

    /// The rule for an interface on one side.
    pub fn get(&self, direction: Direction, interface: &str) -> Option<&Rule> {
        match direction {
            Direction::Plug => self.plugs.get(interface),
            Direction::Slot => self.slots.get(interface),
        }
    }

    /// Whether either side has a rule for this interface.
    pub fn mentions(&self, interface: &str) -> bool {
        self.plugs.contains_key(interface) || self.slots.contains_key(interface)
    }
}

/// A per-component declaration (snap declaration).
#[derive(Debug, Clone)]
pub struct ComponentDeclaration {
    snap_name: String,
    snap_id: String,
    publisher_id: String,
    rules: RuleSet,
}

impl ComponentDeclaration {
    /// Decode a declaration body:
    /// `{"snap-name", "snap-id", "publisher-id", "plugs"?, "slots"?}`.
    pub fn decode(body: &Value) -> Result<ComponentDeclaration, DeclError> {
        let Value::Object(map) = body else {
            return Err(DeclError::malformed(
                "snap declaration",
                "declaration body must be a map",
            ));
        };

        let snap_name = required_str(map, "snap-name", "snap declaration")?;
        let context = format!("snap declaration of `{}`", snap_name);
        let snap_id = optional_str(map, "snap-id", &context)?;
        let publisher_id = optional_str(map, "publisher-id", &context)?;

        let mut rules = RuleSet::default();
        for direction in [Direction::Plug, Direction::Slot] {
            if let Some(value) = map.get(direction.plural()) {
                rules.decode_side(direction, value, &context)?;
            }
        }

        Ok(ComponentDeclaration {
            snap_name,
            snap_id,
            publisher_id,
            rules,
        })
    }

    /// Decode the body of a stored record.
    pub fn from_record(record: &Record) -> Result<ComponentDeclaration, DeclError> {
        ComponentDeclaration::decode(record.body())
    }

    pub fn snap_name(&self) -> &str {
        &self.snap_name
    }

    pub fn snap_id(&self) -> &str {
        &self.snap_id
    }

    pub fn publisher_id(&self) -> &str {
        &self.publisher_id
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }
}

/// The universe-wide base declaration.
#[derive(Debug, Clone)]
pub struct BaseDeclaration {
    rules: RuleSet,
    plug_default: Option<Rule>,
    slot_default: Option<Rule>,
    implicit_core: Vec<String>,
    implicit_classic: Vec<String>,
}

impl BaseDeclaration {
    /// Parse a base declaration document.
    pub fn from_json_str(text: &str) -> Result<BaseDeclaration, DeclError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| DeclError::malformed("base declaration", e.to_string()))?;
        BaseDeclaration::decode(&value)
    }

    /// Decode a base declaration value.
    ///
    /// Slot rules may carry `implicit-on-core` / `implicit-on-classic` flags
    /// naming the interfaces the system component provides.
    pub fn decode(value: &Value) -> Result<BaseDeclaration, DeclError> {
        const CONTEXT: &str = "base declaration";

        let Value::Object(map) = value else {
            return Err(DeclError::malformed(CONTEXT, "document must be a map"));
        };

        for key in map.keys() {
            if !matches!(key.as_str(), "defaults" | "plugs" | "slots") {
                return Err(DeclError::malformed(
                    CONTEXT,
                    format!("unknown section `{}`", key),
                ));
            }
        }

        let mut rules = RuleSet::default();
        if let Some(plugs) = map.get("plugs") {
            rules.decode_side(Direction::Plug, plugs, CONTEXT)?;
        }

        let mut implicit_core = Vec::new();
        let mut implicit_classic = Vec::new();
        if let Some(slots) = map.get("slots") {
            let Value::Object(slots) = slots else {
                return Err(DeclError::malformed(CONTEXT, "`slots` must be a map"));
            };
            let mut stripped = Map::new();
            for (interface, rule) in slots {
                let mut rule = rule.clone();
                if let Value::Object(subrules) = &mut rule {
                    for (flag, list) in [
                        ("implicit-on-core", &mut implicit_core),
                        ("implicit-on-classic", &mut implicit_classic),
                    ] {
                        if let Some(v) = subrules.remove(flag) {
                            let on = as_bool(&v).ok_or_else(|| {
                                DeclError::malformed(
                                    format!("slot rule of interface `{}`", interface),
                                    format!("`{}` must be a boolean", flag),
                                )
                            })?;
                            if on {
                                list.push(interface.clone());
                            }
                        }
                    }
                }
                stripped.insert(interface.clone(), rule);
            }
            rules.decode_side(Direction::Slot, &Value::Object(stripped), CONTEXT)?;
        }

        let (plug_default, slot_default) = match map.get("defaults") {
            Some(Value::Object(defaults)) => {
                for key in defaults.keys() {
                    if !matches!(key.as_str(), "plugs" | "slots") {
                        return Err(DeclError::malformed(
                            CONTEXT,
                            format!("unknown defaults section `{}`", key),
                        ));
                    }
                }
                let plug = defaults
                    .get("plugs")
                    .map(|v| Rule::decode("defaults", Direction::Plug, v))
                    .transpose()?;
                let slot = defaults
                    .get("slots")
                    .map(|v| Rule::decode("defaults", Direction::Slot, v))
                    .transpose()?;
                (plug, slot)
            }
            Some(_) => return Err(DeclError::malformed(CONTEXT, "`defaults` must be a map")),
            None => (None, None),
        };

        Ok(BaseDeclaration {
            rules,
            plug_default,
            slot_default,
            implicit_core,
            implicit_classic,
        })
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Whether the base declaration has a rule for this interface on any side.
    pub fn knows_interface(&self, interface: &str) -> bool {
        self.rules.mentions(interface)
    }

    /// Default rule for a side, used for known interfaces without a rule there.
    pub fn default_rule(&self, direction: Direction) -> Option<&Rule> {
        match direction {
            Direction::Plug => self.plug_default.as_ref(),
            Direction::Slot => self.slot_default.as_ref(),
        }
    }

    /// Interfaces the system component provides in the given mode.
    pub fn implicit_slots(&self, classic: bool) -> &[String] {
        if classic {
            &self.implicit_classic
        } else {
            &self.implicit_core
        }
    }
}

/// Where a resolved rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOrigin {
    /// The component's own declaration
    Component,
    /// The base declaration's rule for the interface
    Base,
    /// The base declaration's per-side default
    BaseDefault,
}

/// Result of rule resolution: exactly one rule, or none.
#[derive(Debug, Clone, Copy)]
pub enum ResolvedRule<'a> {
    Found { rule: &'a Rule, origin: RuleOrigin },
    /// No applicable rule; the decision is deny.
    NoRule,
}

impl<'a> ResolvedRule<'a> {
    pub fn rule(&self) -> Option<&'a Rule> {
        match self {
            ResolvedRule::Found { rule, .. } => Some(rule),
            ResolvedRule::NoRule => None,
        }
    }

    pub fn origin(&self) -> Option<RuleOrigin> {
        match self {
            ResolvedRule::Found { origin, .. } => Some(*origin),
            ResolvedRule::NoRule => None,
        }
    }
}

/// Resolve the rule for `interface` on `direction`.
///
/// Most specific wins: the component's declaration, then the base
/// declaration's rule for the interface, then the base default for the side
/// (only for interfaces the base declaration knows), then `NoRule`.
pub fn resolve_rule<'a>(
    interface: &str,
    direction: Direction,
    component: Option<&'a ComponentDeclaration>,
    base: &'a BaseDeclaration,
) -> ResolvedRule<'a> {
    if let Some(rule) = component.and_then(|decl| decl.rules.get(direction, interface)) {
        return ResolvedRule::Found {
            rule,
            origin: RuleOrigin::Component,
        };
    }

    if let Some(rule) = base.rules.get(direction, interface) {
        return ResolvedRule::Found {
            rule,
            origin: RuleOrigin::Base,
        };
    }

    if base.knows_interface(interface) {
        if let Some(rule) = base.default_rule(direction) {
            return ResolvedRule::Found {
                rule,
                origin: RuleOrigin::BaseDefault,
            };
        }
    }

    ResolvedRule::NoRule
}

fn required_str(map: &Map<String, Value>, key: &str, context: &str) -> Result<String, DeclError> {
    match map.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(DeclError::malformed(
            context,
            format!("`{}` must be a non-empty string", key),
        )),
    }
}

fn optional_str(map: &Map<String, Value>, key: &str, context: &str) -> Result<String, DeclError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(DeclError::malformed(
            context,
            format!("`{}` must be a string", key),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> BaseDeclaration {
        BaseDeclaration::decode(&json!({
            "defaults": {"plugs": true},
            "plugs": {"secret": {"allow-installation": false}},
            "slots": {
                "network": {"implicit-on-core": true, "implicit-on-classic": true},
                "x11": {"implicit-on-classic": "true", "allow-installation": true}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_implicit_slots() {
        let base = base();
        assert_eq!(base.implicit_slots(false), ["network"]);
        assert_eq!(base.implicit_slots(true), ["network", "x11"]);
    }

    #[test]
    fn test_resolution_order() {
        let base = base();
        let decl = ComponentDeclaration::decode(&json!({
            "snap-name": "app",
            "publisher-id": "acme",
            "plugs": {"network": {"allow-auto-connection": false}}
        }))
        .unwrap();

        let resolved = resolve_rule("network", Direction::Plug, Some(&decl), &base);
        assert_eq!(resolved.origin(), Some(RuleOrigin::Component));

        let resolved = resolve_rule("network", Direction::Slot, Some(&decl), &base);
        assert_eq!(resolved.origin(), Some(RuleOrigin::Base));

        let resolved = resolve_rule("x11", Direction::Plug, None, &base);
        assert_eq!(resolved.origin(), Some(RuleOrigin::BaseDefault));

        // No slot default, and an unknown interface gets nothing.
        assert!(resolve_rule("secret", Direction::Slot, None, &base).rule().is_none());
        assert!(resolve_rule("unheard-of", Direction::Plug, None, &base)
            .rule()
            .is_none());
    }

    #[test]
    fn test_declaration_fields() {
        let decl = ComponentDeclaration::decode(&json!({
            "snap-name": "app",
            "snap-id": "app-id",
            "publisher-id": "acme",
            "slots": {"content": true}
        }))
        .unwrap();
        assert_eq!(decl.snap_name(), "app");
        assert_eq!(decl.snap_id(), "app-id");
        assert_eq!(decl.publisher_id(), "acme");
        assert!(decl.rules().get(Direction::Slot, "content").is_some());
        assert!(decl.rules().get(Direction::Plug, "content").is_none());
    }

    #[test]
    fn test_malformed_declarations() {
        assert!(ComponentDeclaration::decode(&json!({"publisher-id": "acme"})).is_err());
        assert!(ComponentDeclaration::decode(&json!({"snap-name": "a", "plugs": []})).is_err());
        assert!(BaseDeclaration::decode(&json!({"interfaces": {}})).is_err());
        assert!(BaseDeclaration::decode(&json!({
            "slots": {"network": {"implicit-on-core": "yes"}}
        }))
        .is_err());
        assert!(BaseDeclaration::from_json_str("{ not json").is_err());
    }
}
