//! Installation checks.

use std::collections::BTreeMap;

use crate::core::component::{Component, Endpoint};
use crate::core::context::DeviceContext;
use crate::decl::{resolve_rule, BaseDeclaration, PolicyKind};
use crate::policy::connect::check_rule;
use crate::policy::eval::{EvalContext, Side};

/// Result of checking one component for installation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallCheck {
    /// No endpoint was rejected
    pub ok: bool,

    /// First rejection reason, empty when ok
    pub error: String,

    /// Rejected endpoints by name, with the reason
    pub bad_interfaces: BTreeMap<String, String>,
}

impl InstallCheck {
    /// Whether an endpoint was rejected and must be left out of matching.
    pub fn is_bad(&self, endpoint: &Endpoint) -> bool {
        self.bad_interfaces.contains_key(&endpoint.name)
    }
}

/// Check every plug, then every slot, of a component against its
/// installation policy.
///
/// A rejected endpoint does not stop the check; the component still installs
/// without it.
pub fn check_install(
    component: &Component,
    base: &BaseDeclaration,
    device: &DeviceContext,
) -> InstallCheck {
    let mut check = InstallCheck {
        ok: true,
        ..InstallCheck::default()
    };

    for endpoint in component.plugs().iter().chain(component.slots()) {
        let resolved = resolve_rule(
            &endpoint.interface,
            endpoint.direction,
            component.declaration(),
            base,
        );
        let ctx = EvalContext::installation(
            Side {
                endpoint,
                component,
            },
            device,
        );

        if let Err(rejection) = check_rule(
            resolved,
            endpoint.direction,
            PolicyKind::Installation,
            component,
            &ctx,
        ) {
            if check.ok {
                check.ok = false;
                check.error = rejection.message.clone();
            }
            check
                .bad_interfaces
                .entry(endpoint.name.clone())
                .or_insert(rejection.message);
        }
    }

    check
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::component::ComponentIdentity;
    use crate::core::manifest::ComponentManifest;
    use crate::decl::ComponentDeclaration;
    use serde_json::json;

    fn base() -> BaseDeclaration {
        BaseDeclaration::builtin().unwrap()
    }

    fn component(yaml: &str, decl: Option<ComponentDeclaration>) -> Component {
        Component::from_manifest(
            ComponentManifest::parse(yaml).unwrap(),
            ComponentIdentity::default(),
            decl,
        )
    }

    #[test]
    fn test_clean_install() {
        let app = component("name: app\nplugs:\n  network:\n  home:\n", None);
        let check = check_install(&app, &base(), &DeviceContext::default());
        assert!(check.ok);
        assert!(check.error.is_empty());
        assert!(check.bad_interfaces.is_empty());
    }

    #[test]
    fn test_forbidden_plug_is_bad() {
        let app = component("name: app\nplugs:\n  network:\n  snapd-control:\n", None);
        let check = check_install(&app, &base(), &DeviceContext::default());
        assert!(!check.ok);
        assert_eq!(check.bad_interfaces.len(), 1);
        assert!(check.bad_interfaces.contains_key("snapd-control"));
        assert!(check.error.contains("installation not allowed"));
        assert!(check.is_bad(&app.plugs()[1]));
        assert!(!check.is_bad(&app.plugs()[0]));
    }

    #[test]
    fn test_app_cannot_provide_core_slot() {
        let app = component("name: app\nslots:\n  net: network\n", None);
        let check = check_install(&app, &base(), &DeviceContext::default());
        assert!(check.bad_interfaces.contains_key("net"));
    }

    #[test]
    fn test_unknown_interface_is_bad() {
        let app = component("name: app\nplugs:\n  teleport:\n", None);
        let check = check_install(&app, &base(), &DeviceContext::default());
        assert!(check.bad_interfaces["teleport"].contains("no plug rule"));
    }

    #[test]
    fn test_declaration_grants_installation() {
        let decl = ComponentDeclaration::decode(&json!({
            "snap-name": "app",
            "plugs": {"snapd-control": {"allow-installation": {"on-classic": false}}}
        }))
        .unwrap();
        let app = component("name: app\nplugs:\n  snapd-control:\n", Some(decl));

        let core = DeviceContext::default();
        assert!(check_install(&app, &base(), &core).ok);

        let classic = DeviceContext::default().with_classic(true);
        assert!(!check_install(&app, &base(), &classic).ok);
    }
}
