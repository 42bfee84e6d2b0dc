//! The built-in base declaration.

use crate::decl::declaration::BaseDeclaration;
use crate::decl::DeclError;

/// Base declaration text embedded in the binary.
pub const BASE_DECLARATION: &str = include_str!("base-declaration.json");

/// Decode the built-in base declaration.
pub fn builtin() -> Result<BaseDeclaration, DeclError> {
    BaseDeclaration::from_json_str(BASE_DECLARATION)
}

impl BaseDeclaration {
    pub fn builtin() -> Result<BaseDeclaration, DeclError> {
        builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::component::Direction;
    use crate::decl::declaration::{resolve_rule, RuleOrigin};

    #[test]
    fn test_builtin_decodes() {
        let base = builtin().unwrap();
        assert!(base.knows_interface("network"));
        assert!(base.knows_interface("content"));
        assert!(!base.knows_interface("teleport"));
    }

    #[test]
    fn test_builtin_implicit_slots() {
        let base = builtin().unwrap();
        let core = base.implicit_slots(false);
        let classic = base.implicit_slots(true);
        assert!(core.iter().any(|i| i == "network"));
        assert!(!core.iter().any(|i| i == "x11"));
        assert!(classic.iter().any(|i| i == "x11"));
        assert!(!classic.iter().any(|i| i == "content"));
    }

    #[test]
    fn test_builtin_plug_default() {
        let base = builtin().unwrap();
        let resolved = resolve_rule("network", Direction::Plug, None, &base);
        assert_eq!(resolved.origin(), Some(RuleOrigin::BaseDefault));
        let resolved = resolve_rule("snapd-control", Direction::Plug, None, &base);
        assert_eq!(resolved.origin(), Some(RuleOrigin::Base));
    }
}
