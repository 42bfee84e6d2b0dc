//! Declaration model.
//!
//! Declarations say which interfaces a component may use and how: whether
//! an endpoint may be installed, connected, or auto-connected, under which
//! constraints. There are two sources of rules: the universe-wide base
//! declaration and per-component declarations that override it.
//!
//! Raw rule documents are decoded once into typed [`Rule`]s whose policies
//! are [`Constraint`] trees; nothing downstream inspects raw JSON again.

pub mod builtin;
pub mod constraint;
pub mod declaration;
pub mod rule;
pub mod store;

pub use constraint::{AttrPattern, AttrRef, Constraint, NamePattern, PublisherRef};
pub use declaration::{
    resolve_rule, BaseDeclaration, ComponentDeclaration, ResolvedRule, RuleOrigin, RuleSet,
};
pub use rule::{Arity, ArityConstraints, PolicyKind, Rule};
pub use store::{Lookup, Record, RecordType, TrustStore};

use thiserror::Error;

/// Declaration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeclError {
    #[error("malformed declaration: {context}: {message}")]
    MalformedDeclaration { context: String, message: String },

    #[error("conflicting {record_type} record for `{key}`")]
    ConflictingRecord { record_type: String, key: String },
}

impl DeclError {
    pub(crate) fn malformed(context: impl Into<String>, message: impl Into<String>) -> Self {
        DeclError::MalformedDeclaration {
            context: context.into(),
            message: message.into(),
        }
    }
}
