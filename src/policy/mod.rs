//! Policy evaluation.
//!
//! Decides whether an endpoint may be installed and whether a plug/slot pair
//! may be connected or auto-connected. Everything here is pure: inputs are
//! borrowed and nothing is mutated.

pub mod connect;
pub mod eval;
pub mod install;

pub use connect::{
    check_auto_connect, check_connect, check_rule, ArityGrant, Rejection, RejectionKind,
};
pub use eval::{evaluate, EvalContext, Outcome, Side};
pub use install::{check_install, InstallCheck};
