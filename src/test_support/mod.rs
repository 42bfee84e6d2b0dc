//! Test utilities and mocks for ifacesim unit tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::test_support::fixtures::{component, registry};
//!
//! #[test]
//! fn test_example() {
//!     let registry = registry(vec![component("name: app\nplugs:\n  network:\n", "acme")]);
//!     // Run the matcher against `registry`...
//! }
//! ```

pub mod fixtures;

use anyhow::{bail, Result};

use crate::engine::SecurityBackend;
use crate::matcher::Connection;

/// Backend whose setup fails for connections on one interface.
#[derive(Debug, Default)]
pub struct FailingBackend {
    interface: String,
    removed: Vec<Connection>,
}

impl FailingBackend {
    pub fn failing_on(interface: impl Into<String>) -> Self {
        FailingBackend {
            interface: interface.into(),
            removed: Vec::new(),
        }
    }

    /// Connections torn down so far.
    pub fn removed(&self) -> &[Connection] {
        &self.removed
    }
}

impl SecurityBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    fn setup(&mut self, connection: &Connection) -> Result<()> {
        if connection.interface == self.interface {
            bail!("cannot set up {} connection", connection.interface);
        }
        Ok(())
    }

    fn remove(&mut self, connection: &Connection) -> Result<()> {
        self.removed.push(connection.clone());
        Ok(())
    }
}
