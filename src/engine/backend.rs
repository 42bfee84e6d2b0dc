//! Security backend observer.
//!
//! The engine tells a backend about every connection it sets up or tears
//! down. Nothing is sandboxed for real; the default backend just records the
//! calls so a run can be inspected afterwards.

use anyhow::Result;

use crate::matcher::Connection;

/// Receives connection setup and teardown.
pub trait SecurityBackend {
    /// Backend name, used in task logs.
    fn name(&self) -> &str;

    /// A connection was established.
    fn setup(&mut self, connection: &Connection) -> Result<()>;

    /// A connection is being undone.
    fn remove(&mut self, connection: &Connection) -> Result<()>;
}

/// One observed backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Setup(Connection),
    Remove(Connection),
}

/// Backend that records calls and never fails.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Vec<BackendCall>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        RecordingBackend::default()
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }
}

impl SecurityBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn setup(&mut self, connection: &Connection) -> Result<()> {
        self.calls.push(BackendCall::Setup(connection.clone()));
        Ok(())
    }

    fn remove(&mut self, connection: &Connection) -> Result<()> {
        self.calls.push(BackendCall::Remove(connection.clone()));
        Ok(())
    }
}
