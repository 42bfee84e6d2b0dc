//! Simulation reports and their renderings.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::core::component::Direction;
use crate::matcher::{Candidate, Connection};

/// Installation outcome of one component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct InstallEntry {
    pub snap_name: String,

    /// First rejection reason, empty when the install check passed
    pub error: String,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bad_interfaces: BTreeMap<String, String>,
}

/// A target plug or slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointEntry {
    pub interface: String,
    pub name: String,
}

/// Result of an `auto-connections` run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct AutoConnectReport {
    /// Instance name of the target, used by the human rendering
    #[serde(skip)]
    pub target: String,

    pub installing: Vec<InstallEntry>,
    pub plugs: Vec<EndpointEntry>,
    pub slots: Vec<EndpointEntry>,
    pub connections: Vec<Connection>,
    pub slot_candidates: BTreeMap<String, Vec<Candidate>>,
    pub plug_candidates: BTreeMap<String, Vec<Candidate>>,
}

/// What a run writes to stdout: the report, or the error envelope.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Report(T),
    Error { error: String },
}

impl<T> Envelope<T> {
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(report) => Envelope::Report(report),
            Err(e) => Envelope::Error {
                error: e.to_string(),
            },
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Envelope::Error { .. })
    }
}

/// Pretty JSON with a trailing newline.
pub fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}

/// Render a report the way a person reads it.
///
/// Companions are listed first, then the target. Connections are grouped
/// (both sides on the target, target slot, target plug) and sorted within
/// each group. Target plugs left unconnected are listed last.
pub fn render_human(report: &AutoConnectReport) -> String {
    let mut out = String::new();

    let companions = report.installing.iter().filter(|i| i.snap_name != report.target);
    let target = report.installing.iter().filter(|i| i.snap_name == report.target);
    for entry in companions.chain(target) {
        let status = if entry.error.is_empty() {
            "OK"
        } else {
            entry.error.as_str()
        };
        out.push_str(&format!("installing {}: {}\n", entry.snap_name, status));
        if !entry.bad_interfaces.is_empty() {
            let bad: Vec<String> = entry
                .bad_interfaces
                .iter()
                .map(|(name, reason)| format!("{} ({})", name, reason))
                .collect();
            out.push_str(&format!("  bad-interfaces: {}\n", bad.join(", ")));
        }
    }

    let mut connections: Vec<&Connection> = report.connections.iter().collect();
    connections.sort_by(|a, b| connection_key(a).cmp(&connection_key(b)));

    let mut connected_plugs = HashSet::new();
    for conn in connections {
        if conn.on_target.contains(&Direction::Slot) {
            out.push_str(&format!("{} < {}\n", conn.plug, conn.slot.slot));
        } else {
            out.push_str(&format!("{} > {}\n", conn.slot, conn.plug.plug));
        }
        if conn.on_target.contains(&Direction::Plug) {
            connected_plugs.insert(conn.plug.plug.as_str());
        }
    }

    for plug in &report.plugs {
        if !connected_plugs.contains(plug.name.as_str()) {
            out.push_str(&format!(": {}\n", plug.name));
        }
    }

    out
}

fn connection_key(conn: &Connection) -> (u8, &str, &str, &str) {
    let plug = conn.on_target.contains(&Direction::Plug);
    let slot = conn.on_target.contains(&Direction::Slot);
    match (plug, slot) {
        (true, true) => (0, &conn.plug.snap, &conn.plug.plug, &conn.slot.slot),
        (false, true) => (1, &conn.plug.snap, &conn.plug.plug, &conn.slot.slot),
        _ => (2, &conn.slot.snap, &conn.slot.slot, &conn.plug.plug),
    }
}
