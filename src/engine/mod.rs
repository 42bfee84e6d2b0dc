//! Task execution engine.
//!
//! A [`Change`] is the unit of work for installing the target: an ordered
//! list of [`Task`]s, each of which may wait on earlier or later tasks. The
//! [`TaskEngine`] makes fixed-order passes over the tasks, running every task
//! whose waits are done, until the change completes, a task fails, or no pass
//! makes progress. Passes are capped.
//!
//! The change is all-or-nothing. When a task fails, tasks that have not run
//! are abandoned, finished tasks are undone in reverse order, and the change
//! is aborted.

pub mod backend;

use std::collections::HashMap;
use std::fmt;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use thiserror::Error;
use tracing::{debug, warn};

use crate::matcher::Connection;

pub use backend::{BackendCall, RecordingBackend, SecurityBackend};

/// Message of the error-injection task.
pub const ERROR_TRIGGER_MESSAGE: &str = "error out";

/// Engine errors. Both are fatal to a run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine stalled after {passes} passes: {reason}")]
    EngineStalled { passes: usize, reason: String },

    #[error("change \"{change}\" aborted: task \"{task}\" failed: {message}")]
    ChangeAborted {
        change: String,
        task: String,
        message: String,
    },
}

/// Index of a task within its change.
pub type TaskId = usize;

/// What a task does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Decide the connection set; a marker that connect tasks wait on
    AutoConnect,
    /// Establish one connection
    Connect(Connection),
    /// Always fails; exercises the abort path
    ErrorTrigger,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::AutoConnect => "auto-connect",
            TaskKind::Connect(_) => "connect",
            TaskKind::ErrorTrigger => "error-trigger",
        }
    }
}

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Doing,
    Done,
    Error,
    Abandoned,
    Undone,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::Doing => "Doing",
            TaskStatus::Done => "Done",
            TaskStatus::Error => "Error",
            TaskStatus::Abandoned => "Abandoned",
            TaskStatus::Undone => "Undone",
        };
        f.write_str(s)
    }
}

/// One step of a change.
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    kind: TaskKind,
    summary: String,
    status: TaskStatus,
    wait_for: Vec<TaskId>,
}

impl Task {
    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn wait_for(&self) -> &[TaskId] {
        &self.wait_for
    }
}

/// Status of a change as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    Doing,
    Done,
    Aborted,
}

/// An all-or-nothing unit of work.
#[derive(Debug, Clone)]
pub struct Change {
    summary: String,
    tasks: Vec<Task>,
    status: ChangeStatus,
}

impl Change {
    pub fn new(summary: impl Into<String>) -> Self {
        Change {
            summary: summary.into(),
            tasks: Vec::new(),
            status: ChangeStatus::Doing,
        }
    }

    /// The change that installs `target` with the given connections.
    ///
    /// One auto-connect task, one connect task per connection waiting on it,
    /// and optionally an error-trigger task waiting on all connect tasks.
    pub fn install(target: &str, connections: &[Connection], error_trigger: bool) -> Self {
        let mut change = Change::new(format!("install {}", target));
        let auto = change.add_task(
            TaskKind::AutoConnect,
            format!("auto-connect {}", target),
            Vec::new(),
        );

        let mut connect_ids = Vec::with_capacity(connections.len());
        for conn in connections {
            let id = change.add_task(
                TaskKind::Connect(conn.clone()),
                format!("connect {} to {}", conn.plug, conn.slot),
                vec![auto],
            );
            connect_ids.push(id);
        }

        if error_trigger {
            let waits = if connect_ids.is_empty() {
                vec![auto]
            } else {
                connect_ids
            };
            change.add_task(TaskKind::ErrorTrigger, "error-trigger", waits);
        }

        change
    }

    /// Append a task. Waits may refer to tasks added later.
    pub fn add_task(
        &mut self,
        kind: TaskKind,
        summary: impl Into<String>,
        wait_for: Vec<TaskId>,
    ) -> TaskId {
        let id = self.tasks.len();
        self.tasks.push(Task {
            id,
            kind,
            summary: summary.into(),
            status: TaskStatus::Pending,
            wait_for,
        });
        id
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn status(&self) -> ChangeStatus {
        self.status
    }

    fn is_ready(&self, task: &Task) -> bool {
        task.wait_for.iter().all(|&id| {
            self.tasks
                .get(id)
                .is_some_and(|t| t.status == TaskStatus::Done)
        })
    }

    fn all_done(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Done)
    }

    /// Describe why the remaining tasks cannot run.
    fn stall_reason(&self) -> String {
        let mut graph = DiGraph::<TaskId, ()>::new();
        let nodes: HashMap<TaskId, NodeIndex> = self
            .tasks
            .iter()
            .map(|t| (t.id, graph.add_node(t.id)))
            .collect();

        for task in &self.tasks {
            for wait in &task.wait_for {
                match nodes.get(wait) {
                    Some(&to) => {
                        graph.add_edge(nodes[&task.id], to, ());
                    }
                    None => {
                        return format!(
                            "task \"{}\" waits on unknown task {}",
                            task.summary, wait
                        );
                    }
                }
            }
        }

        for scc in tarjan_scc(&graph) {
            let cyclic = scc.len() > 1 || graph.contains_edge(scc[0], scc[0]);
            if cyclic {
                let mut ids: Vec<TaskId> = scc.iter().map(|&n| graph[n]).collect();
                ids.sort_unstable();
                let names: Vec<String> = ids
                    .iter()
                    .map(|&id| format!("\"{}\"", self.tasks[id].summary))
                    .collect();
                return format!("wait cycle between tasks {}", names.join(", "));
            }
        }

        let waiting: Vec<String> = self
            .tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Done)
            .map(|t| format!("\"{}\" ({})", t.summary, t.status))
            .collect();
        format!("tasks cannot make progress: {}", waiting.join(", "))
    }
}

/// Runs changes to completion.
pub struct TaskEngine<'a, B: SecurityBackend> {
    backend: &'a mut B,
    max_passes: usize,
}

impl<'a, B: SecurityBackend> TaskEngine<'a, B> {
    pub fn new(backend: &'a mut B, max_passes: usize) -> Self {
        TaskEngine {
            backend,
            max_passes,
        }
    }

    /// Run a change until it completes or fails.
    pub fn run(&mut self, change: &mut Change) -> Result<(), EngineError> {
        let mut passes = 0;
        loop {
            if change.all_done() {
                change.status = ChangeStatus::Done;
                return Ok(());
            }
            if passes == self.max_passes {
                return Err(EngineError::EngineStalled {
                    passes,
                    reason: format!("change \"{}\" did not settle", change.summary),
                });
            }
            passes += 1;

            let (progressed, failure) = self.pass(change);
            if let Some((id, message)) = failure {
                self.abort(change);
                return Err(EngineError::ChangeAborted {
                    change: change.summary.clone(),
                    task: change.tasks[id].summary.clone(),
                    message,
                });
            }
            if !progressed {
                return Err(EngineError::EngineStalled {
                    passes,
                    reason: change.stall_reason(),
                });
            }
        }
    }

    /// One pass in task order. Stops at the first failing task.
    fn pass(&mut self, change: &mut Change) -> (bool, Option<(TaskId, String)>) {
        let mut progressed = false;

        for id in 0..change.tasks.len() {
            if change.tasks[id].status != TaskStatus::Pending || !change.is_ready(&change.tasks[id]) {
                continue;
            }

            progressed = true;
            change.tasks[id].status = TaskStatus::Doing;
            let task = &mut change.tasks[id];

            match self.execute(&task.kind) {
                Ok(()) => task.status = TaskStatus::Done,
                Err(message) => {
                    task.status = TaskStatus::Error;
                    debug!("task \"{}\" failed: {}", task.summary, message);
                    return (progressed, Some((id, message)));
                }
            }
        }

        (progressed, None)
    }

    fn execute(&mut self, kind: &TaskKind) -> Result<(), String> {
        match kind {
            TaskKind::AutoConnect => Ok(()),
            TaskKind::Connect(conn) => self
                .backend
                .setup(conn)
                .map_err(|e| format!("{} backend: {:#}", self.backend.name(), e)),
            TaskKind::ErrorTrigger => Err(ERROR_TRIGGER_MESSAGE.to_string()),
        }
    }

    fn abort(&mut self, change: &mut Change) {
        for task in change.tasks.iter_mut() {
            if task.status == TaskStatus::Pending {
                task.status = TaskStatus::Abandoned;
            }
        }

        for task in change.tasks.iter_mut().rev() {
            if task.status != TaskStatus::Done {
                continue;
            }
            if let TaskKind::Connect(conn) = &task.kind {
                if let Err(e) = self.backend.remove(conn) {
                    warn!("cannot undo task \"{}\": {:#}", task.summary, e);
                }
            }
            task.status = TaskStatus::Undone;
        }

        change.status = ChangeStatus::Aborted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::component::{Direction, PlugRef, SlotRef};
    use crate::test_support::FailingBackend;

    fn connection(snap: &str) -> Connection {
        Connection {
            interface: "network".into(),
            plug: PlugRef {
                snap: snap.into(),
                plug: "network".into(),
            },
            slot: SlotRef {
                snap: "snapd".into(),
                slot: "network".into(),
            },
            on_target: vec![Direction::Plug],
        }
    }

    fn statuses(change: &Change) -> Vec<TaskStatus> {
        change.tasks().iter().map(|t| t.status()).collect()
    }

    #[test]
    fn test_install_change_completes() {
        let conns = [connection("a"), connection("b")];
        let mut change = Change::install("a", &conns, false);
        let mut backend = RecordingBackend::new();

        TaskEngine::new(&mut backend, 1000).run(&mut change).unwrap();

        assert_eq!(change.status(), ChangeStatus::Done);
        assert_eq!(statuses(&change), [TaskStatus::Done; 3]);
        assert_eq!(
            backend.calls(),
            [
                BackendCall::Setup(conns[0].clone()),
                BackendCall::Setup(conns[1].clone())
            ]
        );
    }

    #[test]
    fn test_error_trigger_aborts() {
        let conns = [connection("a"), connection("b")];
        let mut change = Change::install("a", &conns, true);
        let mut backend = RecordingBackend::new();

        let err = TaskEngine::new(&mut backend, 1000)
            .run(&mut change)
            .unwrap_err();

        assert_eq!(
            err,
            EngineError::ChangeAborted {
                change: "install a".into(),
                task: "error-trigger".into(),
                message: ERROR_TRIGGER_MESSAGE.into(),
            }
        );
        assert_eq!(change.status(), ChangeStatus::Aborted);
        assert_eq!(
            statuses(&change),
            [
                TaskStatus::Undone,
                TaskStatus::Undone,
                TaskStatus::Undone,
                TaskStatus::Error
            ]
        );
        // Undo runs in reverse order.
        assert_eq!(
            &backend.calls()[2..],
            [
                BackendCall::Remove(conns[1].clone()),
                BackendCall::Remove(conns[0].clone())
            ]
        );
    }

    #[test]
    fn test_pending_tasks_are_abandoned() {
        let mut change = Change::new("test");
        let trigger = change.add_task(TaskKind::ErrorTrigger, "boom", Vec::new());
        change.add_task(TaskKind::Connect(connection("a")), "later", vec![trigger]);
        let mut backend = RecordingBackend::new();

        assert!(TaskEngine::new(&mut backend, 10).run(&mut change).is_err());
        assert_eq!(
            statuses(&change),
            [TaskStatus::Error, TaskStatus::Abandoned]
        );
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_forward_waits_take_extra_passes() {
        let mut change = Change::new("test");
        change.add_task(TaskKind::AutoConnect, "first", vec![1]);
        change.add_task(TaskKind::AutoConnect, "second", Vec::new());
        let mut backend = RecordingBackend::new();

        let err = TaskEngine::new(&mut backend, 1).run(&mut change).unwrap_err();
        assert!(matches!(err, EngineError::EngineStalled { passes: 1, .. }));

        let mut change = Change::new("test");
        change.add_task(TaskKind::AutoConnect, "first", vec![1]);
        change.add_task(TaskKind::AutoConnect, "second", Vec::new());
        assert!(TaskEngine::new(&mut backend, 2).run(&mut change).is_ok());
    }

    #[test]
    fn test_wait_cycle_stalls() {
        let mut change = Change::new("test");
        change.add_task(TaskKind::AutoConnect, "ping", vec![1]);
        change.add_task(TaskKind::AutoConnect, "pong", vec![0]);
        let mut backend = RecordingBackend::new();

        let err = TaskEngine::new(&mut backend, 1000).run(&mut change).unwrap_err();
        let EngineError::EngineStalled { passes, reason } = err else {
            panic!("expected stall");
        };
        assert_eq!(passes, 1);
        assert_eq!(reason, "wait cycle between tasks \"ping\", \"pong\"");
        assert_eq!(statuses(&change), [TaskStatus::Pending; 2]);
    }

    #[test]
    fn test_unknown_wait_stalls() {
        let mut change = Change::new("test");
        change.add_task(TaskKind::AutoConnect, "orphan", vec![7]);
        let mut backend = RecordingBackend::new();
        let err = TaskEngine::new(&mut backend, 1000).run(&mut change).unwrap_err();
        assert!(err.to_string().contains("waits on unknown task 7"));
    }

    #[test]
    fn test_backend_failure_undoes_earlier_connects() {
        let mut failing = connection("b");
        failing.interface = "camera".into();
        let conns = [connection("a"), failing];
        let mut change = Change::install("a", &conns, false);
        let mut backend = FailingBackend::failing_on("camera");

        let err = TaskEngine::new(&mut backend, 1000)
            .run(&mut change)
            .unwrap_err();

        let EngineError::ChangeAborted { task, message, .. } = err else {
            panic!("expected abort");
        };
        assert_eq!(task, "connect b:network to snapd:network");
        assert_eq!(message, "failing backend: cannot set up camera connection");
        assert_eq!(backend.removed(), [conns[0].clone()]);
        assert_eq!(
            statuses(&change),
            [TaskStatus::Undone, TaskStatus::Undone, TaskStatus::Error]
        );
    }

    #[test]
    fn test_error_trigger_without_connections() {
        let mut change = Change::install("a", &[], true);
        assert_eq!(change.tasks()[1].wait_for(), [0]);
        let mut backend = RecordingBackend::new();
        assert!(TaskEngine::new(&mut backend, 1000).run(&mut change).is_err());
        assert_eq!(
            statuses(&change),
            [TaskStatus::Undone, TaskStatus::Error]
        );
    }
}
