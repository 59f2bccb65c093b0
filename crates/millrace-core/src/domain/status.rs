use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    /// Process row created, nothing has run yet
    Init,

    /// Process has at least one activated task
    Running,

    /// Process was terminally aborted by an operator
    Aborted,

    /// Process failed; no further automatic activation occurs
    Failed,

    /// Process closed successfully
    Done,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessStatus::Init => "init",
            ProcessStatus::Running => "running",
            ProcessStatus::Aborted => "aborted",
            ProcessStatus::Failed => "failed",
            ProcessStatus::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Lifecycle status of a task
///
/// Transitions are monotonic within a single task's lifeline, except for
/// the explicit `Reentering` re-activation used when a subprocess the task
/// was stalled on reaches a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task row created, activation has not run yet
    Init,

    /// Task is ready for (re-)activation
    Ready,

    /// Task is suspended, awaiting external input or a child process
    Stall,

    /// External input was accepted; the next activation schedules the successor
    Submitted,

    /// Task was terminally aborted
    Aborted,

    /// Task failed; the error text is recorded on the task log
    Failed,

    /// Node logic finished; the leaving hook has not run yet
    Done,

    /// Terminal state after the leaving hook ran
    Closed,

    /// Forced re-activation after the awaited subprocess closed or failed
    Reentering,
}

impl TaskStatus {
    /// Whether a node may run its type-specific activation logic in this state
    pub fn can_be_activated(&self) -> bool {
        matches!(
            self,
            TaskStatus::Ready | TaskStatus::Stall | TaskStatus::Submitted | TaskStatus::Reentering
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskStatus::Init => "init",
            TaskStatus::Ready => "ready",
            TaskStatus::Stall => "stall",
            TaskStatus::Submitted => "submitted",
            TaskStatus::Aborted => "aborted",
            TaskStatus::Failed => "failed",
            TaskStatus::Done => "done",
            TaskStatus::Closed => "closed",
            TaskStatus::Reentering => "reentering",
        };
        write!(f, "{}", name)
    }
}
