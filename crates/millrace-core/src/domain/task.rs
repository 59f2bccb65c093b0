use crate::domain::process::ProcessId;
use crate::domain::status::TaskStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Value object: Task ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Value object: handle of an activation job on the external queue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One running instance of a node within a process.
///
/// Mutated exclusively through activation verbs during a commit scope:
/// all status/field changes for a task and its process land together, or
/// not at all, within one activation commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: TaskId,

    /// Owning process
    pub process: ProcessId,

    /// Step name; must match a node key in the owning flow's definition
    pub step: String,

    /// Current lifecycle status
    pub status: TaskStatus,

    /// Opaque user the task is assigned to
    pub assigned_to_user: Option<String>,

    /// Opaque group the task is assigned to
    pub assigned_to_group: Option<String>,

    /// Opaque user whose submission advanced the task
    pub done_by: Option<String>,

    /// Optional deadline for the task
    pub deadline: Option<DateTime<Utc>>,

    /// The task that spawned this one; ordering only, not ownership
    pub previous: Option<TaskId>,

    /// Child process this task is stalled on, for Subprocess nodes
    pub subprocess: Option<ProcessId>,

    /// Handle of the most recently enqueued activation job
    pub current_job: Option<JobId>,

    /// Free-text failure log
    pub log: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Closure timestamp, set on the transition to `Closed`
    pub closed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new task row for a step within a process
    pub fn new(process: &ProcessId, step: &str) -> Self {
        Self {
            id: TaskId(Uuid::new_v4().to_string()),
            process: process.clone(),
            step: step.to_string(),
            status: TaskStatus::Init,
            assigned_to_user: None,
            assigned_to_group: None,
            done_by: None,
            deadline: None,
            previous: None,
            subprocess: None,
            current_job: None,
            log: String::new(),
            created_at: Utc::now(),
            closed_at: None,
        }
    }

    /// Mark the task ready for activation
    pub fn ready(&mut self) {
        self.status = TaskStatus::Ready;
    }

    /// Mark node logic as finished
    pub fn done(&mut self) {
        self.status = TaskStatus::Done;
    }

    /// Mark the task terminally closed
    pub fn closed(&mut self) {
        self.status = TaskStatus::Closed;
        self.closed_at = Some(Utc::now());
    }

    /// Mark the task aborted
    pub fn aborted(&mut self) {
        self.status = TaskStatus::Aborted;
    }

    /// Mark the task failed, recording the error text
    pub fn failed(&mut self, error: &str) {
        self.status = TaskStatus::Failed;
        self.log = error.to_string();
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}({}) [{}]", self.process, self.step, self.id, self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task::new(&ProcessId("p1".to_string()), "to_approve")
    }

    #[test]
    fn test_task_creation() {
        let task = sample_task();

        assert_eq!(task.process.0, "p1");
        assert_eq!(task.step, "to_approve");
        assert_eq!(task.status, TaskStatus::Init);
        assert!(task.previous.is_none());
        assert!(task.subprocess.is_none());
        assert!(task.current_job.is_none());
        assert!(task.closed_at.is_none());
    }

    #[test]
    fn test_status_verbs() {
        let mut task = sample_task();

        task.ready();
        assert_eq!(task.status, TaskStatus::Ready);

        task.done();
        assert_eq!(task.status, TaskStatus::Done);

        task.closed();
        assert_eq!(task.status, TaskStatus::Closed);
        assert!(task.closed_at.is_some());
    }

    #[test]
    fn test_failed_records_log() {
        let mut task = sample_task();
        task.failed("hook panicked");

        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.log, "hook panicked");
    }

    #[test]
    fn test_display() {
        let mut task = sample_task();
        task.ready();
        let rendered = task.to_string();
        assert!(rendered.contains("to_approve"));
        assert!(rendered.contains("[ready]"));
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut task = sample_task();
        task.subprocess = Some(ProcessId("child".to_string()));
        task.current_job = Some(JobId("job-1".to_string()));

        let encoded = serde_json::to_string(&task).unwrap();
        let decoded: Task = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, task);
    }
}
