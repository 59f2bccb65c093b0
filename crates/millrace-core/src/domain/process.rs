use crate::domain::status::ProcessStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Value object: Process ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub String);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One running instance of a flow.
///
/// Mutated only through the engine/activation verbs; the core never
/// deletes a process (deletion policy belongs to the persistence
/// collaborator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Process {
    /// Unique identifier
    pub id: ProcessId,

    /// Name of the flow this process instantiates
    pub flow: String,

    /// Current lifecycle status
    pub status: ProcessStatus,

    /// Opaque reference to whoever spawned the process
    pub created_by: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Closure timestamp, set when the process reaches `Done`
    pub closed_at: Option<DateTime<Utc>>,

    /// Free-text failure log
    pub log: String,
}

impl Process {
    /// Create a new process row for the named flow
    pub fn new(flow: &str) -> Self {
        Self {
            id: ProcessId(Uuid::new_v4().to_string()),
            flow: flow.to_string(),
            status: ProcessStatus::Init,
            created_by: None,
            created_at: Utc::now(),
            closed_at: None,
            log: String::new(),
        }
    }

    /// Mark the process as successfully closed
    pub fn done(&mut self) {
        self.status = ProcessStatus::Done;
        self.closed_at = Some(Utc::now());
    }

    /// Mark the process as failed, recording the error text
    pub fn failed(&mut self, error: &str) {
        self.status = ProcessStatus::Failed;
        self.log = error.to_string();
    }

    /// Mark the process as aborted
    pub fn aborted(&mut self) {
        self.status = ProcessStatus::Aborted;
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.flow, self.id)
    }
}
