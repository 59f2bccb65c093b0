use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Structured validation errors produced by a form, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    /// Create an empty error set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error message against a field
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Whether any field has errors
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Messages recorded against a field, if any
    pub fn field(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    /// Iterate over all (field, messages) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.errors.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.errors {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", field, messages.join(", "))?;
            first = false;
        }
        Ok(())
    }
}

/// Core error type for the Millrace runtime
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Flow not registered under the requested name
    #[error("Flow not found: {0}")]
    FlowNotFound(String),

    /// Process not found in the store
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    /// Task not found in the store
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Process has no context row
    #[error("Context not found for process: {0}")]
    ContextNotFound(String),

    /// Edge traversal asked for a successor step that does not exist
    #[error("Missing step \"{0}\"")]
    StepNotFound(String),

    /// Submit was attempted on a task that is not awaiting input
    #[error("Task is not in a stall state")]
    TaskNotStall,

    /// External input failed form validation
    #[error("Invalid form: {0}")]
    InvalidForm(ValidationErrors),

    /// Flow definition failed its build-time validation pass
    #[error("Flow validation error: {0}")]
    ValidationError(String),

    /// Node logic or a hook failed
    #[error("Node execution error: {0}")]
    NodeError(String),

    /// An activation job completed with a failure
    #[error("Activation job failed: {0}")]
    JobError(String),

    /// Job queue error
    #[error("Job queue error: {0}")]
    JobQueueError(String),

    /// State store error
    #[error("State store error: {0}")]
    StoreError(String),

    /// Edge traversal error
    #[error("Edge traversal error: {0}")]
    TraversalError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CoreError {
    /// Whether this error is an expected, user-facing outcome rather than
    /// an engine failure. Expected errors pass through engine scopes
    /// unmodified and never mark the task or process failed.
    pub fn is_expected(&self) -> bool {
        matches!(self, CoreError::InvalidForm(_) | CoreError::TaskNotStall)
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}
