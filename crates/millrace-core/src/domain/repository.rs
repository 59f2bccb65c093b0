//! Repository traits for the Millrace core
//!
//! This module defines the persistence contracts the engine depends on.
//! External crates implement these traits to provide durable storage; the
//! core only assumes create/save/get/filter semantics with
//! read-after-write consistency per row.

use async_trait::async_trait;

use super::context::WorkflowContext;
use super::process::{Process, ProcessId};
use super::status::ProcessStatus;
use super::task::{Task, TaskId};
use crate::CoreError;

/// Repository for process rows
#[async_trait]
pub trait ProcessRepository: Send + Sync {
    /// Find a process by ID
    async fn find_by_id(&self, id: &ProcessId) -> Result<Option<Process>, CoreError>;

    /// Save a process; atomic per call
    async fn save(&self, process: &Process) -> Result<(), CoreError>;

    /// List processes with the given status
    async fn list_by_status(&self, status: ProcessStatus) -> Result<Vec<Process>, CoreError>;
}

/// Repository for task rows
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Find a task by ID
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, CoreError>;

    /// Save a task; atomic per call
    async fn save(&self, task: &Task) -> Result<(), CoreError>;

    /// All tasks belonging to a process, in creation order
    async fn find_by_process(&self, process: &ProcessId) -> Result<Vec<Task>, CoreError>;

    /// All tasks stalled on the given child process
    async fn find_by_subprocess(&self, process: &ProcessId) -> Result<Vec<Task>, CoreError>;
}

/// Repository for context rows
#[async_trait]
pub trait ContextRepository: Send + Sync {
    /// Find the context behind a process
    async fn find_by_process(
        &self,
        process: &ProcessId,
    ) -> Result<Option<WorkflowContext>, CoreError>;

    /// Save a context; atomic per call
    async fn save(&self, context: &WorkflowContext) -> Result<(), CoreError>;
}

/// Memory implementations for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use dashmap::DashMap;
    use std::sync::Arc;

    /// In-memory implementation of the process repository
    pub struct MemoryProcessRepository {
        processes: Arc<DashMap<String, Process>>,
    }

    impl MemoryProcessRepository {
        /// Create a new memory process repository
        pub fn new() -> Self {
            Self {
                processes: Arc::new(DashMap::with_capacity(16)),
            }
        }
    }

    impl Default for MemoryProcessRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ProcessRepository for MemoryProcessRepository {
        async fn find_by_id(&self, id: &ProcessId) -> Result<Option<Process>, CoreError> {
            Ok(self.processes.get(&id.0).map(|p| p.clone()))
        }

        async fn save(&self, process: &Process) -> Result<(), CoreError> {
            self.processes.insert(process.id.0.clone(), process.clone());
            Ok(())
        }

        async fn list_by_status(&self, status: ProcessStatus) -> Result<Vec<Process>, CoreError> {
            let mut result: Vec<Process> = self
                .processes
                .iter()
                .filter(|p| p.status == status)
                .map(|p| p.clone())
                .collect();
            result.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(result)
        }
    }

    /// In-memory implementation of the task repository, with secondary
    /// indexes for process and subprocess lookups
    pub struct MemoryTaskRepository {
        tasks: Arc<DashMap<String, Task>>,
        by_process: Arc<DashMap<String, Vec<String>>>,
    }

    impl MemoryTaskRepository {
        /// Create a new memory task repository
        pub fn new() -> Self {
            Self {
                tasks: Arc::new(DashMap::with_capacity(64)),
                by_process: Arc::new(DashMap::with_capacity(16)),
            }
        }
    }

    impl Default for MemoryTaskRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl TaskRepository for MemoryTaskRepository {
        async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, CoreError> {
            Ok(self.tasks.get(&id.0).map(|t| t.clone()))
        }

        async fn save(&self, task: &Task) -> Result<(), CoreError> {
            self.tasks.insert(task.id.0.clone(), task.clone());

            // Update the process index
            if let Some(mut ids) = self.by_process.get_mut(&task.process.0) {
                if !ids.contains(&task.id.0) {
                    ids.push(task.id.0.clone());
                }
            } else {
                self.by_process
                    .insert(task.process.0.clone(), vec![task.id.0.clone()]);
            }

            Ok(())
        }

        async fn find_by_process(&self, process: &ProcessId) -> Result<Vec<Task>, CoreError> {
            let tasks = if let Some(ids) = self.by_process.get(&process.0) {
                ids.iter()
                    .filter_map(|id| self.tasks.get(id).map(|t| t.clone()))
                    .collect()
            } else {
                Vec::new()
            };

            Ok(tasks)
        }

        async fn find_by_subprocess(&self, process: &ProcessId) -> Result<Vec<Task>, CoreError> {
            let result = self
                .tasks
                .iter()
                .filter(|t| t.subprocess.as_ref() == Some(process))
                .map(|t| t.clone())
                .collect();

            Ok(result)
        }
    }

    /// In-memory implementation of the context repository, keyed by process
    pub struct MemoryContextRepository {
        contexts: Arc<DashMap<String, WorkflowContext>>,
    }

    impl MemoryContextRepository {
        /// Create a new memory context repository
        pub fn new() -> Self {
            Self {
                contexts: Arc::new(DashMap::with_capacity(16)),
            }
        }
    }

    impl Default for MemoryContextRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ContextRepository for MemoryContextRepository {
        async fn find_by_process(
            &self,
            process: &ProcessId,
        ) -> Result<Option<WorkflowContext>, CoreError> {
            Ok(self.contexts.get(&process.0).map(|c| c.clone()))
        }

        async fn save(&self, context: &WorkflowContext) -> Result<(), CoreError> {
            self.contexts
                .insert(context.process.0.clone(), context.clone());
            Ok(())
        }
    }
}

#[cfg(all(test, feature = "testing"))]
mod tests {
    use super::memory::*;
    use super::*;
    use crate::domain::status::TaskStatus;
    use crate::DataPacket;
    use serde_json::json;

    #[tokio::test]
    async fn test_process_repository_round_trip() {
        let repo = MemoryProcessRepository::new();
        let mut process = Process::new("simple");

        repo.save(&process).await.unwrap();
        let found = repo.find_by_id(&process.id).await.unwrap().unwrap();
        assert_eq!(found, process);

        process.done();
        repo.save(&process).await.unwrap();
        let found = repo.find_by_id(&process.id).await.unwrap().unwrap();
        assert_eq!(found.status, ProcessStatus::Done);

        let done = repo.list_by_status(ProcessStatus::Done).await.unwrap();
        assert_eq!(done.len(), 1);
        assert!(repo
            .list_by_status(ProcessStatus::Init)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_task_repository_indexes() {
        let repo = MemoryTaskRepository::new();
        let process = ProcessId("p1".to_string());
        let child = ProcessId("child".to_string());

        let first = Task::new(&process, "start");
        let mut second = Task::new(&process, "await_child");
        second.subprocess = Some(child.clone());

        repo.save(&first).await.unwrap();
        repo.save(&second).await.unwrap();

        let for_process = repo.find_by_process(&process).await.unwrap();
        assert_eq!(for_process.len(), 2);
        assert_eq!(for_process[0].step, "start");

        let waiting = repo.find_by_subprocess(&child).await.unwrap();
        assert_eq!(waiting.len(), 1);
        assert_eq!(waiting[0].id, second.id);

        // Re-saving must not duplicate index entries
        second.status = TaskStatus::Stall;
        repo.save(&second).await.unwrap();
        assert_eq!(repo.find_by_process(&process).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_context_repository_keyed_by_process() {
        let repo = MemoryContextRepository::new();
        let process = ProcessId("p1".to_string());
        let mut context = WorkflowContext::new(&process, DataPacket::new(json!({"approved": false})));

        repo.save(&context).await.unwrap();
        context.set("approved", json!(true));
        repo.save(&context).await.unwrap();

        let found = repo.find_by_process(&process).await.unwrap().unwrap();
        assert!(found.flag("approved"));

        let missing = ProcessId("other".to_string());
        assert!(repo.find_by_process(&missing).await.unwrap().is_none());
    }
}
