//! The engine: flow registry, spawn/activate/submit entry points, the
//! activation commit, and traversal edges over background execution.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::domain::context::WorkflowContext;
use crate::domain::events::NotificationBus;
use crate::domain::process::{Process, ProcessId};
use crate::domain::repository::{ContextRepository, ProcessRepository, TaskRepository};
use crate::domain::status::TaskStatus;
use crate::domain::task::{JobId, Task, TaskId};
use crate::flow::{Flow, START_STEP};
use crate::{CoreError, DataPacket};

/// Activation scopes
pub mod activation;

/// Traversal edges
pub mod edge;

/// Background job queue
pub mod jobs;

/// Subprocess reentry listener
pub mod reentry;

pub use activation::Activation;
pub use edge::ActivationEdge;
pub use jobs::{EdgeRecord, Job, JobQueue};
pub use reentry::spawn_reentry_listener;

/// Explicit, owned collection of flow definitions.
///
/// The composition root builds one, registers its flows and hands it to
/// the engine; nothing in the crate reaches for process-global state.
#[derive(Default)]
pub struct FlowRegistry {
    flows: RwLock<HashMap<String, Arc<Flow>>>,
}

impl FlowRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flow under its own name. Re-registering a name replaces
    /// the previous definition; registering the same definition twice is a
    /// no-op either way.
    pub fn register(&self, flow: Flow) -> Result<(), CoreError> {
        let mut flows = self
            .flows
            .write()
            .map_err(|_| CoreError::StoreError("Flow registry lock poisoned".to_string()))?;
        flows.insert(flow.name().to_string(), Arc::new(flow));
        Ok(())
    }

    /// Look up a flow by name
    pub fn get(&self, name: &str) -> Result<Arc<Flow>, CoreError> {
        let flows = self
            .flows
            .read()
            .map_err(|_| CoreError::StoreError("Flow registry lock poisoned".to_string()))?;
        flows
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::FlowNotFound(name.to_string()))
    }

    /// Names of all registered flows
    pub fn names(&self) -> Vec<String> {
        match self.flows.read() {
            Ok(flows) => flows.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// Everything created by spawning a flow
#[derive(Debug, Clone)]
pub struct FlowSpawn {
    /// The new process row
    pub process: Process,

    /// Its context row
    pub context: WorkflowContext,

    /// The spawned `start` task
    pub start: TaskSpawn,
}

/// A freshly spawned task and its pending activation job
#[derive(Debug, Clone)]
pub struct TaskSpawn {
    /// The new task row
    pub task: Task,

    /// Handle of the enqueued activation job
    pub job: JobId,
}

/// The workflow engine.
///
/// Cheap to clone: every field is shared. All state lives behind the
/// repositories; the engine itself only orchestrates activation scopes and
/// hands out traversal edges.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<FlowRegistry>,
    processes: Arc<dyn ProcessRepository>,
    tasks: Arc<dyn TaskRepository>,
    contexts: Arc<dyn ContextRepository>,
    jobs: Arc<dyn JobQueue>,
    bus: NotificationBus,
}

impl Engine {
    /// Assemble an engine from its collaborators
    pub fn new(
        registry: Arc<FlowRegistry>,
        processes: Arc<dyn ProcessRepository>,
        tasks: Arc<dyn TaskRepository>,
        contexts: Arc<dyn ContextRepository>,
        jobs: Arc<dyn JobQueue>,
        bus: NotificationBus,
    ) -> Self {
        Self {
            registry,
            processes,
            tasks,
            contexts,
            jobs,
            bus,
        }
    }

    /// The flow registry
    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    /// The notification bus
    pub fn bus(&self) -> &NotificationBus {
        &self.bus
    }

    /// Load a process row
    pub async fn process(&self, id: &ProcessId) -> Result<Process, CoreError> {
        self.processes
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ProcessNotFound(id.to_string()))
    }

    /// Load a task row
    pub async fn task(&self, id: &TaskId) -> Result<Task, CoreError> {
        self.tasks
            .find_by_id(id)
            .await?
            .ok_or_else(|| CoreError::TaskNotFound(id.to_string()))
    }

    /// Load the context behind a process
    pub async fn context(&self, process: &ProcessId) -> Result<WorkflowContext, CoreError> {
        self.contexts
            .find_by_process(process)
            .await?
            .ok_or_else(|| CoreError::ContextNotFound(process.to_string()))
    }

    /// Spawn a new process of the named flow.
    ///
    /// Builds the context through the flow's factory (`InvalidForm`
    /// propagates and nothing is persisted), saves the process and context
    /// rows and spawns the `start` task. Execution proceeds in the
    /// background; traverse it from [`ActivationEdge::from_flow_spawn`].
    pub async fn spawn_flow(
        &self,
        flow: &str,
        input: &DataPacket,
        created_by: Option<String>,
    ) -> Result<FlowSpawn, CoreError> {
        let definition = self.registry.get(flow)?;
        let data = definition.context_factory().build(input)?;

        let mut process = Process::new(flow);
        process.created_by = created_by;
        self.processes.save(&process).await?;

        let context = WorkflowContext::new(&process.id, data);
        self.contexts.save(&context).await?;

        let start = self.spawn_task(START_STEP, &process, None, None).await?;
        info!(process = %process, "Spawned flow");

        Ok(FlowSpawn {
            process,
            context,
            start,
        })
    }

    /// Spawn a task at `step` within a process and enqueue its activation.
    ///
    /// The sole task-creation path; the step must resolve in the process's
    /// flow before any row is written.
    pub async fn spawn_task(
        &self,
        step: &str,
        process: &Process,
        previous: Option<&TaskId>,
        assignee: Option<String>,
    ) -> Result<TaskSpawn, CoreError> {
        let flow = self.registry.get(&process.flow)?;
        flow.node(step)?;

        let mut task = Task::new(&process.id, step);
        task.previous = previous.cloned();
        task.assigned_to_user = assignee;
        self.tasks.save(&task).await?;

        let job = self
            .jobs
            .enqueue(Job::Activate {
                task: task.id.clone(),
            })
            .await?;
        task.current_job = Some(job.clone());
        self.tasks.save(&task).await?;

        debug!(task = %task, job = %job, "Spawned task");
        Ok(TaskSpawn { task, job })
    }

    /// Run one activation scope for a task, with the node's ordinary path
    pub async fn activate(
        &self,
        task: &TaskId,
        input: &DataPacket,
    ) -> Result<ActivationEdge, CoreError> {
        let task = self.task(task).await?;
        self.activate_task(task, input).await
    }

    /// Re-activate a task stalled on a finished subprocess
    pub async fn reenter(&self, task: &TaskId) -> Result<ActivationEdge, CoreError> {
        let mut task = self.task(task).await?;
        if task.status != TaskStatus::Stall {
            return Err(CoreError::TaskNotStall);
        }

        task.status = TaskStatus::Reentering;
        self.activate_task(task, &DataPacket::null()).await
    }

    /// Apply a user submission to a stalled user action task.
    ///
    /// `InvalidForm` and `TaskNotStall` surface without touching workflow
    /// state: the rejected scope is discarded without a commit, so nothing
    /// is saved or re-enqueued. Any other error fails the task and its
    /// process. On success the submitted task is already re-enqueued when
    /// this returns.
    pub async fn submit(
        &self,
        task: &TaskId,
        input: &DataPacket,
        done_by: Option<String>,
    ) -> Result<ActivationEdge, CoreError> {
        let task = self.task(task).await?;
        let process = self.process(&task.process).await?;
        let flow = self.registry.get(&process.flow)?;
        let node = flow.node(&task.step)?;
        let context = self.context(&process.id).await?;

        let mut activation = Activation::new(task, process, context, self.bus.clone());

        match node.submit(&mut activation, input) {
            Ok(()) => {
                activation.task.done_by = done_by;
                debug!(task = %activation.task, "Submission accepted");
            }
            Err(error) if error.is_expected() => {
                debug!(task = %activation.task, %error, "Submission rejected");
                return Err(error);
            }
            Err(error) => {
                activation.failed(&error.to_string());
                self.commit(&mut activation).await?;
                return Err(error);
            }
        }

        self.commit(&mut activation).await?;
        Ok(self.edge_of(activation))
    }

    async fn activate_task(
        &self,
        task: Task,
        input: &DataPacket,
    ) -> Result<ActivationEdge, CoreError> {
        let process = self.process(&task.process).await?;
        let flow = self.registry.get(&process.flow)?;
        let node = flow.node(&task.step)?;
        let context = self.context(&process.id).await?;

        debug!(task = %task, kind = node.kind_name(), "Activating");
        let mut activation = Activation::new(task, process, context, self.bus.clone());
        let outcome = node.run(self, &mut activation, input).await;

        if let Err(error) = &outcome {
            if !error.is_expected() {
                activation.failed(&error.to_string());
            }
        }

        self.commit(&mut activation).await?;
        outcome?;
        Ok(self.edge_of(activation))
    }

    /// Persist an activation scope. Runs exactly once per scope, whatever
    /// the node outcome: rows are saved, a task left `Ready` or `Submitted`
    /// re-enqueues itself as its own first successor, then deferred spawns
    /// run in request order.
    async fn commit(&self, activation: &mut Activation) -> Result<(), CoreError> {
        self.tasks.save(&activation.task).await?;
        self.processes.save(&activation.process).await?;
        self.contexts.save(&activation.context).await?;

        if matches!(
            activation.task.status,
            TaskStatus::Ready | TaskStatus::Submitted
        ) {
            let job = self
                .jobs
                .enqueue(Job::Activate {
                    task: activation.task.id.clone(),
                })
                .await?;
            activation.task.current_job = Some(job);
            self.tasks.save(&activation.task).await?;
            let continuation = activation.task.clone();
            activation.nexts.push(continuation);
        }

        let requests = std::mem::take(&mut activation.spawn_requests);
        for step in requests {
            let spawn = self
                .spawn_task(&step, &activation.process, Some(&activation.task.id), None)
                .await?;
            activation.nexts.push(spawn.task);
        }

        Ok(())
    }

    fn edge_of(&self, activation: Activation) -> ActivationEdge {
        ActivationEdge::new(self.clone(), activation.task, activation.nexts)
    }

    /// The latest edge of a task: awaits its pending activation job when
    /// one is recorded, otherwise a fresh snapshot with no successors
    pub async fn edge_for(&self, task: &Task) -> Result<ActivationEdge, CoreError> {
        match &task.current_job {
            Some(job) => {
                let record = self.jobs.fetch(job, None).await?;
                self.edge_from_record(&record).await
            }
            None => {
                let task = self.task(&task.id).await?;
                Ok(ActivationEdge::new(self.clone(), task, Vec::new()))
            }
        }
    }

    /// Rebuild an edge from its serializable record
    pub async fn edge_from_record(&self, record: &EdgeRecord) -> Result<ActivationEdge, CoreError> {
        let task = self.task(&record.current).await?;
        let mut nexts = Vec::with_capacity(record.nexts.len());
        for id in &record.nexts {
            nexts.push(self.task(id).await?);
        }
        Ok(ActivationEdge::new(self.clone(), task, nexts))
    }

    /// Enqueue a `Reenter` job for every task stalled on the given child
    /// process. Called by the reentry listener when a process closes or
    /// fails.
    pub async fn schedule_reentries(&self, child: &ProcessId) -> Result<(), CoreError> {
        let waiting = self.tasks.find_by_subprocess(child).await?;

        for mut task in waiting {
            if task.status != TaskStatus::Stall {
                continue;
            }

            let job = self
                .jobs
                .enqueue(Job::Reenter {
                    task: task.id.clone(),
                })
                .await?;
            task.current_job = Some(job.clone());
            self.tasks.save(&task).await?;
            info!(task = %task, job = %job, "Scheduled reentry");
        }

        Ok(())
    }
}
