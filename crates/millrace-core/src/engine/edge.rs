use crate::domain::status::TaskStatus;
use crate::domain::task::Task;
use crate::engine::jobs::EdgeRecord;
use crate::engine::{Engine, FlowSpawn};
use crate::CoreError;

/// Traversal handle over one activated task and its spawned successors.
///
/// Edges are how callers observe asynchronous execution: every hop awaits
/// the background activation it refers to, so a traversal reads like a
/// synchronous walk over the process history. An edge is a snapshot; use
/// [`ActivationEdge::loopback`] to re-read the same task after external
/// progress (a submission, a finished subprocess).
#[derive(Clone)]
pub struct ActivationEdge {
    engine: Engine,
    task: Task,
    nexts: Vec<Task>,
}

impl ActivationEdge {
    pub(crate) fn new(engine: Engine, task: Task, nexts: Vec<Task>) -> Self {
        Self {
            engine,
            task,
            nexts,
        }
    }

    /// The traversal root of a freshly spawned flow: an edge whose only
    /// successor is the pending `start` task
    pub fn from_flow_spawn(engine: &Engine, spawn: &FlowSpawn) -> Self {
        Self::new(
            engine.clone(),
            spawn.start.task.clone(),
            vec![spawn.start.task.clone()],
        )
    }

    /// The activated task this edge describes
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// The tasks it spawned, in spawn order
    pub fn nexts(&self) -> &[Task] {
        &self.nexts
    }

    /// Whether this edge describes the given step
    pub fn is_step(&self, step: &str) -> bool {
        self.task.step == step
    }

    /// Follow the successor at `step`, awaiting its activation.
    ///
    /// Fails with `StepNotFound` when no spawned successor has that step.
    pub async fn follow(&self, step: &str) -> Result<ActivationEdge, CoreError> {
        let next = self
            .nexts
            .iter()
            .find(|task| task.step == step)
            .ok_or_else(|| CoreError::StepNotFound(step.to_string()))?;

        self.engine.edge_for(next).await
    }

    /// Refresh this edge in place: re-read its own task and await whatever
    /// activation job is currently recorded on it.
    ///
    /// Always yields an edge, whether or not the task continued itself; a
    /// settled task simply yields the same snapshot again.
    pub async fn loopback(&self) -> Result<ActivationEdge, CoreError> {
        let task = self.engine.task(&self.task.id).await?;
        self.engine.edge_for(&task).await
    }

    /// Loop back until the task reaches `status`.
    ///
    /// Fails with `TraversalError` when the task settles in some other
    /// status with no further activation pending.
    pub async fn until(&self, status: TaskStatus) -> Result<ActivationEdge, CoreError> {
        let mut edge = self.clone();

        loop {
            if edge.task.status == status {
                return Ok(edge);
            }

            let seen_status = edge.task.status;
            let seen_job = edge.task.current_job.clone();

            let next = edge.loopback().await?;
            if next.task.status == seen_status && next.task.current_job == seen_job {
                return Err(CoreError::TraversalError(format!(
                    "Task {} settled without reaching \"{}\"",
                    next.task, status
                )));
            }

            edge = next;
        }
    }

    /// Loop back until the task stalls for input
    pub async fn until_stall(&self) -> Result<ActivationEdge, CoreError> {
        self.until(TaskStatus::Stall).await
    }

    /// Loop back until the task is closed
    pub async fn until_closed(&self) -> Result<ActivationEdge, CoreError> {
        self.until(TaskStatus::Closed).await
    }

    /// Edges of all spawned successors, awaiting each activation
    pub async fn edges(&self) -> Result<Vec<ActivationEdge>, CoreError> {
        let mut edges = Vec::with_capacity(self.nexts.len());
        for next in &self.nexts {
            edges.push(self.engine.edge_for(next).await?);
        }
        Ok(edges)
    }

    /// Snapshot this edge into its serializable record
    pub fn to_record(&self) -> EdgeRecord {
        EdgeRecord {
            current: self.task.id.clone(),
            nexts: self.nexts.iter().map(|task| task.id.clone()).collect(),
        }
    }
}

impl std::fmt::Debug for ActivationEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationEdge")
            .field("task", &self.task)
            .field("nexts", &self.nexts)
            .finish()
    }
}
