use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::task::{JobId, TaskId};
use crate::CoreError;

/// Work item handed to the background queue.
///
/// Jobs carry only the task ID; workers re-load the rows, so a job that
/// runs late still sees current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Job {
    /// Activate a task
    Activate {
        /// The task to activate
        task: TaskId,
    },

    /// Re-activate a task stalled on a finished subprocess
    Reenter {
        /// The stalled task
        task: TaskId,
    },
}

impl Job {
    /// The task this job targets
    pub fn task(&self) -> &TaskId {
        match self {
            Job::Activate { task } | Job::Reenter { task } => task,
        }
    }
}

/// Serializable result of one activation step: the task that ran and the
/// tasks it spawned, in spawn order. An edge can be rebuilt from this
/// record on any process that holds an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// The activated task
    pub current: TaskId,

    /// Spawned successors, in spawn order
    pub nexts: Vec<TaskId>,
}

/// The background queue contract.
///
/// `enqueue` returns a handle immediately; `fetch` awaits the activation
/// result behind a handle. A failed activation surfaces from `fetch` as
/// `JobError`; queue trouble itself (timeouts, unknown handles) is
/// `JobQueueError`.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue a job, returning its handle
    async fn enqueue(&self, job: Job) -> Result<JobId, CoreError>;

    /// Await the result of a previously enqueued job
    async fn fetch(&self, job: &JobId, timeout: Option<Duration>) -> Result<EdgeRecord, CoreError>;
}

/// Memory queue and worker for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use crate::engine::Engine;
    use crate::DataPacket;
    use dashmap::DashMap;
    use std::sync::Arc;
    use tokio::sync::{mpsc, watch};
    use tokio::task::JoinHandle;
    use uuid::Uuid;

    type JobResult = Option<Result<EdgeRecord, String>>;

    /// In-memory job queue over an unbounded channel, with per-job watch
    /// slots for result delivery.
    ///
    /// Single consumer: pair it with one [`JobWorker`], which serializes
    /// activations the way a single-worker deployment would.
    pub struct MemoryJobQueue {
        jobs: mpsc::UnboundedSender<(JobId, Job)>,
        results: DashMap<String, (watch::Sender<JobResult>, watch::Receiver<JobResult>)>,
    }

    impl MemoryJobQueue {
        /// Create a queue and the receiving end a worker consumes
        pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<(JobId, Job)>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let queue = Arc::new(Self {
                jobs: tx,
                results: DashMap::new(),
            });
            (queue, rx)
        }

        /// Deliver the result of a job; wakes any pending `fetch`
        pub fn complete(&self, job: &JobId, result: Result<EdgeRecord, String>) {
            if let Some(slot) = self.results.get(&job.0) {
                let _ = slot.0.send(Some(result));
            }
        }

        async fn await_result(&self, job: &JobId) -> Result<EdgeRecord, CoreError> {
            let mut rx = self
                .results
                .get(&job.0)
                .map(|slot| slot.1.clone())
                .ok_or_else(|| CoreError::JobQueueError(format!("Unknown job {}", job)))?;

            loop {
                if let Some(result) = rx.borrow_and_update().clone() {
                    return result.map_err(CoreError::JobError);
                }
                rx.changed()
                    .await
                    .map_err(|_| CoreError::JobQueueError(format!("Job {} abandoned", job)))?;
            }
        }
    }

    #[async_trait]
    impl JobQueue for MemoryJobQueue {
        async fn enqueue(&self, job: Job) -> Result<JobId, CoreError> {
            let id = JobId(Uuid::new_v4().to_string());
            let slot = watch::channel(None);
            self.results.insert(id.0.clone(), slot);

            self.jobs
                .send((id.clone(), job))
                .map_err(|_| CoreError::JobQueueError("Worker hung up".to_string()))?;

            Ok(id)
        }

        async fn fetch(
            &self,
            job: &JobId,
            timeout: Option<Duration>,
        ) -> Result<EdgeRecord, CoreError> {
            match timeout {
                Some(limit) => tokio::time::timeout(limit, self.await_result(job))
                    .await
                    .map_err(|_| {
                        CoreError::JobQueueError(format!("Timed out waiting for job {}", job))
                    })?,
                None => self.await_result(job).await,
            }
        }
    }

    /// Background worker draining a [`MemoryJobQueue`]
    pub struct JobWorker;

    impl JobWorker {
        /// Spawn the worker loop on the current runtime. The loop ends when
        /// the queue is dropped.
        pub fn spawn(
            engine: Engine,
            queue: Arc<MemoryJobQueue>,
            mut jobs: mpsc::UnboundedReceiver<(JobId, Job)>,
        ) -> JoinHandle<()> {
            tokio::spawn(async move {
                while let Some((id, job)) = jobs.recv().await {
                    tracing::debug!(job = %id, task = %job.task(), "Running job");

                    let result = match &job {
                        Job::Activate { task } => {
                            engine.activate(task, &DataPacket::null()).await
                        }
                        Job::Reenter { task } => engine.reenter(task).await,
                    };

                    match result {
                        Ok(edge) => queue.complete(&id, Ok(edge.to_record())),
                        Err(error) => {
                            tracing::warn!(job = %id, %error, "Job failed");
                            queue.complete(&id, Err(error.to_string()));
                        }
                    }
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_serialization() {
        let job = Job::Activate {
            task: TaskId("t1".to_string()),
        };

        let encoded = serde_json::to_value(&job).unwrap();
        assert_eq!(encoded["kind"], "activate");

        let decoded: Job = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, job);
        assert_eq!(decoded.task().0, "t1");
    }

    #[test]
    fn test_edge_record_round_trip() {
        let record = EdgeRecord {
            current: TaskId("t1".to_string()),
            nexts: vec![TaskId("t2".to_string()), TaskId("t3".to_string())],
        };

        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: EdgeRecord = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, record);
    }

    #[cfg(feature = "testing")]
    mod queue {
        use super::super::memory::MemoryJobQueue;
        use super::*;
        use std::time::Duration;

        #[tokio::test]
        async fn test_fetch_returns_completed_result() {
            let (queue, mut rx) = MemoryJobQueue::new();

            let id = queue
                .enqueue(Job::Activate {
                    task: TaskId("t1".to_string()),
                })
                .await
                .unwrap();

            let (received_id, job) = rx.recv().await.unwrap();
            assert_eq!(received_id, id);

            let record = EdgeRecord {
                current: job.task().clone(),
                nexts: vec![],
            };
            queue.complete(&id, Ok(record.clone()));

            let fetched = queue.fetch(&id, None).await.unwrap();
            assert_eq!(fetched, record);

            // Results stay fetchable
            let fetched = queue.fetch(&id, None).await.unwrap();
            assert_eq!(fetched, record);
        }

        #[tokio::test]
        async fn test_fetch_surfaces_job_failure() {
            let (queue, _rx) = MemoryJobQueue::new();

            let id = queue
                .enqueue(Job::Reenter {
                    task: TaskId("t1".to_string()),
                })
                .await
                .unwrap();
            queue.complete(&id, Err("Subprocess child(c1) failed".to_string()));

            let err = queue.fetch(&id, None).await.unwrap_err();
            assert!(matches!(err, CoreError::JobError(_)));
        }

        #[tokio::test]
        async fn test_fetch_unknown_job() {
            let (queue, _rx) = MemoryJobQueue::new();

            let err = queue
                .fetch(&JobId("missing".to_string()), None)
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::JobQueueError(_)));
        }

        #[tokio::test]
        async fn test_fetch_times_out() {
            let (queue, _rx) = MemoryJobQueue::new();

            let id = queue
                .enqueue(Job::Activate {
                    task: TaskId("t1".to_string()),
                })
                .await
                .unwrap();

            let err = queue
                .fetch(&id, Some(Duration::from_millis(10)))
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::JobQueueError(_)));
        }
    }
}
