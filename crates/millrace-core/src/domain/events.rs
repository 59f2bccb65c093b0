use crate::domain::process::Process;
use crate::domain::task::Task;
use tokio::sync::broadcast;

/// Notification fired by the engine during activation.
///
/// Delivery is in-process, fire-and-forget: subscribers that lag or hang
/// up never block publication.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    /// A task is entering its node (status was `Init`)
    EnteringTask {
        /// The task being entered
        task: Task,
    },

    /// A task is leaving its node (status reached `Done`)
    LeavingTask {
        /// The task being left
        task: Task,
    },

    /// A task was marked failed
    FailedTask {
        /// The failed task
        task: Task,
    },

    /// A process was marked failed
    FailedWorkflow {
        /// The failed process
        process: Process,
    },

    /// A process was closed successfully
    ClosedWorkflow {
        /// The closed process
        process: Process,
    },
}

/// In-process notification bus over a broadcast channel.
///
/// Subprocess reentry and audit-style listeners subscribe here; the
/// engine publishes without caring who, if anyone, is listening.
#[derive(Debug, Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<WorkflowEvent>,
}

impl NotificationBus {
    /// Create a bus with the given subscriber buffer capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: WorkflowEvent) {
        // A send error only means there are no subscribers right now.
        let _ = self.tx.send(event);
    }

    /// Subscribe to all events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::process::ProcessId;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();

        let task = Task::new(&ProcessId("p1".to_string()), "start");
        bus.publish(WorkflowEvent::EnteringTask { task: task.clone() });

        match rx.recv().await.unwrap() {
            WorkflowEvent::EnteringTask { task: received } => assert_eq!(received.id, task.id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let bus = NotificationBus::default();
        let process = Process::new("simple");

        // Must not panic or block
        bus.publish(WorkflowEvent::ClosedWorkflow { process });
    }

    #[tokio::test]
    async fn test_multiple_subscribers_each_receive() {
        let bus = NotificationBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let process = Process::new("simple");
        bus.publish(WorkflowEvent::FailedWorkflow {
            process: process.clone(),
        });

        assert!(matches!(
            first.recv().await.unwrap(),
            WorkflowEvent::FailedWorkflow { .. }
        ));
        assert!(matches!(
            second.recv().await.unwrap(),
            WorkflowEvent::FailedWorkflow { .. }
        ));
    }
}
