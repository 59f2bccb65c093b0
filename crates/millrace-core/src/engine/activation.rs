use crate::domain::context::WorkflowContext;
use crate::domain::events::{NotificationBus, WorkflowEvent};
use crate::domain::process::{Process, ProcessId};
use crate::domain::status::{ProcessStatus, TaskStatus};
use crate::domain::task::Task;

/// Mutable working state of one activation step.
///
/// An activation scopes every change a node makes to its task, process and
/// context. Nothing touches storage while the scope is open; the engine
/// commits the whole scope exactly once when the step ends, whatever the
/// outcome. Successor spawns requested through [`Activation::spawn_task`]
/// are deferred the same way and executed during that commit, in request
/// order.
pub struct Activation {
    pub(crate) task: Task,
    pub(crate) process: Process,
    pub(crate) context: WorkflowContext,
    pub(crate) spawn_requests: Vec<String>,
    pub(crate) nexts: Vec<Task>,
    bus: NotificationBus,
}

impl Activation {
    /// Open an activation scope over the given rows
    pub(crate) fn new(
        task: Task,
        process: Process,
        context: WorkflowContext,
        bus: NotificationBus,
    ) -> Self {
        Self {
            task,
            process,
            context,
            spawn_requests: Vec::new(),
            nexts: Vec::new(),
            bus,
        }
    }

    /// The task being activated
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// The owning process
    pub fn process(&self) -> &Process {
        &self.process
    }

    /// The process context
    pub fn context(&self) -> &WorkflowContext {
        &self.context
    }

    /// Mutable access to the process context
    pub fn context_mut(&mut self) -> &mut WorkflowContext {
        &mut self.context
    }

    /// Whether the task has not entered its node yet
    pub fn is_entering(&self) -> bool {
        self.task.status == TaskStatus::Init
    }

    /// Whether node logic finished and the task is about to leave
    pub fn is_leaving(&self) -> bool {
        self.task.status == TaskStatus::Done
    }

    /// Whether the task is in a status node logic may act on
    pub fn can_be_activated(&self) -> bool {
        self.task.status.can_be_activated()
    }

    /// Whether the owning process is still running
    pub fn is_running(&self) -> bool {
        self.process.status == ProcessStatus::Running
    }

    /// Mark the task ready. The first ready task of a process also moves
    /// the process from `Init` to `Running`.
    pub fn ready(&mut self) {
        self.task.ready();
        if self.process.status == ProcessStatus::Init {
            self.process.status = ProcessStatus::Running;
        }
    }

    /// Park the task waiting for external input
    pub fn stall(&mut self) {
        self.task.status = TaskStatus::Stall;
    }

    /// Record a valid user submission; the task will be re-activated
    pub fn submitted(&mut self) {
        self.task.status = TaskStatus::Submitted;
    }

    /// Mark node logic as finished
    pub fn done(&mut self) {
        self.task.done();
    }

    /// Close the task after its leave hook ran
    pub fn close(&mut self) {
        self.task.closed();
    }

    /// Abort the task and its process
    pub fn aborted(&mut self) {
        self.task.aborted();
        self.process.aborted();
    }

    /// Fail the task and its process together, recording the error text on
    /// both rows and notifying subscribers
    pub fn failed(&mut self, error: &str) {
        self.task.failed(error);
        self.process.failed(error);
        self.notify(WorkflowEvent::FailedTask {
            task: self.task.clone(),
        });
        self.notify(WorkflowEvent::FailedWorkflow {
            process: self.process.clone(),
        });
    }

    /// Close the whole process successfully and notify subscribers
    pub fn close_workflow(&mut self) {
        self.task.done();
        self.process.done();
        self.notify(WorkflowEvent::ClosedWorkflow {
            process: self.process.clone(),
        });
    }

    /// Record the child process a subprocess task stalls on
    pub fn set_subprocess(&mut self, child: ProcessId) {
        self.task.subprocess = Some(child);
    }

    /// Request a successor task at `step`, spawned at commit time
    pub fn spawn_task(&mut self, step: &str) {
        self.spawn_requests.push(step.to_string());
    }

    /// Publish a workflow event
    pub fn notify(&self, event: WorkflowEvent) {
        self.bus.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataPacket;

    fn open_scope() -> Activation {
        let process = Process::new("simple");
        let task = Task::new(&process.id, "start");
        let context = WorkflowContext::new(&process.id, DataPacket::object());
        Activation::new(task, process, context, NotificationBus::default())
    }

    #[test]
    fn test_entering_then_ready_starts_process() {
        let mut activation = open_scope();
        assert!(activation.is_entering());
        assert!(!activation.can_be_activated());

        activation.ready();
        assert!(activation.can_be_activated());
        assert_eq!(activation.process().status, ProcessStatus::Running);
    }

    #[test]
    fn test_ready_leaves_running_process_alone() {
        let mut activation = open_scope();
        activation.process.status = ProcessStatus::Running;
        activation.ready();
        assert_eq!(activation.process().status, ProcessStatus::Running);
    }

    #[test]
    fn test_done_then_close() {
        let mut activation = open_scope();
        activation.ready();
        activation.done();
        assert!(activation.is_leaving());

        activation.close();
        assert_eq!(activation.task().status, TaskStatus::Closed);
        assert!(activation.task().closed_at.is_some());
    }

    #[test]
    fn test_spawn_requests_keep_order() {
        let mut activation = open_scope();
        activation.spawn_task("first");
        activation.spawn_task("second");

        assert_eq!(activation.spawn_requests, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_failed_marks_both_rows_and_notifies() {
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();

        let process = Process::new("simple");
        let task = Task::new(&process.id, "start");
        let context = WorkflowContext::new(&process.id, DataPacket::object());
        let mut activation = Activation::new(task, process, context, bus);

        activation.failed("job blew up");
        assert_eq!(activation.task().status, TaskStatus::Failed);
        assert_eq!(activation.process().status, ProcessStatus::Failed);
        assert_eq!(activation.task().log, "job blew up");
        assert_eq!(activation.process().log, "job blew up");

        assert!(matches!(
            rx.recv().await.unwrap(),
            WorkflowEvent::FailedTask { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            WorkflowEvent::FailedWorkflow { .. }
        ));
    }

    #[tokio::test]
    async fn test_close_workflow_notifies() {
        let bus = NotificationBus::default();
        let mut rx = bus.subscribe();

        let process = Process::new("simple");
        let task = Task::new(&process.id, "end");
        let context = WorkflowContext::new(&process.id, DataPacket::object());
        let mut activation = Activation::new(task, process, context, bus);

        activation.close_workflow();
        assert_eq!(activation.task().status, TaskStatus::Done);
        assert_eq!(activation.process().status, ProcessStatus::Done);

        assert!(matches!(
            rx.recv().await.unwrap(),
            WorkflowEvent::ClosedWorkflow { .. }
        ));
    }
}
