use std::fmt;
use std::sync::Arc;

use crate::domain::context::WorkflowContext;
use crate::domain::events::WorkflowEvent;
use crate::domain::status::{ProcessStatus, TaskStatus};
use crate::engine::{Activation, Engine};
use crate::flow::form::Form;
use crate::{CoreError, DataPacket};

/// Branch predicate, evaluated against the live activation and input
pub type Predicate = Arc<dyn Fn(&Activation, &DataPacket) -> bool + Send + Sync>;

/// Automated work executed by a job node
pub type JobFn = Arc<dyn Fn(&mut Activation, &DataPacket) -> Result<(), CoreError> + Send + Sync>;

/// Hook run when a task enters or leaves its node
pub type HookFn = Arc<dyn Fn(&mut Activation) -> Result<(), CoreError> + Send + Sync>;

/// Builds the spawn input for a child process from the parent activation
pub type SpawnInputFn = Arc<dyn Fn(&Activation) -> DataPacket + Send + Sync>;

/// Consumes the finished child context when a subprocess task reenters
pub type OnResultFn =
    Arc<dyn Fn(&mut Activation, &WorkflowContext) -> Result<(), CoreError> + Send + Sync>;

/// The closed set of node behaviors a flow can be built from.
///
/// Every other part of the engine treats nodes uniformly through
/// [`Node::run`]; the variant only matters inside the activation step.
#[derive(Clone)]
pub enum NodeKind {
    /// Evaluate predicates in declaration order and follow the first that
    /// matches, or the default step when none does
    Branch {
        /// Step taken when no predicate matches
        default: String,
        /// Named predicates, tried in order
        branches: Vec<(String, Predicate)>,
    },

    /// Run a piece of automated work, then move on
    Job {
        /// The work itself
        run: JobFn,
        /// Successor step
        next: String,
    },

    /// Stall until a human submits validated form input
    UserAction {
        /// Form the submission must pass
        form: Form,
        /// Successor step
        next: String,
    },

    /// Spawn a child process and stall until it closes or fails
    Subprocess {
        /// Name of the flow to spawn
        subflow: String,
        /// Builds the child's spawn input
        spawn_input: SpawnInputFn,
        /// Runs against the finished child context on reentry
        on_result: OnResultFn,
    },

    /// Close the whole process successfully
    End,
}

impl NodeKind {
    fn name(&self) -> &'static str {
        match self {
            NodeKind::Branch { .. } => "branch",
            NodeKind::Job { .. } => "job",
            NodeKind::UserAction { .. } => "user_action",
            NodeKind::Subprocess { .. } => "subprocess",
            NodeKind::End => "end",
        }
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKind::{}", self.name())
    }
}

/// Hooks attached to a node, run while the task enters or leaves it
#[derive(Clone, Default)]
pub struct NodeHooks {
    enter: Option<HookFn>,
    leave: Option<HookFn>,
}

impl NodeHooks {
    fn run_enter(&self, activation: &mut Activation) -> Result<(), CoreError> {
        match &self.enter {
            Some(hook) => hook(activation),
            None => Ok(()),
        }
    }

    fn run_leave(&self, activation: &mut Activation) -> Result<(), CoreError> {
        match &self.leave {
            Some(hook) => hook(activation),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for NodeHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeHooks")
            .field("enter", &self.enter.is_some())
            .field("leave", &self.leave.is_some())
            .finish()
    }
}

/// One step of a flow: a behavior plus optional enter/leave hooks
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKind,
    hooks: NodeHooks,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            hooks: NodeHooks::default(),
        }
    }

    /// A branch node falling through to `default`
    pub fn branch(default: &str) -> Self {
        Self::new(NodeKind::Branch {
            default: default.to_string(),
            branches: Vec::new(),
        })
    }

    /// Add a predicate branch. Panics when called on a non-branch node;
    /// only meaningful while building a flow.
    pub fn when<F>(mut self, step: &str, predicate: F) -> Self
    where
        F: Fn(&Activation, &DataPacket) -> bool + Send + Sync + 'static,
    {
        match &mut self.kind {
            NodeKind::Branch { branches, .. } => {
                branches.push((step.to_string(), Arc::new(predicate)));
            }
            other => panic!("when() on a {} node", other.name()),
        }
        self
    }

    /// A job node running `work`, then moving to `next`
    pub fn job<F>(next: &str, work: F) -> Self
    where
        F: Fn(&mut Activation, &DataPacket) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        Self::new(NodeKind::Job {
            run: Arc::new(work),
            next: next.to_string(),
        })
    }

    /// A user action node stalling for `form` input, then moving to `next`
    pub fn user_action(next: &str, form: Form) -> Self {
        Self::new(NodeKind::UserAction {
            form,
            next: next.to_string(),
        })
    }

    /// A subprocess node spawning `subflow` and consuming its result
    pub fn subprocess<S, R>(subflow: &str, spawn_input: S, on_result: R) -> Self
    where
        S: Fn(&Activation) -> DataPacket + Send + Sync + 'static,
        R: Fn(&mut Activation, &WorkflowContext) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        Self::new(NodeKind::Subprocess {
            subflow: subflow.to_string(),
            spawn_input: Arc::new(spawn_input),
            on_result: Arc::new(on_result),
        })
    }

    /// An end node closing the process
    pub fn end() -> Self {
        Self::new(NodeKind::End)
    }

    /// Attach an enter hook
    pub fn on_enter<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Activation) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.hooks.enter = Some(Arc::new(hook));
        self
    }

    /// Attach a leave hook
    pub fn on_leave<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Activation) -> Result<(), CoreError> + Send + Sync + 'static,
    {
        self.hooks.leave = Some(Arc::new(hook));
        self
    }

    /// Behavior name, for logging
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Successor steps this node can move to, for flow validation
    pub(crate) fn successors(&self) -> Vec<&str> {
        match &self.kind {
            NodeKind::Branch { default, branches } => {
                let mut steps: Vec<&str> = vec![default.as_str()];
                steps.extend(branches.iter().map(|(step, _)| step.as_str()));
                steps
            }
            NodeKind::Job { next, .. } | NodeKind::UserAction { next, .. } => {
                vec![next.as_str()]
            }
            NodeKind::Subprocess { .. } | NodeKind::End => Vec::new(),
        }
    }

    /// Drive one activation of this node.
    ///
    /// The shape is fixed for all kinds: an entering task is readied (enter
    /// hook included), an activatable task gets the kind-specific behavior,
    /// and a task that ended up done leaves (leave hook included) and is
    /// closed. Kind behavior only ever runs between those two phases.
    pub(crate) async fn run(
        &self,
        engine: &Engine,
        activation: &mut Activation,
        input: &DataPacket,
    ) -> Result<(), CoreError> {
        if activation.is_entering() {
            activation.notify(WorkflowEvent::EnteringTask {
                task: activation.task().clone(),
            });
            self.hooks.run_enter(activation)?;
            activation.ready();
        }

        if activation.can_be_activated() {
            self.activate(engine, activation, input).await?;
        }

        if activation.is_leaving() {
            activation.notify(WorkflowEvent::LeavingTask {
                task: activation.task().clone(),
            });
            self.hooks.run_leave(activation)?;
            activation.close();
        }

        Ok(())
    }

    async fn activate(
        &self,
        engine: &Engine,
        activation: &mut Activation,
        input: &DataPacket,
    ) -> Result<(), CoreError> {
        match &self.kind {
            NodeKind::Branch { default, branches } => {
                if activation.task().status == TaskStatus::Ready {
                    let step = branches
                        .iter()
                        .find(|(_, predicate)| predicate(activation, input))
                        .map(|(step, _)| step.as_str())
                        .unwrap_or(default.as_str());
                    activation.spawn_task(step);
                    activation.done();
                }
            }

            NodeKind::Job { run, next } => {
                if activation.task().status == TaskStatus::Ready {
                    run(activation, input)?;
                    activation.spawn_task(next);
                    activation.done();
                }
            }

            NodeKind::UserAction { next, .. } => match activation.task().status {
                TaskStatus::Ready => activation.stall(),
                TaskStatus::Submitted => {
                    activation.spawn_task(next);
                    activation.done();
                }
                _ => {}
            },

            NodeKind::Subprocess {
                subflow,
                spawn_input,
                on_result,
            } => match activation.task().status {
                TaskStatus::Ready => {
                    let child_input = spawn_input(activation);
                    let spawn = engine
                        .spawn_flow(subflow, &child_input, activation.process().created_by.clone())
                        .await?;
                    activation.set_subprocess(spawn.process.id.clone());
                    activation.stall();
                }
                TaskStatus::Reentering => {
                    let child_id = activation.task().subprocess.clone().ok_or_else(|| {
                        CoreError::NodeError("Reentering task has no subprocess".to_string())
                    })?;
                    let child = engine.process(&child_id).await?;
                    if child.status == ProcessStatus::Failed {
                        return Err(CoreError::NodeError(format!(
                            "Subprocess {} failed",
                            child
                        )));
                    }
                    let child_context = engine.context(&child_id).await?;
                    on_result(activation, &child_context)?;
                    activation.done();
                }
                _ => {}
            },

            NodeKind::End => {
                if activation.task().status == TaskStatus::Ready {
                    activation.close_workflow();
                }
            }
        }

        Ok(())
    }

    /// Apply a user submission to a stalled user action task.
    ///
    /// Only user action nodes accept submissions, and only while stalled;
    /// anything else is `TaskNotStall`. Invalid input is `InvalidForm` and
    /// leaves the activation untouched.
    pub(crate) fn submit(
        &self,
        activation: &mut Activation,
        input: &DataPacket,
    ) -> Result<(), CoreError> {
        let form = match &self.kind {
            NodeKind::UserAction { form, .. } if activation.task().status == TaskStatus::Stall => {
                form
            }
            _ => return Err(CoreError::TaskNotStall),
        };

        let update = form.validate(input).map_err(CoreError::InvalidForm)?;
        activation.context_mut().merge(&update);
        activation.submitted();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::form::FieldKind;

    #[test]
    fn test_branch_successors_in_order() {
        let node = Node::branch("reject")
            .when("approve", |_, _| true)
            .when("escalate", |_, _| false);

        assert_eq!(node.successors(), vec!["reject", "approve", "escalate"]);
        assert_eq!(node.kind_name(), "branch");
    }

    #[test]
    fn test_linear_successors() {
        let job = Node::job("end", |_, _| Ok(()));
        assert_eq!(job.successors(), vec!["end"]);

        let action = Node::user_action(
            "check",
            Form::new().required("approval_decision", FieldKind::Bool),
        );
        assert_eq!(action.successors(), vec!["check"]);
    }

    #[test]
    fn test_terminal_nodes_have_no_successors() {
        assert!(Node::end().successors().is_empty());

        let sub = Node::subprocess("child", |_| DataPacket::null(), |_, _| Ok(()));
        assert!(sub.successors().is_empty());
        assert_eq!(sub.kind_name(), "subprocess");
    }

    #[test]
    #[should_panic(expected = "when() on a job node")]
    fn test_when_rejects_non_branch() {
        let _ = Node::job("end", |_, _| Ok(())).when("x", |_, _| true);
    }

    #[test]
    fn test_debug_does_not_expose_closures() {
        let node = Node::job("end", |_, _| Ok(())).on_enter(|_| Ok(()));
        let rendered = format!("{:?}", node);

        assert!(rendered.contains("NodeKind::job"));
        assert!(rendered.contains("enter: true"));
    }
}
