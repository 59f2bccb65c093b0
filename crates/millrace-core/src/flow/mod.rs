//! Flow definitions: the node algebra, forms, and the builder that
//! assembles nodes into validated, immutable flows.

use std::collections::HashMap;

use crate::CoreError;

/// Forms and context factories
pub mod form;

/// The node algebra
pub mod node;

pub use form::{ContextFactory, FieldKind, Form};
pub use node::{Node, NodeKind};

/// The step every flow starts at
pub const START_STEP: &str = "start";

/// The implicit final step, added by the builder when not declared
pub const END_STEP: &str = "end";

/// A validated, immutable graph of named nodes.
///
/// Flows are built once through [`FlowBuilder`], registered with the
/// engine, and shared read-only between all processes spawned from them.
#[derive(Debug)]
pub struct Flow {
    name: String,
    nodes: HashMap<String, Node>,
    context_factory: ContextFactory,
}

impl Flow {
    /// The flow's registered name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve a step name to its node
    pub fn node(&self, step: &str) -> Result<&Node, CoreError> {
        self.nodes
            .get(step)
            .ok_or_else(|| CoreError::StepNotFound(step.to_string()))
    }

    /// The context factory for processes of this flow
    pub fn context_factory(&self) -> &ContextFactory {
        &self.context_factory
    }

    /// Declared step names, for introspection
    pub fn steps(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }
}

/// Two-phase flow construction: collect nodes, then validate the graph.
///
/// `build` checks that a `start` node exists and that every successor a
/// node names resolves to a declared node; an `end` node is supplied
/// implicitly when the flow does not declare one.
#[derive(Debug)]
pub struct FlowBuilder {
    name: String,
    nodes: HashMap<String, Node>,
    context_factory: ContextFactory,
}

impl FlowBuilder {
    /// Start building a flow with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            nodes: HashMap::new(),
            context_factory: ContextFactory::default(),
        }
    }

    /// Add a named node. Duplicate step names are rejected.
    pub fn node(mut self, step: &str, node: Node) -> Result<Self, CoreError> {
        if self.nodes.contains_key(step) {
            return Err(CoreError::ValidationError(format!(
                "Duplicate step \"{}\" in flow \"{}\"",
                step, self.name
            )));
        }
        self.nodes.insert(step.to_string(), node);
        Ok(self)
    }

    /// Set the context factory
    pub fn context(mut self, factory: ContextFactory) -> Self {
        self.context_factory = factory;
        self
    }

    /// Validate the graph and freeze it into a [`Flow`]
    pub fn build(mut self) -> Result<Flow, CoreError> {
        if !self.nodes.contains_key(START_STEP) {
            return Err(CoreError::ValidationError(format!(
                "Flow \"{}\" has no \"{}\" node",
                self.name, START_STEP
            )));
        }

        self.nodes
            .entry(END_STEP.to_string())
            .or_insert_with(Node::end);

        for (step, node) in &self.nodes {
            for successor in node.successors() {
                if !self.nodes.contains_key(successor) {
                    return Err(CoreError::ValidationError(format!(
                        "Step \"{}\" in flow \"{}\" points at unknown step \"{}\"",
                        step, self.name, successor
                    )));
                }
            }
        }

        Ok(Flow {
            name: self.name,
            nodes: self.nodes,
            context_factory: self.context_factory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DataPacket;
    use serde_json::json;

    fn approval_flow() -> Result<Flow, CoreError> {
        FlowBuilder::new("simple")
            .context(ContextFactory::simple(DataPacket::new(
                json!({"approval_decision": false, "approved": false}),
            )))
            .node("start", Node::branch("to_approve"))?
            .node(
                "to_approve",
                Node::user_action(
                    "check_approval",
                    Form::new().required("approval_decision", FieldKind::Bool),
                ),
            )?
            .node(
                "check_approval",
                Node::branch("reject").when("approve", |activation, _| {
                    activation.context().flag("approval_decision")
                }),
            )?
            .node(
                "approve",
                Node::job("end", |activation, _| {
                    activation.context_mut().set("approved", json!(true));
                    Ok(())
                }),
            )?
            .node(
                "reject",
                Node::job("end", |activation, _| {
                    activation.context_mut().set("approved", json!(false));
                    Ok(())
                }),
            )?
            .build()
    }

    #[test]
    fn test_build_adds_implicit_end() {
        let flow = approval_flow().unwrap();

        assert_eq!(flow.name(), "simple");
        assert_eq!(flow.node("end").unwrap().kind_name(), "end");
        assert_eq!(flow.steps().count(), 6);
    }

    #[test]
    fn test_unknown_step_lookup() {
        let flow = approval_flow().unwrap();
        let err = flow.node("nonexistent").unwrap_err();

        assert!(matches!(err, CoreError::StepNotFound(_)));
        assert_eq!(err.to_string(), "Missing step \"nonexistent\"");
    }

    #[test]
    fn test_build_requires_start() {
        let err = FlowBuilder::new("broken")
            .node("only", Node::end())
            .unwrap()
            .build()
            .unwrap_err();

        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[test]
    fn test_build_rejects_dangling_successor() {
        let err = FlowBuilder::new("broken")
            .node("start", Node::job("missing", |_, _| Ok(())))
            .unwrap()
            .build()
            .unwrap_err();

        assert!(err.to_string().contains("unknown step \"missing\""));
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let err = FlowBuilder::new("broken")
            .node("start", Node::end())
            .unwrap()
            .node("start", Node::end())
            .unwrap_err();

        assert!(err.to_string().contains("Duplicate step"));
    }

    #[test]
    fn test_declared_end_is_kept() {
        let flow = FlowBuilder::new("custom_end")
            .node("start", Node::branch("end"))
            .unwrap()
            .node("end", Node::end().on_leave(|_| Ok(())))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(flow.node("end").unwrap().kind_name(), "end");
    }
}
