#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Millrace Core
//!
//! A workflow orchestration engine built on asynchronous activations.
//!
//! A **flow** is an immutable graph of named nodes (branches, automated
//! jobs, user actions, subprocesses, ends). Spawning a flow creates a
//! **process**; every node a process visits runs as a **task**, activated
//! on a background job queue. Business data lives in a per-process
//! **context** that nodes and user submissions mutate.
//!
//! Execution is observed through [`ActivationEdge`] handles: each hop of a
//! traversal awaits the background activation it refers to, so driving a
//! process reads sequentially even though every step runs on the queue.
//!
//! ```no_run
//! use std::sync::Arc;
//! use millrace_core::{
//!     ActivationEdge, DataPacket, Engine, FlowBuilder, FlowRegistry, Node,
//!     NotificationBus,
//! };
//! use millrace_core::domain::repository::memory::{
//!     MemoryContextRepository, MemoryProcessRepository, MemoryTaskRepository,
//! };
//! use millrace_core::engine::jobs::memory::{JobWorker, MemoryJobQueue};
//!
//! # async fn run() -> Result<(), millrace_core::CoreError> {
//! let registry = Arc::new(FlowRegistry::new());
//! registry.register(
//!     FlowBuilder::new("trivial")
//!         .node("start", Node::branch("end"))?
//!         .build()?,
//! )?;
//!
//! let (queue, jobs) = MemoryJobQueue::new();
//! let engine = Engine::new(
//!     registry,
//!     Arc::new(MemoryProcessRepository::new()),
//!     Arc::new(MemoryTaskRepository::new()),
//!     Arc::new(MemoryContextRepository::new()),
//!     queue.clone(),
//!     NotificationBus::default(),
//! );
//! JobWorker::spawn(engine.clone(), queue, jobs);
//!
//! let spawn = engine.spawn_flow("trivial", &DataPacket::null(), None).await?;
//! let edge = ActivationEdge::from_flow_spawn(&engine, &spawn);
//! edge.follow("start").await?.follow("end").await?;
//! # Ok(())
//! # }
//! ```

/// Domain entities, statuses, repositories and events
pub mod domain;

/// The engine and its activation machinery
pub mod engine;

/// Error types
pub mod error;

/// Flow definitions and the node algebra
pub mod flow;

/// Shared value types
pub mod types;

pub use domain::context::WorkflowContext;
pub use domain::events::{NotificationBus, WorkflowEvent};
pub use domain::process::{Process, ProcessId};
pub use domain::status::{ProcessStatus, TaskStatus};
pub use domain::task::{JobId, Task, TaskId};
pub use engine::{
    spawn_reentry_listener, Activation, ActivationEdge, EdgeRecord, Engine, FlowRegistry,
    FlowSpawn, Job, JobQueue, TaskSpawn,
};
pub use error::{CoreError, ValidationErrors};
pub use flow::{ContextFactory, FieldKind, Flow, FlowBuilder, Form, Node, NodeKind};
pub use types::DataPacket;
