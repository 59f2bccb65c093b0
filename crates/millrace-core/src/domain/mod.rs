//! Domain layer: the persisted entities the engine mutates, the status
//! vocabulary, the persistence contracts and the notification events.

/// Workflow context record
pub mod context;

/// Notification events and bus
pub mod events;

/// Process record
pub mod process;

/// Repository traits and in-memory implementations
pub mod repository;

/// Process/task lifecycle status vocabulary
pub mod status;

/// Task record
pub mod task;
