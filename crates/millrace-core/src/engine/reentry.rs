use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::domain::events::WorkflowEvent;
use crate::engine::Engine;

/// Spawn the listener wiring finished processes back to their waiting
/// parents.
///
/// Subscribes to the notification bus; whenever a process closes or fails,
/// every task stalled on it gets a `Reenter` job. The engine itself never
/// tracks waiters. The loop ends when the bus is dropped; a lagging
/// subscription is logged and resumed, so a missed event means the
/// affected parent stays stalled until something re-publishes.
pub fn spawn_reentry_listener(engine: Engine) -> JoinHandle<()> {
    let mut events = engine.bus().subscribe();

    tokio::spawn(async move {
        loop {
            let process = match events.recv().await {
                Ok(WorkflowEvent::ClosedWorkflow { process }) => process,
                Ok(WorkflowEvent::FailedWorkflow { process }) => process,
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Reentry listener lagged behind the bus");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            debug!(process = %process, "Process finished, scheduling reentries");
            if let Err(error) = engine.schedule_reentries(&process.id).await {
                warn!(process = %process, %error, "Failed to schedule reentries");
            }
        }
    })
}
