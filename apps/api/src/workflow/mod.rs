//! The workflow core: stage graph, per-session state, and the engine that
//! sequences side effects against the four leaf services.

pub mod chat;
pub mod machine;
pub mod session;
pub mod stage;

pub use machine::{Advance, Workflow};
pub use session::SessionState;
pub use stage::{Stage, Trigger};

use thiserror::Error;

/// The error taxonomy surfaced by the workflow engine. Every leaf-service
/// failure is caught at the engine boundary and converted into one of these;
/// none propagate as unhandled faults to the presentation layer.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// User input missing or invalid for the current stage's required action.
    /// Surfaced immediately; no state change, no side effect attempted.
    #[error("{0}")]
    Validation(String),

    /// The action is not in the current stage's valid set. Guaranteed no-op.
    #[error("action '{action}' is not valid in stage '{}'", stage.as_str())]
    InvalidTrigger {
        stage: Stage,
        action: &'static str,
    },

    /// A gateway call failed; partially-constructed data was discarded.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// The Generation Service failed or returned an unusable result.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Rendering or artifact storage failed after generation succeeded.
    #[error("rendering failed: {0}")]
    Rendering(String),
}
