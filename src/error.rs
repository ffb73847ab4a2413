//! Error types for the launch-control orchestrator.

use thiserror::Error;

/// Top-level error type for orchestration operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A phase or dispatch cannot start because a required input is missing.
    #[error("blocked precondition: {0}")]
    BlockedPrecondition(String),

    /// An external tool call errored.
    #[error("tool invocation failed ({kind}): {reason}")]
    ToolInvocation { kind: String, reason: String },

    /// The run is suspended on an unresolved clarification request.
    #[error("awaiting clarification: {0}")]
    AwaitingClarification(String),

    /// The task list document could not be parsed.
    #[error("task list error: {0}")]
    TaskList(String),

    /// Run state could not be saved or restored.
    #[error("state persistence error: {0}")]
    State(String),

    /// IO error during artifact or log operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for orchestration operations.
pub type Result<T> = std::result::Result<T, Error>;
