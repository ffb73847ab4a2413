//! Launch Control - agentic orchestrator for shipping a paid product in a day
//!
//! This library drives an idea through twelve fixed phases, from brainstorm to
//! marketing, delegating implementation work to external tools (search,
//! subagents, deploys, sanity checks) behind a single audited bridge.

pub mod artifact;
pub mod bridge;
pub mod clarify;
pub mod config;
pub mod error;
pub mod phase;
pub mod sequencer;
pub mod state;
pub mod task;
pub mod verify;

pub use artifact::{Artifact, ArtifactRef, ArtifactStore, PRODUCT_DEFINITION_SECTIONS};
pub use bridge::{
    CallOutcome, ProcessToolExecutor, ScriptedToolExecutor, ToolBridge, ToolCall, ToolExecutor,
    ToolKind, ToolLog, ToolRequest, ToolResponse,
};
pub use clarify::{ClarificationOrigin, ClarificationQueue, ClarificationRequest};
pub use config::{LoopConfig, OrchestratorConfig, SanityConfig};
pub use error::{Error, Result};
pub use phase::{Phase, ALL_PHASES};
pub use sequencer::{Advance, BlockReason, PhaseSequencer, RunEvent, RunOutcome};
pub use state::RunState;
pub use task::{
    parse_task_list, render_task_list, Task, TaskGraph, TaskStatus, FIRST_TASK_SUBJECT,
};
pub use verify::{Condition, GateOutcome, VerificationGate};
