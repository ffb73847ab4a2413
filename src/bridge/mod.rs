//! Uniform bridge to external capabilities.
//!
//! Everything the orchestrator does to the outside world (web search,
//! subagent execution, deployment, sanity probes) goes through this single
//! choke point. Every invocation is appended to the audit log before the
//! executor runs, so a crash mid-call leaves an "attempted, outcome unknown"
//! entry the sequencer can reconcile on resume.

mod log;
mod process;
mod scripted;

pub use log::{CallOutcome, ToolCall, ToolLog};
pub use process::ProcessToolExecutor;
pub use scripted::ScriptedToolExecutor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactRef;
use crate::error::{Error, Result};

/// Kind of external capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Web search.
    Search,
    /// Outsourced implementation or scripted check.
    SubagentExec,
    /// Deployment trigger.
    Deploy,
    /// Live probe against the production URL.
    SanityCheck,
}

impl ToolKind {
    /// Stable name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Search => "search",
            ToolKind::SubagentExec => "subagent_exec",
            ToolKind::Deploy => "deploy",
            ToolKind::SanityCheck => "sanity_check",
        }
    }
}

/// A request issued through the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolRequest {
    /// Search the web.
    Search { query: String },
    /// Hand a work item to the subagent. The styling contract travels as a
    /// by-name reference so later tasks see artifact updates.
    SubagentExec {
        description: String,
        style_ref: Option<ArtifactRef>,
    },
    /// Trigger a deployment of the current state.
    Deploy,
    /// Probe a URL.
    SanityCheck { url: String, timeout_secs: u64 },
}

impl ToolRequest {
    /// Returns the kind of this request.
    pub fn kind(&self) -> ToolKind {
        match self {
            ToolRequest::Search { .. } => ToolKind::Search,
            ToolRequest::SubagentExec { .. } => ToolKind::SubagentExec,
            ToolRequest::Deploy => ToolKind::Deploy,
            ToolRequest::SanityCheck { .. } => ToolKind::SanityCheck,
        }
    }
}

/// Result data returned by a tool.
///
/// A response with `success: false` is a completed invocation that reported
/// failure (e.g. a 500 from the sanity probe); transport-level errors are
/// `Error::ToolInvocation` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolResponse {
    Search {
        results: Vec<String>,
    },
    SubagentExec {
        success: bool,
        diff_summary: String,
        output: String,
    },
    Deploy {
        success: bool,
        url: String,
    },
    SanityCheck {
        success: bool,
        http_status: u16,
    },
}

impl ToolResponse {
    /// Whether the tool reported success.
    pub fn succeeded(&self) -> bool {
        match self {
            ToolResponse::Search { .. } => true,
            ToolResponse::SubagentExec { success, .. } => *success,
            ToolResponse::Deploy { success, .. } => *success,
            ToolResponse::SanityCheck { success, .. } => *success,
        }
    }
}

/// Trait for tool executors.
///
/// Implementations perform the actual external work; the bridge owns
/// logging. Executors must not retry on their own: a SubagentExec call can
/// mutate source state, and retry decisions belong to the orchestration
/// loop.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Executes the given request.
    async fn invoke(&self, request: &ToolRequest) -> Result<ToolResponse>;

    /// Returns the name of this executor.
    fn name(&self) -> &str;
}

/// The single choke point for outbound tool calls.
pub struct ToolBridge {
    executor: Box<dyn ToolExecutor>,
    log: ToolLog,
}

impl ToolBridge {
    /// Creates a bridge over the given executor with an in-memory log.
    pub fn new(executor: Box<dyn ToolExecutor>) -> Self {
        Self {
            executor,
            log: ToolLog::new(),
        }
    }

    /// Attaches a JSONL audit log file.
    pub fn with_log_file(mut self, path: std::path::PathBuf) -> Self {
        self.log = self.log.with_file(path);
        self
    }

    /// Invokes a tool, recording the attempt before execution and the
    /// outcome after. Never retries.
    pub async fn invoke(&mut self, request: ToolRequest) -> Result<ToolResponse> {
        let kind = request.kind();
        let call_id = self.log.record_attempt(&request)?;

        tracing::info!(call_id = %call_id, kind = %kind.name(), "invoking tool");

        let outcome = self.executor.invoke(&request).await;
        match &outcome {
            Ok(response) => {
                self.log.record_success(&call_id, response)?;
                tracing::info!(
                    call_id = %call_id,
                    kind = %kind.name(),
                    success = response.succeeded(),
                    "tool call completed"
                );
            }
            Err(e) => {
                self.log.record_error(&call_id, &e.to_string())?;
                tracing::warn!(call_id = %call_id, kind = %kind.name(), error = %e, "tool call errored");
            }
        }
        outcome
    }

    /// Returns the append-only call log.
    pub fn log(&self) -> &ToolLog {
        &self.log
    }

    /// Returns the executor name.
    pub fn executor_name(&self) -> &str {
        self.executor.name()
    }
}

/// Convenience constructor for a transport-level tool failure.
pub fn invocation_error(kind: ToolKind, reason: impl Into<String>) -> Error {
    Error::ToolInvocation {
        kind: kind.name().to_string(),
        reason: reason.into(),
    }
}
