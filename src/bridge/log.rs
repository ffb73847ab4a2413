//! Append-only audit log of tool calls.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::{ToolKind, ToolRequest, ToolResponse};

/// Recorded outcome of a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallOutcome {
    /// The tool returned a response (which may itself report failure).
    Ok { response: ToolResponse },
    /// The invocation errored at the transport level.
    Err { error: String },
}

/// One entry in the audit log. Immutable once its outcome is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call identifier.
    pub id: String,
    /// Kind of tool invoked.
    pub kind: ToolKind,
    /// The request payload.
    pub request: ToolRequest,
    /// Outcome, absent while the call is in flight (or if the process
    /// crashed mid-call).
    pub outcome: Option<CallOutcome>,
    /// Unix-epoch seconds when the attempt was recorded.
    pub started_at: u64,
    /// Unix-epoch seconds when the outcome was recorded.
    pub finished_at: Option<u64>,
}

/// In-memory append-only log, optionally mirrored to a JSONL file.
///
/// Each attempt writes a line before the executor runs and each outcome
/// writes a second line, so the file's last line tells a resuming process
/// whether an external call may have had unobserved effects.
#[derive(Debug, Default)]
pub struct ToolLog {
    calls: Vec<ToolCall>,
    file: Option<PathBuf>,
}

impl ToolLog {
    /// Creates an empty in-memory log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors every record to the given JSONL file.
    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file = Some(path);
        self
    }

    /// Records that a call is about to be made. Returns the call id.
    pub fn record_attempt(&mut self, request: &ToolRequest) -> Result<String> {
        let call = ToolCall {
            id: uuid::Uuid::new_v4().to_string(),
            kind: request.kind(),
            request: request.clone(),
            outcome: None,
            started_at: now_secs(),
            finished_at: None,
        };
        self.append_line(&call)?;
        let id = call.id.clone();
        self.calls.push(call);
        Ok(id)
    }

    /// Records a successful response for an in-flight call.
    pub fn record_success(&mut self, call_id: &str, response: &ToolResponse) -> Result<()> {
        self.record_outcome(
            call_id,
            CallOutcome::Ok {
                response: response.clone(),
            },
        )
    }

    /// Records a transport-level error for an in-flight call.
    pub fn record_error(&mut self, call_id: &str, error: &str) -> Result<()> {
        self.record_outcome(
            call_id,
            CallOutcome::Err {
                error: error.to_string(),
            },
        )
    }

    fn record_outcome(&mut self, call_id: &str, outcome: CallOutcome) -> Result<()> {
        let file = self.file.clone();
        let call = self
            .calls
            .iter_mut()
            .find(|c| c.id == call_id)
            .ok_or_else(|| Error::State(format!("unknown tool call {}", call_id)))?;
        call.outcome = Some(outcome);
        call.finished_at = Some(now_secs());

        if let Some(path) = file {
            append_to_file(&path, call)?;
        }
        Ok(())
    }

    /// All recorded calls, in issue order.
    pub fn calls(&self) -> &[ToolCall] {
        &self.calls
    }

    /// Calls of the given kind, in issue order.
    pub fn calls_of_kind(&self, kind: ToolKind) -> Vec<&ToolCall> {
        self.calls.iter().filter(|c| c.kind == kind).collect()
    }

    /// Calls whose outcome was never recorded (crash candidates).
    pub fn unreconciled(&self) -> Vec<&ToolCall> {
        self.calls.iter().filter(|c| c.outcome.is_none()).collect()
    }

    fn append_line(&self, call: &ToolCall) -> Result<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        append_to_file(path, call)
    }
}

fn append_to_file(path: &Path, call: &ToolCall) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let line = serde_json::to_string(call)
        .map_err(|e| Error::State(format!("failed to serialize tool call: {}", e)))?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)?;
    Ok(())
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn attempt_then_outcome_updates_entry() {
        let mut log = ToolLog::new();
        let id = log.record_attempt(&ToolRequest::Deploy).unwrap();
        assert_eq!(log.unreconciled().len(), 1);

        log.record_success(
            &id,
            &ToolResponse::Deploy {
                success: true,
                url: "https://example.test".to_string(),
            },
        )
        .unwrap();

        assert!(log.unreconciled().is_empty());
        assert!(log.calls()[0].finished_at.is_some());
    }

    #[test]
    fn outcome_for_unknown_call_is_an_error() {
        let mut log = ToolLog::new();
        let err = log.record_error("nope", "boom").unwrap_err();
        assert!(matches!(err, Error::State(_)));
    }

    #[test]
    fn jsonl_file_keeps_attempted_line_before_outcome() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calls.jsonl");
        let mut log = ToolLog::new().with_file(path.clone());

        let id = log
            .record_attempt(&ToolRequest::Search {
                query: "q".to_string(),
            })
            .unwrap();
        log.record_success(&id, &ToolResponse::Search { results: vec![] })
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: ToolCall = serde_json::from_str(lines[0]).unwrap();
        assert!(first.outcome.is_none());
        let second: ToolCall = serde_json::from_str(lines[1]).unwrap();
        assert!(second.outcome.is_some());
    }

    #[test]
    fn calls_of_kind_filters_in_order() {
        let mut log = ToolLog::new();
        log.record_attempt(&ToolRequest::Deploy).unwrap();
        log.record_attempt(&ToolRequest::Search {
            query: "a".to_string(),
        })
        .unwrap();
        log.record_attempt(&ToolRequest::Deploy).unwrap();

        assert_eq!(log.calls_of_kind(ToolKind::Deploy).len(), 2);
        assert_eq!(log.calls_of_kind(ToolKind::SanityCheck).len(), 0);
    }
}
