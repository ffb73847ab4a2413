//! Clarification interrupts.
//!
//! When input is ambiguous or retries exhaust, the run suspends on a
//! structured question to the operator. While any request is unresolved the
//! sequencer and task graph are frozen; resolution substitutes the answer
//! into the blocked state and resumes exactly where the run stopped.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::phase::Phase;

/// Where a clarification request originated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationOrigin {
    /// Phase active when the question was raised.
    pub phase: Phase,
    /// Task that triggered the question, if any.
    pub task_id: Option<String>,
}

/// A question surfaced to the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationRequest {
    /// Unique request identifier.
    pub id: String,
    /// Originating phase/task.
    pub origin: ClarificationOrigin,
    /// Question text.
    pub question: String,
    /// Operator answer, present once resolved.
    pub resolution: Option<String>,
    /// Unix-epoch seconds when raised.
    pub raised_at: u64,
}

impl ClarificationRequest {
    /// Whether the request is still awaiting an answer.
    pub fn is_pending(&self) -> bool {
        self.resolution.is_none()
    }
}

/// Ordered record of clarification requests for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClarificationQueue {
    requests: Vec<ClarificationRequest>,
}

impl ClarificationQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises a new question. Returns the request id.
    pub fn raise(
        &mut self,
        phase: Phase,
        task_id: Option<String>,
        question: impl Into<String>,
    ) -> String {
        let request = ClarificationRequest {
            id: uuid::Uuid::new_v4().to_string(),
            origin: ClarificationOrigin { phase, task_id },
            question: question.into(),
            resolution: None,
            raised_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        let id = request.id.clone();
        tracing::warn!(
            clarification_id = %id,
            phase = %phase.name(),
            question = %request.question,
            "run suspended on clarification"
        );
        self.requests.push(request);
        id
    }

    /// The oldest unresolved request, if any.
    pub fn pending(&self) -> Option<&ClarificationRequest> {
        self.requests.iter().find(|r| r.is_pending())
    }

    /// Whether any request is unresolved.
    pub fn has_pending(&self) -> bool {
        self.pending().is_some()
    }

    /// Records the operator's answer for a request.
    pub fn resolve(&mut self, id: &str, answer: impl Into<String>) -> Result<&ClarificationRequest> {
        let request = self
            .requests
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::State(format!("unknown clarification {}", id)))?;
        if request.resolution.is_some() {
            return Err(Error::State(format!("clarification {} already resolved", id)));
        }
        request.resolution = Some(answer.into());
        tracing::info!(clarification_id = %id, "clarification resolved");
        Ok(request)
    }

    /// All requests, in raise order.
    pub fn requests(&self) -> &[ClarificationRequest] {
        &self.requests
    }
}
