//! Declarative definition-of-done conditions and the verification gate.
//!
//! The gate owns no domain logic: it runs each condition through the tool
//! bridge, ANDs the results, and reports exactly which predicates failed so
//! retries can be targeted.

use serde::{Deserialize, Serialize};

use crate::bridge::{ToolBridge, ToolRequest, ToolResponse};
use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::task::Task;

/// A checkable condition in a task's definition of done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// HTTP GET on the URL returns the expected status within the sanity
    /// timeout.
    HttpOk {
        url: String,
        #[serde(default = "default_expect_status")]
        expect_status: u16,
    },
    /// A check the subagent runs and reports on (a script, a manual
    /// walkthrough of a flow, anything expressible as text).
    Scripted { check: String },
}

fn default_expect_status() -> u16 {
    200
}

impl Condition {
    /// An HTTP 200 check on the given URL.
    pub fn http_ok(url: impl Into<String>) -> Self {
        Condition::HttpOk {
            url: url.into(),
            expect_status: 200,
        }
    }

    /// A scripted check.
    pub fn scripted(check: impl Into<String>) -> Self {
        Condition::Scripted {
            check: check.into(),
        }
    }

    /// Parses the `verify:` shorthand used in task.md.
    ///
    /// `GET <url> returns <status>` becomes an HTTP check; anything else is
    /// handed to the subagent verbatim.
    pub fn parse(text: &str) -> Self {
        if let Some(rest) = text.strip_prefix("GET ") {
            if let Some((url, status)) = rest.split_once(" returns ") {
                if let Ok(expect_status) = status.trim().parse::<u16>() {
                    return Condition::HttpOk {
                        url: url.trim().to_string(),
                        expect_status,
                    };
                }
            }
        }
        Condition::scripted(text)
    }

    /// Renders the condition back to its task.md shorthand.
    pub fn render(&self) -> String {
        match self {
            Condition::HttpOk { url, expect_status } => {
                format!("GET {} returns {}", url, expect_status)
            }
            Condition::Scripted { check } => check.clone(),
        }
    }
}

/// Outcome of evaluating a task's definition of done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// Every condition held.
    Pass,
    /// At least one condition failed; descriptions listed.
    Fail(Vec<String>),
}

impl GateOutcome {
    /// Whether the gate passed.
    pub fn is_pass(&self) -> bool {
        matches!(self, GateOutcome::Pass)
    }
}

/// Evaluates definitions of done through the tool bridge.
pub struct VerificationGate {
    sanity_timeout_secs: u64,
}

impl VerificationGate {
    /// Creates a gate using the configured sanity timeout.
    pub fn new(config: &OrchestratorConfig) -> Self {
        Self {
            sanity_timeout_secs: config.sanity.timeout_secs,
        }
    }

    /// Runs every condition of the task and reports which failed.
    ///
    /// All conditions are evaluated even after the first failure. Transport
    /// errors propagate; they are not check failures.
    pub async fn evaluate(&self, task: &Task, bridge: &mut ToolBridge) -> Result<GateOutcome> {
        if task.verification.is_empty() {
            tracing::warn!(task_id = %task.id, "task has no verification conditions");
            return Ok(GateOutcome::Pass);
        }

        let mut failed = Vec::new();
        for condition in &task.verification {
            if !self.check(condition, bridge).await? {
                failed.push(condition.render());
            }
        }

        if failed.is_empty() {
            tracing::info!(task_id = %task.id, "verification passed");
            Ok(GateOutcome::Pass)
        } else {
            tracing::info!(task_id = %task.id, failed = ?failed, "verification failed");
            Ok(GateOutcome::Fail(failed))
        }
    }

    async fn check(&self, condition: &Condition, bridge: &mut ToolBridge) -> Result<bool> {
        match condition {
            Condition::HttpOk { url, expect_status } => {
                let response = bridge
                    .invoke(ToolRequest::SanityCheck {
                        url: url.clone(),
                        timeout_secs: self.sanity_timeout_secs,
                    })
                    .await?;
                match response {
                    ToolResponse::SanityCheck { http_status, .. } => {
                        Ok(http_status == *expect_status)
                    }
                    _ => Ok(false),
                }
            }
            Condition::Scripted { check } => {
                let response = bridge
                    .invoke(ToolRequest::SubagentExec {
                        description: format!(
                            "Run this check and exit successfully only if it holds: {}",
                            check
                        ),
                        style_ref: None,
                    })
                    .await?;
                Ok(response.succeeded())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{ScriptedToolExecutor, ToolKind};
    use crate::task::Task;

    fn gate() -> VerificationGate {
        VerificationGate::new(&OrchestratorConfig::default())
    }

    #[test]
    fn parse_get_shorthand() {
        let condition = Condition::parse("GET https://example.test/login returns 200");
        assert_eq!(
            condition,
            Condition::HttpOk {
                url: "https://example.test/login".to_string(),
                expect_status: 200,
            }
        );
    }

    #[test]
    fn parse_falls_back_to_scripted() {
        let condition = Condition::parse("submit returns JWT");
        assert_eq!(condition, Condition::scripted("submit returns JWT"));
    }

    #[test]
    fn render_round_trips() {
        for text in [
            "GET https://example.test/ returns 200",
            "run `./scripts/check.sh`",
        ] {
            assert_eq!(Condition::parse(text).render(), text);
        }
    }

    #[tokio::test]
    async fn all_conditions_pass() {
        let task = Task::new("TASK-001", 0, "deploy hello world")
            .with_condition(Condition::http_ok("https://example.test/"))
            .with_condition(Condition::scripted("page shows Hello World"));
        let mut bridge = ToolBridge::new(Box::new(ScriptedToolExecutor::new()));

        let outcome = gate().evaluate(&task, &mut bridge).await.unwrap();
        assert!(outcome.is_pass());
        assert_eq!(bridge.log().calls().len(), 2);
    }

    #[tokio::test]
    async fn failed_conditions_are_listed() {
        let executor = ScriptedToolExecutor::new();
        executor.enqueue(
            ToolKind::SanityCheck,
            ToolResponse::SanityCheck {
                success: false,
                http_status: 404,
            },
        );
        executor.enqueue(
            ToolKind::SubagentExec,
            ToolResponse::SubagentExec {
                success: false,
                diff_summary: String::new(),
                output: "check failed".to_string(),
            },
        );
        let mut bridge = ToolBridge::new(Box::new(executor));

        let task = Task::new("TASK-002", 1, "build login form")
            .with_condition(Condition::http_ok("https://example.test/login"))
            .with_condition(Condition::scripted("submit returns JWT"));

        let outcome = gate().evaluate(&task, &mut bridge).await.unwrap();
        match outcome {
            GateOutcome::Fail(failed) => {
                assert_eq!(failed.len(), 2);
                assert!(failed[0].contains("/login"));
                assert!(failed[1].contains("JWT"));
            }
            GateOutcome::Pass => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn wrong_status_fails_even_when_probe_succeeds() {
        let executor = ScriptedToolExecutor::new();
        executor.enqueue(
            ToolKind::SanityCheck,
            ToolResponse::SanityCheck {
                success: true,
                http_status: 204,
            },
        );
        let mut bridge = ToolBridge::new(Box::new(executor));

        let task = Task::new("TASK-001", 0, "deploy hello world")
            .with_condition(Condition::http_ok("https://example.test/"));

        let outcome = gate().evaluate(&task, &mut bridge).await.unwrap();
        assert!(!outcome.is_pass());
    }

    #[tokio::test]
    async fn empty_definition_of_done_passes_with_warning() {
        let task = Task::new("TASK-001", 0, "deploy hello world");
        let mut bridge = ToolBridge::new(Box::new(ScriptedToolExecutor::new()));

        let outcome = gate().evaluate(&task, &mut bridge).await.unwrap();
        assert!(outcome.is_pass());
        assert!(bridge.log().calls().is_empty());
    }
}
