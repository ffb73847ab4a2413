//! Process-backed tool executor.
//!
//! Shells out to operator-configured commands for search, subagent work and
//! deployment, and probes URLs with `curl`. The task description is piped to
//! the subagent command on stdin so prompts never hit the argv limit.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::Result;

use super::{invocation_error, ToolExecutor, ToolKind, ToolRequest, ToolResponse};

/// Tool executor backed by external commands.
pub struct ProcessToolExecutor {
    subagent_cmd: String,
    deploy_cmd: String,
    search_cmd: Option<String>,
    production_url: String,
}

impl ProcessToolExecutor {
    /// Creates an executor with the given subagent and deploy commands.
    pub fn new(subagent_cmd: impl Into<String>, deploy_cmd: impl Into<String>) -> Self {
        Self {
            subagent_cmd: subagent_cmd.into(),
            deploy_cmd: deploy_cmd.into(),
            search_cmd: None,
            production_url: String::new(),
        }
    }

    /// Sets the search command. Receives the query on stdin, emits one
    /// result per stdout line.
    pub fn with_search_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.search_cmd = Some(cmd.into());
        self
    }

    /// Sets the production URL reported by deploys.
    pub fn with_production_url(mut self, url: impl Into<String>) -> Self {
        self.production_url = url.into();
        self
    }

    async fn run_with_stdin(&self, kind: ToolKind, cmd: &str, stdin: &str) -> Result<(bool, String)> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| invocation_error(kind, format!("failed to spawn '{}': {}", cmd, e)))?;

        if let Some(mut handle) = child.stdin.take() {
            handle
                .write_all(stdin.as_bytes())
                .await
                .map_err(|e| invocation_error(kind, format!("failed to write stdin: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| invocation_error(kind, format!("failed to wait for '{}': {}", cmd, e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            tracing::warn!(
                kind = %kind.name(),
                status = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "tool command exited non-zero"
            );
        }
        Ok((output.status.success(), stdout))
    }
}

#[async_trait]
impl ToolExecutor for ProcessToolExecutor {
    async fn invoke(&self, request: &ToolRequest) -> Result<ToolResponse> {
        match request {
            ToolRequest::Search { query } => {
                let cmd = self.search_cmd.as_deref().ok_or_else(|| {
                    invocation_error(ToolKind::Search, "no search command configured")
                })?;
                let (_, stdout) = self.run_with_stdin(ToolKind::Search, cmd, query).await?;
                Ok(ToolResponse::Search {
                    results: stdout.lines().map(str::to_string).collect(),
                })
            }
            ToolRequest::SubagentExec {
                description,
                style_ref,
            } => {
                let prompt = match style_ref {
                    Some(style) => format!(
                        "{}\n\nFollow the styling contract in artifact '{}' (v{}).",
                        description, style.name, style.version
                    ),
                    None => description.clone(),
                };
                let (success, stdout) = self
                    .run_with_stdin(ToolKind::SubagentExec, &self.subagent_cmd, &prompt)
                    .await?;
                let diff_summary = stdout
                    .lines()
                    .rev()
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("")
                    .to_string();
                Ok(ToolResponse::SubagentExec {
                    success,
                    diff_summary,
                    output: stdout,
                })
            }
            ToolRequest::Deploy => {
                let (success, _) = self
                    .run_with_stdin(ToolKind::Deploy, &self.deploy_cmd, "")
                    .await?;
                Ok(ToolResponse::Deploy {
                    success,
                    url: self.production_url.clone(),
                })
            }
            ToolRequest::SanityCheck { url, timeout_secs } => {
                let output = Command::new("curl")
                    .args([
                        "-s",
                        "-o",
                        "/dev/null",
                        "-w",
                        "%{http_code}",
                        "--max-time",
                        &timeout_secs.to_string(),
                        url,
                    ])
                    .output()
                    .await
                    .map_err(|e| {
                        invocation_error(ToolKind::SanityCheck, format!("failed to run curl: {}", e))
                    })?;

                let code = String::from_utf8_lossy(&output.stdout)
                    .trim()
                    .parse::<u16>()
                    .unwrap_or(0);
                Ok(ToolResponse::SanityCheck {
                    success: (200..300).contains(&code),
                    http_status: code,
                })
            }
        }
    }

    fn name(&self) -> &str {
        "process"
    }
}
