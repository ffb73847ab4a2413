//! PhaseSequencer: the state machine driving a launch run.
//!
//! One logical thread of control: the sequencer processes one phase
//! transition or one task sub-cycle at a time, awaiting every tool call to
//! completion. Deploys and verifications stay strictly ordered, which is
//! what makes the definition-of-done guarantees hold.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use crate::artifact::{names, ArtifactStore};
use crate::bridge::{invocation_error, ToolBridge, ToolKind, ToolLog, ToolRequest, ToolResponse};
use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::phase::Phase;
use crate::state::RunState;
use crate::task::{parse_task_list, render_task_list, TaskStatus, FIRST_TASK_SUBJECT};
use crate::verify::{GateOutcome, VerificationGate};

/// Reason a phase transition is blocked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// An artifact the transition depends on does not exist yet.
    MissingArtifact { phase: Phase, artifact: String },
    /// The task graph slice for the phase is not terminal.
    TasksNotTerminal { phase: Phase, remaining: usize },
    /// The mandatory post-deploy sanity check did not pass.
    SanityCheckFailed { url: String },
    /// An unresolved clarification freezes the run.
    AwaitingClarification { id: String },
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::MissingArtifact { phase, artifact } => {
                write!(f, "phase {} is missing artifact '{}'", phase.name(), artifact)
            }
            BlockReason::TasksNotTerminal { phase, remaining } => {
                write!(f, "phase {} has {} unfinished tasks", phase.name(), remaining)
            }
            BlockReason::SanityCheckFailed { url } => {
                write!(f, "sanity check against {} did not pass", url)
            }
            BlockReason::AwaitingClarification { id } => {
                write!(f, "clarification {} is unresolved", id)
            }
        }
    }
}

/// Result of an advance attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Moved into the given phase.
    Entered(Phase),
    /// The transition is blocked; nothing changed except bookkeeping.
    Blocked(BlockReason),
    /// Marketing is complete; there is no next phase.
    Finished,
}

/// Progress events for observers. Observers read; they never mutate.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// The sequencer entered a phase.
    PhaseEntered { phase: Phase },
    /// A task changed status.
    TaskStatus { task_id: String, status: TaskStatus },
    /// The run suspended on a clarification.
    Suspended { clarification_id: String },
}

/// Terminal outcome of driving a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every phase completed and the launch sanity check passed.
    Launched,
    /// The run is frozen on an unresolved clarification.
    Suspended { clarification_id: String },
    /// A clarification stayed unresolved past the advance-attempt budget.
    Aborted {
        clarification_id: String,
        attempts: u32,
    },
}

/// Top-level state machine for the twelve phases.
pub struct PhaseSequencer {
    state: RunState,
    store: ArtifactStore,
    bridge: ToolBridge,
    gate: VerificationGate,
    config: OrchestratorConfig,
    state_dir: Option<PathBuf>,
    events: Option<mpsc::UnboundedSender<RunEvent>>,
}

impl PhaseSequencer {
    /// Creates a fresh run from an idea, starting at the Idea phase.
    pub fn new(idea: impl Into<String>, bridge: ToolBridge) -> Self {
        let config = OrchestratorConfig::default();
        Self {
            state: RunState::new(idea),
            store: ArtifactStore::new(),
            gate: VerificationGate::new(&config),
            bridge,
            config,
            state_dir: None,
            events: None,
        }
    }

    /// Builds a sequencer from explicit parts (resume, tests).
    pub fn from_parts(
        state: RunState,
        store: ArtifactStore,
        bridge: ToolBridge,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            gate: VerificationGate::new(&config),
            state,
            store,
            bridge,
            config,
            state_dir: None,
            events: None,
        }
    }

    /// Resumes a run persisted in the given directory.
    pub fn resume(dir: &Path, bridge: ToolBridge, config: OrchestratorConfig) -> Result<Self> {
        let state = RunState::load(dir)?;
        let store = ArtifactStore::open(dir.join("artifacts"))?;
        tracing::info!(phase = %state.phase.name(), "resuming run");
        Ok(Self::from_parts(state, store, bridge, config).with_state_dir(dir.to_path_buf()))
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.gate = VerificationGate::new(&config);
        self.config = config;
        self
    }

    /// Persists run state (and artifacts) under the given directory.
    pub fn with_state_dir(mut self, dir: PathBuf) -> Self {
        self.store = std::mem::take(&mut self.store).with_dir(dir.join("artifacts"));
        self.state_dir = Some(dir);
        self
    }

    /// Attaches an observer channel for progress events.
    pub fn with_events(mut self, tx: mpsc::UnboundedSender<RunEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Read-only view of the run state.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Read-only view of the artifact store.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// The append-only tool call log.
    pub fn tool_log(&self) -> &ToolLog {
        self.bridge.log()
    }

    /// Drives the run until it launches, suspends, or aborts.
    ///
    /// Failures the loop cannot recover locally (missing inputs, tool
    /// errors, unparseable task lists) become clarification requests; the
    /// run halts cleanly with all state preserved.
    pub async fn run(&mut self) -> Result<RunOutcome> {
        loop {
            if let Some(pending) = self.state.clarifications.pending() {
                let clarification_id = pending.id.clone();
                self.state.advance_attempts += 1;
                self.save()?;
                if self.state.advance_attempts > self.config.max_advance_attempts {
                    tracing::error!(
                        clarification_id = %clarification_id,
                        attempts = self.state.advance_attempts,
                        "aborting run: clarification unresolved past budget"
                    );
                    return Ok(RunOutcome::Aborted {
                        clarification_id,
                        attempts: self.state.advance_attempts,
                    });
                }
                return Ok(RunOutcome::Suspended { clarification_id });
            }

            if let Err(e) = self.run_phase().await {
                match e {
                    Error::AwaitingClarification(_) => continue,
                    Error::BlockedPrecondition(_)
                    | Error::ToolInvocation { .. }
                    | Error::TaskList(_) => {
                        let phase = self.state.phase;
                        let question =
                            format!("Cannot continue: {}. How should the run proceed?", e);
                        let id = self.state.clarifications.raise(phase, None, question);
                        self.emit(RunEvent::Suspended {
                            clarification_id: id,
                        });
                        self.save()?;
                        continue;
                    }
                    other => return Err(other),
                }
            }

            if self.state.clarifications.has_pending() {
                continue;
            }

            match self.advance().await? {
                Advance::Entered(_) | Advance::Blocked(_) => continue,
                Advance::Finished => return Ok(RunOutcome::Launched),
            }
        }
    }

    /// Attempts to move from the current phase to the next.
    ///
    /// Idempotent while blocked: with no intervening state change, repeated
    /// calls report the same reason.
    pub async fn advance(&mut self) -> Result<Advance> {
        if let Some(pending) = self.state.clarifications.pending() {
            let id = pending.id.clone();
            self.state.advance_attempts += 1;
            self.save()?;
            return Ok(Advance::Blocked(BlockReason::AwaitingClarification { id }));
        }

        let phase = self.state.phase;

        if let Some(artifact) = phase
            .produced_artifacts()
            .iter()
            .find(|a| !self.store.contains(a))
        {
            return Ok(Advance::Blocked(BlockReason::MissingArtifact {
                phase,
                artifact: artifact.to_string(),
            }));
        }

        if phase.gates_on_tasks() {
            if let Some(reason) = self.task_gate_block(phase) {
                return Ok(Advance::Blocked(reason));
            }
        }

        // Verify the pipes are clean before adding complexity: FeatureLoop
        // is not enterable until a live probe of the hello-world deploy
        // passes. A failed probe forces a retry of InitialDeploy.
        if phase == Phase::InitialDeploy && !self.state.sanity_confirmed {
            let url = self.production_url()?;
            let response = self
                .bridge
                .invoke(ToolRequest::SanityCheck {
                    url: url.clone(),
                    timeout_secs: self.config.sanity.timeout_secs,
                })
                .await?;
            if response.succeeded() {
                self.state.sanity_confirmed = true;
                self.save()?;
            } else {
                tracing::warn!(url = %url, "initial deploy sanity check failed, retrying deploy");
                return Ok(Advance::Blocked(BlockReason::SanityCheckFailed { url }));
            }
        }

        if phase == Phase::Launch && !self.state.launched {
            let url = self.production_url()?;
            return Ok(Advance::Blocked(BlockReason::SanityCheckFailed { url }));
        }

        let Some(next) = phase.next() else {
            return Ok(Advance::Finished);
        };

        if let Some(artifact) = next
            .required_artifacts()
            .iter()
            .find(|a| !self.store.contains(a))
        {
            return Ok(Advance::Blocked(BlockReason::MissingArtifact {
                phase: next,
                artifact: artifact.to_string(),
            }));
        }

        self.state.phase = next;
        self.state.advance_attempts = 0;
        self.save()?;
        tracing::info!(from = %phase.name(), to = %next.name(), "phase transition");
        self.emit(RunEvent::PhaseEntered { phase: next });
        Ok(Advance::Entered(next))
    }

    /// Resolves a clarification, unfreezing whatever raised it.
    pub fn resolve_clarification(&mut self, id: &str, answer: &str) -> Result<()> {
        self.state.clarifications.resolve(id, answer)?;
        self.state.tasks.unfreeze(id, answer);
        self.state.advance_attempts = 0;
        self.save()
    }

    /// Executes the work of the current phase.
    pub async fn run_phase(&mut self) -> Result<()> {
        if let Some(pending) = self.state.clarifications.pending() {
            return Err(Error::AwaitingClarification(pending.id.clone()));
        }

        let phase = self.state.phase;
        for required in phase.required_artifacts() {
            // fail closed before any tool runs against missing inputs
            self.store.reference(required)?;
        }

        match phase {
            Phase::Idea => self.run_idea(),
            Phase::Brainstorm => self.run_brainstorm().await,
            Phase::Definition => self.run_definition().await,
            Phase::StackSelection => self.run_stack_selection().await,
            Phase::Design => self.run_design().await,
            Phase::WorkBreakdown => self.run_work_breakdown().await,
            Phase::InitialDeploy => self.run_initial_deploy().await,
            Phase::FeatureLoop => self.run_feature_loop().await,
            Phase::Content => self.run_content().await,
            Phase::IntegrationTest => self.run_integration_test().await,
            Phase::Launch => self.run_launch().await,
            Phase::Marketing => self.run_marketing().await,
        }
    }

    fn run_idea(&mut self) -> Result<()> {
        if self.store.contains(names::IDEA_BRIEF) {
            return Ok(());
        }
        if self.state.idea.trim().is_empty() {
            let id = self
                .state
                .clarifications
                .raise(Phase::Idea, None, "What is the product idea?");
            self.emit(RunEvent::Suspended {
                clarification_id: id,
            });
            return self.save();
        }
        let content = format!("# Idea Brief\n\n{}\n", self.state.idea.trim());
        self.store.write(names::IDEA_BRIEF, content, Phase::Idea)?;
        Ok(())
    }

    async fn run_brainstorm(&mut self) -> Result<()> {
        if self.store.contains(names::BRAINSTORM_NOTES) {
            return Ok(());
        }
        let topic = self.state.idea.lines().next().unwrap_or("").to_string();
        let mut notes = String::from("# Brainstorm Notes\n");
        for query in [
            format!("{} existing products and competitors", topic),
            format!("{} pricing models", topic),
        ] {
            let response = self
                .bridge
                .invoke(ToolRequest::Search {
                    query: query.clone(),
                })
                .await?;
            if let ToolResponse::Search { results } = response {
                notes.push_str(&format!("\n## {}\n\n", query));
                for result in results {
                    notes.push_str(&format!("- {}\n", result));
                }
            }
        }
        self.store
            .write(names::BRAINSTORM_NOTES, notes, Phase::Brainstorm)?;
        Ok(())
    }

    async fn run_definition(&mut self) -> Result<()> {
        if !self.store.contains(names::PRODUCT_DEFINITION) {
            let prompt = definition_prompt(
                &self.state.idea,
                &self.artifact_content(names::BRAINSTORM_NOTES),
            );
            self.author_artifact(names::PRODUCT_DEFINITION, prompt).await?;
        }
        self.store.validate_product_definition()
    }

    async fn run_stack_selection(&mut self) -> Result<()> {
        if self.store.contains(names::STACK_SELECTION) {
            return Ok(());
        }
        let prompt = stack_prompt(&self.artifact_content(names::PRODUCT_DEFINITION));
        self.author_artifact(names::STACK_SELECTION, prompt).await
    }

    async fn run_design(&mut self) -> Result<()> {
        if self.store.contains(names::DESIGN_GUIDELINES) {
            return Ok(());
        }
        let prompt = design_prompt(&self.artifact_content(names::PRODUCT_DEFINITION));
        self.author_artifact(names::DESIGN_GUIDELINES, prompt).await
    }

    async fn run_work_breakdown(&mut self) -> Result<()> {
        if !self.state.tasks.tasks().is_empty() {
            return Ok(());
        }
        let prompt = breakdown_prompt(
            &self.artifact_content(names::PRODUCT_DEFINITION),
            &self.artifact_content(names::STACK_SELECTION),
        );
        let output = self.subagent_output(prompt).await?;
        let graph = parse_task_list(&output)?;
        tracing::info!(task_count = graph.tasks().len(), "work breakdown produced tasks");
        self.store.write(
            names::TASK_LIST,
            render_task_list(&graph),
            Phase::WorkBreakdown,
        )?;
        self.state.tasks = graph;
        self.save()
    }

    async fn run_initial_deploy(&mut self) -> Result<()> {
        let first_id = self
            .state
            .tasks
            .tasks()
            .first()
            .map(|t| t.id.clone())
            .ok_or_else(|| Error::BlockedPrecondition("task graph is empty".to_string()))?;

        let first_done = self.state.tasks.get(&first_id).map(|t| t.status) == Some(TaskStatus::Done);
        if !first_done {
            if self.state.tasks.next_eligible(self.config.feature_loop.max_verify_retries)
                == Some(first_id.clone())
            {
                self.run_task_cycle(&first_id).await?;
            }
            return Ok(());
        }

        // Hello world is deployed but the pipe-clean probe keeps failing:
        // redeploy within the retry budget, then hand the decision over.
        if !self.state.sanity_confirmed {
            if self.state.deploy_retries >= self.config.feature_loop.max_verify_retries {
                let url = self.production_url()?;
                let id = self.state.clarifications.raise(
                    Phase::InitialDeploy,
                    Some(first_id),
                    format!(
                        "The hello-world deploy is up but {} keeps failing its sanity check. \
                         What should change before continuing?",
                        url
                    ),
                );
                self.emit(RunEvent::Suspended {
                    clarification_id: id,
                });
                return self.save();
            }
            self.state.deploy_retries += 1;
            self.save()?;
            let response = self.bridge.invoke(ToolRequest::Deploy).await?;
            if let ToolResponse::Deploy { success: true, url } = response {
                self.state.production_url = Some(url);
                self.save()?;
            }
        }
        Ok(())
    }

    async fn run_feature_loop(&mut self) -> Result<()> {
        loop {
            if self.state.clarifications.has_pending() {
                return Ok(());
            }
            let eligible = self
                .state
                .tasks
                .next_eligible(self.config.feature_loop.max_verify_retries);
            match eligible {
                Some(task_id) => self.run_task_cycle(&task_id).await?,
                None => return Ok(()),
            }
        }
    }

    async fn run_content(&mut self) -> Result<()> {
        if self.store.contains(names::CONTENT_COPY) {
            return Ok(());
        }
        let prompt = content_prompt(&self.artifact_content(names::PRODUCT_DEFINITION));
        self.author_artifact(names::CONTENT_COPY, prompt).await
    }

    async fn run_integration_test(&mut self) -> Result<()> {
        let url = self.production_url()?;
        let prompt = integration_prompt(&self.artifact_content(names::PRODUCT_DEFINITION), &url);
        let response = self
            .bridge
            .invoke(ToolRequest::SubagentExec {
                description: prompt,
                style_ref: None,
            })
            .await?;

        let probe = self
            .bridge
            .invoke(ToolRequest::SanityCheck {
                url: url.clone(),
                timeout_secs: self.config.sanity.timeout_secs,
            })
            .await?;

        if response.succeeded() && probe.succeeded() {
            return Ok(());
        }
        let id = self.state.clarifications.raise(
            Phase::IntegrationTest,
            None,
            format!(
                "End-to-end test against {} failed (flows ok: {}, probe ok: {}). \
                 Which flow should be fixed first?",
                url,
                response.succeeded(),
                probe.succeeded()
            ),
        );
        self.emit(RunEvent::Suspended {
            clarification_id: id,
        });
        self.save()
    }

    async fn run_launch(&mut self) -> Result<()> {
        if self.state.launched {
            return Ok(());
        }
        let deploy = self.bridge.invoke(ToolRequest::Deploy).await?;
        let url = match deploy {
            ToolResponse::Deploy { success: true, url } => {
                self.state.production_url = Some(url.clone());
                url
            }
            _ => {
                return Err(invocation_error(
                    ToolKind::Deploy,
                    "launch deploy reported failure",
                ))
            }
        };

        let probe = self
            .bridge
            .invoke(ToolRequest::SanityCheck {
                url: url.clone(),
                timeout_secs: self.config.sanity.timeout_secs,
            })
            .await?;
        if probe.succeeded() {
            self.state.launched = true;
            tracing::info!(url = %url, "launched");
            return self.save();
        }

        let id = self.state.clarifications.raise(
            Phase::Launch,
            None,
            format!("Launch sanity check against {} failed. Roll back or fix forward?", url),
        );
        self.emit(RunEvent::Suspended {
            clarification_id: id,
        });
        self.save()
    }

    async fn run_marketing(&mut self) -> Result<()> {
        if self.store.contains(names::MARKETING_ASSETS) {
            return Ok(());
        }
        let url = self.production_url()?;
        let prompt = marketing_prompt(&self.artifact_content(names::PRODUCT_DEFINITION), &url);
        self.author_artifact(names::MARKETING_ASSETS, prompt).await
    }

    /// One Implement → Verify → Deploy → MarkDone sub-cycle.
    ///
    /// Any failure inside the cycle becomes task bookkeeping (retry or
    /// escalation); only the fail-closed styling precondition surfaces as an
    /// error, because no state has changed yet at that point.
    async fn run_task_cycle(&mut self, task_id: &str) -> Result<()> {
        let (_, in_progress, _, _) = self.state.tasks.counts();
        if in_progress > 0 {
            return Err(Error::State(
                "another task is already in progress".to_string(),
            ));
        }

        // Styling contract travels by reference so later tasks observe
        // artifact updates. Absent guidelines block the dispatch outright.
        let style_ref = self.store.reference(names::DESIGN_GUIDELINES)?;

        let description = {
            let task = self
                .state
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| Error::State(format!("unknown task {}", task_id)))?;
            task.status = TaskStatus::InProgress;
            task.started_at = Some(now_secs());
            task.error = None;
            task.description.clone()
        };
        self.emit_task(task_id, TaskStatus::InProgress);
        self.save()?;
        tracing::info!(task_id = %task_id, "task started");

        let exec = self
            .bridge
            .invoke(ToolRequest::SubagentExec {
                description,
                style_ref: Some(style_ref),
            })
            .await;
        match exec {
            Ok(response) if response.succeeded() => {
                self.set_task_status(task_id, TaskStatus::AwaitingVerification)?;
            }
            Ok(_) => {
                return self.record_failure(task_id, "subagent reported failure");
            }
            Err(e) => {
                return self.record_failure(task_id, &format!("subagent invocation failed: {}", e));
            }
        }

        let task = self
            .state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| Error::State(format!("unknown task {}", task_id)))?;
        match self.gate.evaluate(&task, &mut self.bridge).await {
            Ok(GateOutcome::Pass) => {
                self.set_task_status(task_id, TaskStatus::Verified)?;
            }
            Ok(GateOutcome::Fail(failed)) => {
                return self
                    .record_failure(task_id, &format!("failed checks: {}", failed.join("; ")));
            }
            Err(e) => {
                return self.record_failure(task_id, &format!("verification errored: {}", e));
            }
        }

        // Done requires verification AND a successful deploy of this change.
        match self.bridge.invoke(ToolRequest::Deploy).await {
            Ok(ToolResponse::Deploy { success: true, url }) => {
                self.state.production_url = Some(url);
                let task = self
                    .state
                    .tasks
                    .get_mut(task_id)
                    .ok_or_else(|| Error::State(format!("unknown task {}", task_id)))?;
                task.status = TaskStatus::Done;
                task.finished_at = Some(now_secs());
                self.emit_task(task_id, TaskStatus::Done);
                self.save()?;
                tracing::info!(task_id = %task_id, "task done");
                Ok(())
            }
            Ok(_) => self.record_failure(task_id, "deploy reported failure"),
            Err(e) => self.record_failure(task_id, &format!("deploy invocation failed: {}", e)),
        }
    }

    /// Books a failed attempt; escalates to a clarification once the retry
    /// budget is spent. The task stays Failed either way.
    fn record_failure(&mut self, task_id: &str, reason: &str) -> Result<()> {
        let phase = self.state.phase;
        let retries = {
            let task = self
                .state
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| Error::State(format!("unknown task {}", task_id)))?;
            task.status = TaskStatus::Failed;
            task.retries += 1;
            task.error = Some(reason.to_string());
            task.retries
        };
        self.emit_task(task_id, TaskStatus::Failed);
        tracing::warn!(task_id = %task_id, retries, reason = %reason, "task attempt failed");

        if retries >= self.config.feature_loop.max_verify_retries {
            let question = format!(
                "Task {} failed {} attempts (last failure: {}). How should it be adjusted?",
                task_id, retries, reason
            );
            let id = self
                .state
                .clarifications
                .raise(phase, Some(task_id.to_string()), question);
            if let Some(task) = self.state.tasks.get_mut(task_id) {
                task.clarification_id = Some(id.clone());
            }
            self.emit(RunEvent::Suspended {
                clarification_id: id,
            });
        }
        self.save()
    }

    fn set_task_status(&mut self, task_id: &str, status: TaskStatus) -> Result<()> {
        if let Some(task) = self.state.tasks.get_mut(task_id) {
            task.status = status;
        }
        self.emit_task(task_id, status);
        self.save()
    }

    fn task_gate_block(&self, phase: Phase) -> Option<BlockReason> {
        let tasks = self.state.tasks.tasks();
        match phase {
            Phase::WorkBreakdown => tasks.is_empty().then_some(BlockReason::TasksNotTerminal {
                phase,
                remaining: 0,
            }),
            Phase::InitialDeploy => {
                let first_done = tasks.first().map(|t| t.status) == Some(TaskStatus::Done);
                (!first_done).then_some(BlockReason::TasksNotTerminal { phase, remaining: 1 })
            }
            Phase::FeatureLoop => {
                let remaining = tasks.iter().filter(|t| t.status != TaskStatus::Done).count();
                (remaining > 0).then_some(BlockReason::TasksNotTerminal { phase, remaining })
            }
            _ => None,
        }
    }

    async fn author_artifact(&mut self, name: &'static str, prompt: String) -> Result<()> {
        let output = self.subagent_output(prompt).await?;
        let phase = self.state.phase;
        self.store.write(name, output, phase)?;
        Ok(())
    }

    async fn subagent_output(&mut self, prompt: String) -> Result<String> {
        let response = self
            .bridge
            .invoke(ToolRequest::SubagentExec {
                description: prompt,
                style_ref: None,
            })
            .await?;
        match response {
            ToolResponse::SubagentExec {
                success: true,
                output,
                ..
            } => Ok(output),
            ToolResponse::SubagentExec { success: false, .. } => Err(invocation_error(
                ToolKind::SubagentExec,
                "subagent reported failure",
            )),
            _ => Err(invocation_error(
                ToolKind::SubagentExec,
                "unexpected response kind",
            )),
        }
    }

    fn artifact_content(&self, name: &str) -> String {
        self.store
            .get(name)
            .map(|a| a.content.clone())
            .unwrap_or_default()
    }

    fn production_url(&self) -> Result<String> {
        self.state
            .production_url
            .clone()
            .ok_or_else(|| Error::BlockedPrecondition("no production deployment recorded".into()))
    }

    fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    fn emit_task(&self, task_id: &str, status: TaskStatus) {
        self.emit(RunEvent::TaskStatus {
            task_id: task_id.to_string(),
            status,
        });
    }

    fn save(&self) -> Result<()> {
        if let Some(dir) = &self.state_dir {
            self.state.save(dir)?;
        }
        Ok(())
    }
}

fn definition_prompt(idea: &str, brainstorm_notes: &str) -> String {
    format!(
        "Write a product definition document in markdown for this idea:\n\n{}\n\n\
         Research notes:\n{}\n\n\
         The document must contain these sections: Name, Description, \
         Value Proposition, Key Features, Target Audience, User Flows.",
        idea, brainstorm_notes
    )
}

fn stack_prompt(product_definition: &str) -> String {
    format!(
        "Choose the simplest stack that can ship this product today, including \
         hosting and a payment provider. Explain each choice in one line.\n\n{}",
        product_definition
    )
}

fn design_prompt(product_definition: &str) -> String {
    format!(
        "Write design guidelines for this product: palette, typography, spacing, \
         component conventions. Keep it short enough to paste into every task.\n\n{}",
        product_definition
    )
}

fn breakdown_prompt(product_definition: &str, stack: &str) -> String {
    format!(
        "Break this product into an ordered task list in markdown. \
         Entry 1 must be exactly: \"{}\". Each entry needs `- verify:` lines \
         with concrete checks (prefer `GET <url> returns <status>`). \
         Every task must be small enough to deploy on its own.\n\n\
         Product definition:\n{}\n\nStack:\n{}",
        FIRST_TASK_SUBJECT, product_definition, stack
    )
}

fn content_prompt(product_definition: &str) -> String {
    format!(
        "Write the website copy for this product: landing page, pricing page, \
         terms of service and privacy policy.\n\n{}",
        product_definition
    )
}

fn integration_prompt(product_definition: &str, url: &str) -> String {
    format!(
        "Walk through every user flow of the product definition against {} \
         including the payment flow in test mode. Exit successfully only if \
         all flows work.\n\n{}",
        url, product_definition
    )
}

fn marketing_prompt(product_definition: &str, url: &str) -> String {
    format!(
        "Write launch marketing assets for {}: a launch tweet thread, a \
         Show HN post, and a short announcement email.\n\n{}",
        url, product_definition
    )
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
    use crate::bridge::ScriptedToolExecutor;

    fn sequencer() -> PhaseSequencer {
        PhaseSequencer::new(
            "Sell socks, but faster",
            ToolBridge::new(Box::new(ScriptedToolExecutor::new())),
        )
    }

    #[tokio::test]
    async fn advance_is_blocked_until_artifact_exists() {
        let mut seq = sequencer();

        let blocked = seq.advance().await.unwrap();
        assert_eq!(
            blocked,
            Advance::Blocked(BlockReason::MissingArtifact {
                phase: Phase::Idea,
                artifact: names::IDEA_BRIEF.to_string(),
            })
        );

        // Same reason on repeat, nothing changed.
        assert_eq!(seq.advance().await.unwrap(), blocked);

        seq.run_phase().await.unwrap();
        assert_eq!(seq.advance().await.unwrap(), Advance::Entered(Phase::Brainstorm));
    }

    #[tokio::test]
    async fn empty_idea_suspends_instead_of_guessing() {
        let mut seq = PhaseSequencer::new(
            "   ",
            ToolBridge::new(Box::new(ScriptedToolExecutor::new())),
        );
        seq.run_phase().await.unwrap();
        assert!(seq.state().clarifications.has_pending());

        // Frozen: executing the phase again is refused.
        let err = seq.run_phase().await.unwrap_err();
        assert!(matches!(err, Error::AwaitingClarification(_)));
    }

    #[tokio::test]
    async fn idea_phase_writes_brief_once() {
        let mut seq = sequencer();
        seq.run_phase().await.unwrap();
        seq.run_phase().await.unwrap();

        let brief = seq.store().get(names::IDEA_BRIEF).unwrap();
        assert_eq!(brief.version, 1);
        assert!(brief.content.contains("Sell socks"));
    }

    #[tokio::test]
    async fn brainstorm_collects_search_results() {
        let mut seq = sequencer();
        seq.run_phase().await.unwrap();
        seq.advance().await.unwrap();
        seq.run_phase().await.unwrap();

        let notes = seq.store().get(names::BRAINSTORM_NOTES).unwrap();
        assert!(notes.content.contains("competitors"));
        assert_eq!(seq.tool_log().calls_of_kind(ToolKind::Search).len(), 2);
    }

    #[tokio::test]
    async fn run_aborts_after_advance_attempt_budget() {
        let mut seq = sequencer().with_config(
            OrchestratorConfig::default().with_max_advance_attempts(2),
        );
        seq.state
            .clarifications
            .raise(Phase::Idea, None, "what idea?");

        assert!(matches!(
            seq.run().await.unwrap(),
            RunOutcome::Suspended { .. }
        ));
        assert!(matches!(
            seq.run().await.unwrap(),
            RunOutcome::Suspended { .. }
        ));
        assert!(matches!(
            seq.run().await.unwrap(),
            RunOutcome::Aborted { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn resolving_clarification_resets_attempt_counter() {
        let mut seq = sequencer();
        let id = seq
            .state
            .clarifications
            .raise(Phase::Idea, None, "what idea?");
        assert!(matches!(
            seq.run().await.unwrap(),
            RunOutcome::Suspended { .. }
        ));

        seq.resolve_clarification(&id, "socks").unwrap();
        assert_eq!(seq.state().advance_attempts, 0);
        assert!(!seq.state().clarifications.has_pending());
    }
}
