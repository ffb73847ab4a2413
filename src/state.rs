//! Run state persistence.
//!
//! Everything the sequencer needs to resume a suspended or crashed run is
//! carried in one JSON document, saved after every state-changing step.
//! Suspension is data, not a coroutine: a different process can load this
//! file and continue.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clarify::ClarificationQueue;
use crate::error::{Error, Result};
use crate::phase::Phase;
use crate::task::TaskGraph;

/// Persistent state for one orchestrated run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// The raw idea the run started from.
    pub idea: String,
    /// Current phase.
    pub phase: Phase,
    /// The task graph (empty until WorkBreakdown).
    #[serde(default)]
    pub tasks: TaskGraph,
    /// Clarification requests raised so far.
    #[serde(default)]
    pub clarifications: ClarificationQueue,
    /// Phase-advance attempts made while the current clarification has been
    /// pending. Reset on resolution and on successful advance.
    #[serde(default)]
    pub advance_attempts: u32,
    /// Whether the mandatory post-InitialDeploy sanity check has passed.
    #[serde(default)]
    pub sanity_confirmed: bool,
    /// Re-deploy attempts made while that check kept failing.
    #[serde(default)]
    pub deploy_retries: u32,
    /// Whether the Launch phase's sanity check has passed.
    #[serde(default)]
    pub launched: bool,
    /// Production URL reported by the most recent successful deploy.
    #[serde(default)]
    pub production_url: Option<String>,
}

impl RunState {
    /// Creates a fresh run at the Idea phase.
    pub fn new(idea: impl Into<String>) -> Self {
        Self {
            idea: idea.into(),
            phase: Phase::Idea,
            tasks: TaskGraph::new(),
            clarifications: ClarificationQueue::new(),
            advance_attempts: 0,
            sanity_confirmed: false,
            deploy_retries: 0,
            launched: false,
            production_url: None,
        }
    }

    /// Path of the state file within a run directory.
    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join("run-state.json")
    }

    /// Saves the state to `<dir>/run-state.json`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::State(format!("failed to serialize run state: {}", e)))?;
        fs::write(Self::file_path(dir), json)?;
        Ok(())
    }

    /// Loads the state from `<dir>/run-state.json`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::file_path(dir);
        let raw = fs::read_to_string(&path)
            .map_err(|e| Error::State(format!("cannot read {}: {}", path.display(), e)))?;
        serde_json::from_str(&raw).map_err(|e| Error::State(format!("corrupt run state: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, TaskGraph, TaskStatus, FIRST_TASK_SUBJECT};
    use tempfile::TempDir;

    #[test]
    fn save_and_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut state = RunState::new("sell socks faster");
        state.phase = Phase::FeatureLoop;
        state.sanity_confirmed = true;
        state.production_url = Some("https://sock.example".to_string());
        state.tasks =
            TaskGraph::from_tasks(vec![Task::new("TASK-001", 0, FIRST_TASK_SUBJECT)]).unwrap();
        state.tasks.get_mut("TASK-001").unwrap().status = TaskStatus::Done;

        state.save(dir.path()).unwrap();
        let loaded = RunState::load(dir.path()).unwrap();

        assert_eq!(loaded.idea, "sell socks faster");
        assert_eq!(loaded.phase, Phase::FeatureLoop);
        assert!(loaded.sanity_confirmed);
        assert_eq!(
            loaded.tasks.get("TASK-001").unwrap().status,
            TaskStatus::Done
        );
    }

    #[test]
    fn load_missing_file_is_a_state_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(RunState::load(dir.path()), Err(Error::State(_))));
    }

    #[test]
    fn suspended_state_survives_the_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut state = RunState::new("idea");
        let id = state
            .clarifications
            .raise(Phase::Definition, None, "what price point?");
        state.advance_attempts = 2;

        state.save(dir.path()).unwrap();
        let loaded = RunState::load(dir.path()).unwrap();

        assert_eq!(loaded.clarifications.pending().unwrap().id, id);
        assert_eq!(loaded.advance_attempts, 2);
    }
}
