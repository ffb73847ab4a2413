//! Task representation and the ordered task graph.
//!
//! Tasks are created during WorkBreakdown and mutated only by the feature
//! loop. The graph hands out at most one eligible task at a time, strictly in
//! ordinal order, so every deploy corresponds to exactly one verified change.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::verify::Condition;

/// The literal subject of the mandatory first task.
pub const FIRST_TASK_SUBJECT: &str =
    "Initialize project and deploy 'Hello World' to production";

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is waiting to be started.
    #[default]
    Pending,
    /// Task is currently being executed by the subagent.
    InProgress,
    /// Subagent finished; definition-of-done not yet evaluated.
    AwaitingVerification,
    /// All definition-of-done conditions passed.
    Verified,
    /// Verification or deploy failed.
    Failed,
    /// Verified and deployed. Terminal.
    Done,
}

/// A unit of work with an explicit definition of done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier (e.g. "TASK-001").
    pub id: String,
    /// Position in the original ordering. Never changed by deferral.
    pub ordinal: u32,
    /// What to build.
    pub description: String,
    /// Conditions that must all hold for the task to be considered done.
    pub verification: Vec<Condition>,
    /// Current status.
    #[serde(default)]
    pub status: TaskStatus,
    /// Verification attempts so far.
    #[serde(default)]
    pub retries: u32,
    /// Deferred tasks run after all non-deferred tasks.
    #[serde(default)]
    pub deferred: bool,
    /// Pending clarification request id, if escalated.
    #[serde(default)]
    pub clarification_id: Option<String>,
    /// Unix-epoch seconds when moved to InProgress.
    #[serde(default)]
    pub started_at: Option<u64>,
    /// Unix-epoch seconds when reaching Done.
    #[serde(default)]
    pub finished_at: Option<u64>,
    /// Last failure detail, if any.
    #[serde(default)]
    pub error: Option<String>,
}

impl Task {
    /// Creates a new pending task.
    pub fn new(id: impl Into<String>, ordinal: u32, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ordinal,
            description: description.into(),
            verification: Vec::new(),
            status: TaskStatus::Pending,
            retries: 0,
            deferred: false,
            clarification_id: None,
            started_at: None,
            finished_at: None,
            error: None,
        }
    }

    /// Adds a verification condition.
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.verification.push(condition);
        self
    }

    /// Marks the task deferred.
    pub fn with_deferred(mut self, deferred: bool) -> Self {
        self.deferred = deferred;
        self
    }

    /// Whether the task can be handed to the loop right now.
    ///
    /// Failed tasks stay runnable while retries remain; once escalated they
    /// are frozen until the clarification resolves.
    pub fn is_runnable(&self, max_retries: u32) -> bool {
        match self.status {
            TaskStatus::Pending => true,
            TaskStatus::Failed => self.clarification_id.is_none() && self.retries < max_retries,
            _ => false,
        }
    }
}

/// Ordered collection of tasks for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskGraph {
    tasks: Vec<Task>,
}

impl TaskGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from tasks, validating the first-task rule.
    pub fn from_tasks(tasks: Vec<Task>) -> Result<Self> {
        let first = tasks
            .first()
            .ok_or_else(|| Error::TaskList("task list is empty".to_string()))?;
        if !first.description.starts_with("Initialize project and deploy") {
            return Err(Error::TaskList(format!(
                "first task must be '{}', got '{}'",
                FIRST_TASK_SUBJECT, first.description
            )));
        }
        for task in &tasks {
            if task.description.trim().is_empty() {
                return Err(Error::TaskList(format!("task {} has no description", task.id)));
            }
        }
        Ok(Self { tasks })
    }

    /// All tasks in ordinal order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Looks up a task by id.
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Looks up a task mutably by id.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    /// Execution order: ordinal order with deferred tasks moved to the end.
    /// Ordinals themselves are untouched by deferral.
    fn execution_order(&self) -> Vec<&Task> {
        let mut order: Vec<&Task> = self.tasks.iter().filter(|t| !t.deferred).collect();
        order.extend(self.tasks.iter().filter(|t| t.deferred));
        order
    }

    /// Returns the id of the next task the loop should run.
    ///
    /// Tasks execute strictly in execution order: the first not-Done task is
    /// the only candidate. Returns None when all tasks are Done, or when the
    /// next task is frozen awaiting clarification (or mid-flight), which the
    /// caller distinguishes via task status.
    pub fn next_eligible(&self, max_retries: u32) -> Option<String> {
        let next = self.execution_order().into_iter().find(|t| t.status != TaskStatus::Done)?;
        next.is_runnable(max_retries).then(|| next.id.clone())
    }

    /// True when every task has reached Done.
    pub fn is_terminal(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Done)
    }

    /// True when any task is frozen on an unresolved clarification.
    pub fn has_frozen_task(&self) -> bool {
        self.tasks.iter().any(|t| t.clarification_id.is_some())
    }

    /// Marks a task deferred; it keeps its ordinal but runs last.
    ///
    /// The initial deploy task can never be deferred: every other task must
    /// come after it.
    pub fn defer(&mut self, id: &str) -> Result<()> {
        if self.tasks.first().map(|t| t.id.as_str()) == Some(id) {
            return Err(Error::TaskList(
                "the initial deploy task cannot be deferred".to_string(),
            ));
        }
        let task = self
            .get_mut(id)
            .ok_or_else(|| Error::TaskList(format!("unknown task {}", id)))?;
        task.deferred = true;
        Ok(())
    }

    /// Clears the clarification freeze on a task and resets its retry budget.
    pub fn unfreeze(&mut self, clarification_id: &str, guidance: &str) {
        for task in &mut self.tasks {
            if task.clarification_id.as_deref() == Some(clarification_id) {
                task.clarification_id = None;
                task.retries = 0;
                task.description = format!("{}\n\nClarification: {}", task.description, guidance);
            }
        }
    }

    /// Counts of (pending, in_progress, failed, done).
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let count = |s: TaskStatus| self.tasks.iter().filter(|t| t.status == s).count();
        (
            count(TaskStatus::Pending),
            count(TaskStatus::InProgress),
            count(TaskStatus::Failed),
            count(TaskStatus::Done),
        )
    }
}

/// Parses a `task.md` document into a task graph.
///
/// Expected shape: an ordered list where each entry is a task description,
/// followed by indented `- verify:` lines carrying its definition of done.
///
/// ```text
/// 1. Initialize project and deploy 'Hello World' to production
///    - verify: GET https://example.com/ returns 200
/// 2. Build login form
///    - verify: run `./scripts/check_login.sh`
/// ```
pub fn parse_task_list(input: &str) -> Result<TaskGraph> {
    let mut tasks: Vec<Task> = Vec::new();

    for line in input.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(description) = strip_ordinal(trimmed) {
            let ordinal = tasks.len() as u32;
            tasks.push(Task::new(
                format!("TASK-{:03}", ordinal + 1),
                ordinal,
                description,
            ));
        } else if let Some(check) = trimmed
            .strip_prefix("- verify:")
            .or_else(|| trimmed.strip_prefix("* verify:"))
        {
            let task = tasks.last_mut().ok_or_else(|| {
                Error::TaskList("verification step before any task entry".to_string())
            })?;
            task.verification.push(Condition::parse(check.trim()));
        }
    }

    TaskGraph::from_tasks(tasks)
}

/// Renders a task graph back to its `task.md` form.
pub fn render_task_list(graph: &TaskGraph) -> String {
    let mut md = String::from("# Task List\n\n");
    for (i, task) in graph.tasks().iter().enumerate() {
        md.push_str(&format!("{}. {}\n", i + 1, task.description.lines().next().unwrap_or("")));
        for condition in &task.verification {
            md.push_str(&format!("   - verify: {}\n", condition.render()));
        }
    }
    md
}

/// Strips a leading "N." ordinal marker, returning the description.
fn strip_ordinal(line: &str) -> Option<&str> {
    let dot = line.find('.')?;
    let (head, tail) = line.split_at(dot);
    if !head.is_empty() && head.chars().all(|c| c.is_ascii_digit()) {
        Some(tail[1..].trim())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello_world_task() -> Task {
        Task::new("TASK-001", 0, FIRST_TASK_SUBJECT)
            .with_condition(Condition::http_ok("https://example.com/"))
    }

    #[test]
    fn graph_rejects_wrong_first_task() {
        let err = TaskGraph::from_tasks(vec![Task::new("TASK-001", 0, "Build login form")])
            .unwrap_err();
        assert!(matches!(err, Error::TaskList(_)));
    }

    #[test]
    fn graph_rejects_empty_list() {
        assert!(TaskGraph::from_tasks(vec![]).is_err());
    }

    #[test]
    fn next_eligible_respects_ordinal_order() {
        let graph = TaskGraph::from_tasks(vec![
            hello_world_task(),
            Task::new("TASK-002", 1, "Build login form"),
        ])
        .unwrap();

        assert_eq!(graph.next_eligible(2), Some("TASK-001".to_string()));
    }

    #[test]
    fn second_task_blocked_until_first_done() {
        let mut graph = TaskGraph::from_tasks(vec![
            hello_world_task(),
            Task::new("TASK-002", 1, "Build login form"),
        ])
        .unwrap();

        graph.get_mut("TASK-001").unwrap().status = TaskStatus::InProgress;
        assert_eq!(graph.next_eligible(2), None);

        graph.get_mut("TASK-001").unwrap().status = TaskStatus::Done;
        assert_eq!(graph.next_eligible(2), Some("TASK-002".to_string()));
    }

    #[test]
    fn failed_task_with_retries_remaining_is_eligible() {
        let mut graph = TaskGraph::from_tasks(vec![hello_world_task()]).unwrap();
        let task = graph.get_mut("TASK-001").unwrap();
        task.status = TaskStatus::Failed;
        task.retries = 1;

        assert_eq!(graph.next_eligible(2), Some("TASK-001".to_string()));
    }

    #[test]
    fn frozen_task_is_not_eligible_until_unfrozen() {
        let mut graph = TaskGraph::from_tasks(vec![
            hello_world_task(),
            Task::new("TASK-002", 1, "Build login form"),
        ])
        .unwrap();
        graph.get_mut("TASK-001").unwrap().status = TaskStatus::Done;
        {
            let task = graph.get_mut("TASK-002").unwrap();
            task.status = TaskStatus::Failed;
            task.clarification_id = Some("q-1".to_string());
        }

        assert_eq!(graph.next_eligible(2), None);
        assert!(graph.has_frozen_task());

        graph.unfreeze("q-1", "use JWT in a cookie");
        assert_eq!(graph.next_eligible(2), Some("TASK-002".to_string()));
        assert!(graph
            .get("TASK-002")
            .unwrap()
            .description
            .contains("use JWT in a cookie"));
    }

    #[test]
    fn deferred_task_runs_last_but_keeps_ordinal() {
        let mut graph = TaskGraph::from_tasks(vec![
            hello_world_task(),
            Task::new("TASK-002", 1, "Something ambiguous"),
            Task::new("TASK-003", 2, "Build checkout"),
        ])
        .unwrap();
        graph.get_mut("TASK-001").unwrap().status = TaskStatus::Done;
        graph.defer("TASK-002").unwrap();

        assert_eq!(graph.next_eligible(2), Some("TASK-003".to_string()));
        assert_eq!(graph.get("TASK-002").unwrap().ordinal, 1);

        graph.get_mut("TASK-003").unwrap().status = TaskStatus::Done;
        assert_eq!(graph.next_eligible(2), Some("TASK-002".to_string()));
    }

    #[test]
    fn initial_deploy_task_cannot_be_deferred() {
        let mut graph = TaskGraph::from_tasks(vec![
            hello_world_task(),
            Task::new("TASK-002", 1, "Build login form"),
        ])
        .unwrap();

        let err = graph.defer("TASK-001").unwrap_err();
        assert!(matches!(err, Error::TaskList(_)));

        // Still first in line; nothing can finish ahead of it.
        assert!(!graph.get("TASK-001").unwrap().deferred);
        assert_eq!(graph.next_eligible(2), Some("TASK-001".to_string()));
    }

    #[test]
    fn terminal_only_when_every_task_done() {
        let mut graph = TaskGraph::from_tasks(vec![
            hello_world_task(),
            Task::new("TASK-002", 1, "Build login form"),
        ])
        .unwrap();
        assert!(!graph.is_terminal());

        graph.get_mut("TASK-001").unwrap().status = TaskStatus::Done;
        graph.get_mut("TASK-002").unwrap().status = TaskStatus::Done;
        assert!(graph.is_terminal());
    }

    #[test]
    fn parse_task_list_reads_tasks_and_checks() {
        let md = "\
# Task List

1. Initialize project and deploy 'Hello World' to production
   - verify: GET https://example.com/ returns 200
2. Build login form
   - verify: run `./scripts/check_login.sh`
   - verify: GET https://example.com/login returns 200
";
        let graph = parse_task_list(md).unwrap();
        assert_eq!(graph.tasks().len(), 2);
        assert_eq!(graph.tasks()[0].id, "TASK-001");
        assert_eq!(graph.tasks()[0].verification.len(), 1);
        assert_eq!(graph.tasks()[1].verification.len(), 2);
    }

    #[test]
    fn parse_rejects_list_not_starting_with_hello_world() {
        let md = "1. Build login form\n";
        assert!(parse_task_list(md).is_err());
    }

    #[test]
    fn parse_rejects_verify_before_any_task() {
        let md = "- verify: GET https://example.com/ returns 200\n";
        assert!(matches!(parse_task_list(md), Err(Error::TaskList(_))));
    }

    #[test]
    fn render_then_parse_round_trips() {
        let md = "\
1. Initialize project and deploy 'Hello World' to production
   - verify: GET https://example.com/ returns 200
2. Build login form
   - verify: run `./scripts/check_login.sh`
";
        let graph = parse_task_list(md).unwrap();
        let rendered = render_task_list(&graph);
        let reparsed = parse_task_list(&rendered).unwrap();

        assert_eq!(reparsed.tasks().len(), graph.tasks().len());
        for (a, b) in graph.tasks().iter().zip(reparsed.tasks()) {
            assert_eq!(a.description, b.description);
            assert_eq!(a.verification, b.verification);
        }
    }

    #[test]
    fn task_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::AwaitingVerification).unwrap(),
            "\"awaiting_verification\""
        );
        assert_eq!(serde_json::to_string(&TaskStatus::Done).unwrap(), "\"done\"");
    }
}
