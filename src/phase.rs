//! The twelve fixed phases of a launch run.
//!
//! Each phase is a value plus its artifact preconditions and postconditions;
//! the sequencer never consults anything else to decide whether a phase is
//! enterable.

use serde::{Deserialize, Serialize};

use crate::artifact::names;

/// One of the twelve ordered stages of the end-to-end workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Capture the raw idea.
    Idea,
    /// Research the space and sharpen the angle.
    Brainstorm,
    /// Write the product definition document.
    Definition,
    /// Choose the stack.
    StackSelection,
    /// Write the design guidelines.
    Design,
    /// Break the build into ordered, verifiable tasks.
    WorkBreakdown,
    /// Initialize the project and deploy hello world.
    InitialDeploy,
    /// Implement features one verified deploy at a time.
    FeatureLoop,
    /// Author copy and legal documents.
    Content,
    /// Exercise the full user flow end to end.
    IntegrationTest,
    /// Flip the product live.
    Launch,
    /// Produce marketing assets.
    Marketing,
}

/// All phases in execution order.
pub const ALL_PHASES: [Phase; 12] = [
    Phase::Idea,
    Phase::Brainstorm,
    Phase::Definition,
    Phase::StackSelection,
    Phase::Design,
    Phase::WorkBreakdown,
    Phase::InitialDeploy,
    Phase::FeatureLoop,
    Phase::Content,
    Phase::IntegrationTest,
    Phase::Launch,
    Phase::Marketing,
];

impl Phase {
    /// Returns the ordinal index of this phase (0-11).
    pub fn index(&self) -> usize {
        ALL_PHASES.iter().position(|p| p == self).unwrap_or(0)
    }

    /// Returns the phase with the given ordinal index, if any.
    pub fn from_index(index: usize) -> Option<Self> {
        ALL_PHASES.get(index).copied()
    }

    /// Returns the next phase in order, or None after Marketing.
    pub fn next(&self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// Artifacts that must exist in the store before this phase may start.
    pub fn required_artifacts(&self) -> &'static [&'static str] {
        match self {
            Phase::Idea => &[],
            Phase::Brainstorm => &[names::IDEA_BRIEF],
            Phase::Definition => &[names::IDEA_BRIEF, names::BRAINSTORM_NOTES],
            Phase::StackSelection => &[names::PRODUCT_DEFINITION],
            Phase::Design => &[names::PRODUCT_DEFINITION, names::STACK_SELECTION],
            Phase::WorkBreakdown => &[names::PRODUCT_DEFINITION, names::DESIGN_GUIDELINES],
            Phase::InitialDeploy => &[names::TASK_LIST],
            Phase::FeatureLoop => &[names::TASK_LIST, names::DESIGN_GUIDELINES],
            Phase::Content => &[names::PRODUCT_DEFINITION],
            Phase::IntegrationTest => &[names::PRODUCT_DEFINITION],
            Phase::Launch => &[names::CONTENT_COPY],
            Phase::Marketing => &[names::PRODUCT_DEFINITION],
        }
    }

    /// Artifacts this phase writes to the store before it is considered done.
    pub fn produced_artifacts(&self) -> &'static [&'static str] {
        match self {
            Phase::Idea => &[names::IDEA_BRIEF],
            Phase::Brainstorm => &[names::BRAINSTORM_NOTES],
            Phase::Definition => &[names::PRODUCT_DEFINITION],
            Phase::StackSelection => &[names::STACK_SELECTION],
            Phase::Design => &[names::DESIGN_GUIDELINES],
            Phase::WorkBreakdown => &[names::TASK_LIST],
            Phase::InitialDeploy => &[],
            Phase::FeatureLoop => &[],
            Phase::Content => &[names::CONTENT_COPY],
            Phase::IntegrationTest => &[],
            Phase::Launch => &[],
            Phase::Marketing => &[names::MARKETING_ASSETS],
        }
    }

    /// Whether leaving this phase additionally requires the task graph slice
    /// for it to be in a terminal state.
    pub fn gates_on_tasks(&self) -> bool {
        matches!(
            self,
            Phase::WorkBreakdown | Phase::InitialDeploy | Phase::FeatureLoop
        )
    }

    /// Human-readable phase name for logs and summaries.
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idea => "idea",
            Phase::Brainstorm => "brainstorm",
            Phase::Definition => "definition",
            Phase::StackSelection => "stack-selection",
            Phase::Design => "design",
            Phase::WorkBreakdown => "work-breakdown",
            Phase::InitialDeploy => "initial-deploy",
            Phase::FeatureLoop => "feature-loop",
            Phase::Content => "content",
            Phase::IntegrationTest => "integration-test",
            Phase::Launch => "launch",
            Phase::Marketing => "marketing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_strictly_ordered() {
        for (i, phase) in ALL_PHASES.iter().enumerate() {
            assert_eq!(phase.index(), i);
        }
        assert_eq!(Phase::Idea.index(), 0);
        assert_eq!(Phase::Marketing.index(), 11);
    }

    #[test]
    fn next_walks_the_full_sequence() {
        let mut phase = Phase::Idea;
        let mut count = 1;
        while let Some(next) = phase.next() {
            assert_eq!(next.index(), phase.index() + 1);
            phase = next;
            count += 1;
        }
        assert_eq!(count, 12);
        assert_eq!(phase, Phase::Marketing);
    }

    #[test]
    fn feature_loop_requires_design_guidelines() {
        assert!(Phase::FeatureLoop
            .required_artifacts()
            .contains(&names::DESIGN_GUIDELINES));
    }

    #[test]
    fn work_breakdown_produces_task_list() {
        assert!(Phase::WorkBreakdown
            .produced_artifacts()
            .contains(&names::TASK_LIST));
    }

    #[test]
    fn task_gated_phases() {
        assert!(Phase::FeatureLoop.gates_on_tasks());
        assert!(Phase::InitialDeploy.gates_on_tasks());
        assert!(!Phase::Design.gates_on_tasks());
    }

    #[test]
    fn phase_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Phase::StackSelection).unwrap(),
            "\"stack_selection\""
        );
        assert_eq!(
            serde_json::to_string(&Phase::InitialDeploy).unwrap(),
            "\"initial_deploy\""
        );
    }
}
