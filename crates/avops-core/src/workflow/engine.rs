//! Recipe execution engine.
//!
//! Visits the four phases in order and reports one summary per phase. The
//! declared steps of a phase are counted, not executed.

use avops_types::error::ExecutionError;
use avops_types::recipe::{Phase, RecipeDocument};

/// Summary of one visited phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub step_count: usize,
    /// `"N steps"`.
    pub message: String,
}

/// Runs the phases of a parsed recipe.
///
/// An `Err` aborts the run at the failing phase; outcomes of earlier phases
/// are discarded with it.
pub trait RecipeExecutor: Send + Sync {
    fn run_phases(&self, recipe: &RecipeDocument) -> Result<Vec<PhaseOutcome>, ExecutionError>;
}

/// The default executor: counts the declared steps of every phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseEngine;

impl RecipeExecutor for PhaseEngine {
    fn run_phases(&self, recipe: &RecipeDocument) -> Result<Vec<PhaseOutcome>, ExecutionError> {
        let outcomes = Phase::ALL
            .into_iter()
            .map(|phase| {
                let step_count = recipe.steps(phase).len();
                tracing::debug!(%phase, step_count, recipe = %recipe.name, "phase visited");
                PhaseOutcome {
                    phase,
                    step_count,
                    message: format!("{step_count} steps"),
                }
            })
            .collect();
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::parse_recipe_document;

    #[test]
    fn test_phases_visited_in_order() {
        let doc = parse_recipe_document("name: r\nintake: [a]\nplan: [a, b]\nverify: [c]\n").unwrap();
        let outcomes = PhaseEngine.run_phases(&doc).unwrap();
        let phases: Vec<_> = outcomes.iter().map(|o| o.phase).collect();
        assert_eq!(phases, Phase::ALL.to_vec());
        let messages: Vec<_> = outcomes.iter().map(|o| o.message.as_str()).collect();
        assert_eq!(messages, ["1 steps", "2 steps", "0 steps", "1 steps"]);
    }

    #[test]
    fn test_empty_recipe_still_visits_every_phase() {
        let outcomes = PhaseEngine.run_phases(&RecipeDocument::default()).unwrap();
        assert_eq!(outcomes.len(), 4);
        assert!(outcomes.iter().all(|o| o.step_count == 0));
    }
}
