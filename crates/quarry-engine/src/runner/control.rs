use quarry_core::{EngineConfig, RunState};
use serde::{Deserialize, Serialize};

/// The stages of a workflow traversal.
///
/// The backbone is linear: discover → select → [mappings] → generate →
/// execute → finalize. Two branch points bend it: the mapping-needed
/// check after selection, and the retry check after execution, which
/// routes back through repair → generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    DiscoverIndices,
    SelectIndices,
    FetchMappings,
    GenerateQuery,
    ExecuteQuery,
    RepairQuery,
    Finalize,
    Done,
}

/// Mappings are wanted once indices are selected, and fetched at most
/// once per run: `Some` — even a degraded empty fetch — keeps this false
/// for the rest of the run, retries included.
pub fn needs_mappings(state: &RunState) -> bool {
    !state.selected_indices.is_empty() && state.mappings.is_none()
}

/// A failed execution routes back through repair while budget remains.
pub fn should_retry(state: &RunState, max_retries: u32) -> bool {
    state.execution_error.is_some() && state.retry_count < max_retries
}

impl Stage {
    /// Pure transition function: the next stage follows from the current
    /// stage and run state alone.
    pub fn next(self, state: &RunState, config: &EngineConfig) -> Stage {
        match self {
            Stage::DiscoverIndices => Stage::SelectIndices,
            Stage::SelectIndices => {
                if needs_mappings(state) {
                    Stage::FetchMappings
                } else {
                    Stage::GenerateQuery
                }
            }
            Stage::FetchMappings => Stage::GenerateQuery,
            Stage::GenerateQuery => Stage::ExecuteQuery,
            Stage::ExecuteQuery => {
                if should_retry(state, config.max_retries) {
                    Stage::RepairQuery
                } else {
                    Stage::Finalize
                }
            }
            Stage::RepairQuery => Stage::GenerateQuery,
            Stage::Finalize | Stage::Done => Stage::Done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn state() -> RunState {
        RunState::new("test query")
    }

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn backbone_is_linear_without_branches() {
        let s = state();
        let c = config();
        assert_eq!(Stage::DiscoverIndices.next(&s, &c), Stage::SelectIndices);
        assert_eq!(Stage::FetchMappings.next(&s, &c), Stage::GenerateQuery);
        assert_eq!(Stage::GenerateQuery.next(&s, &c), Stage::ExecuteQuery);
        assert_eq!(Stage::RepairQuery.next(&s, &c), Stage::GenerateQuery);
        assert_eq!(Stage::Finalize.next(&s, &c), Stage::Done);
        assert_eq!(Stage::Done.next(&s, &c), Stage::Done);
    }

    #[test]
    fn selection_branches_on_missing_mappings() {
        let mut s = state();
        s.selected_indices = vec!["logs-1".to_string()];
        assert!(needs_mappings(&s));
        assert_eq!(Stage::SelectIndices.next(&s, &config()), Stage::FetchMappings);
    }

    #[test]
    fn selection_skips_mappings_when_present() {
        let mut s = state();
        s.selected_indices = vec!["logs-1".to_string()];
        s.mappings = Some(BTreeMap::new());
        assert!(!needs_mappings(&s));
        assert_eq!(Stage::SelectIndices.next(&s, &config()), Stage::GenerateQuery);
    }

    #[test]
    fn selection_skips_mappings_when_nothing_selected() {
        let s = state();
        assert!(!needs_mappings(&s));
        assert_eq!(Stage::SelectIndices.next(&s, &config()), Stage::GenerateQuery);
    }

    #[test]
    fn mappings_stay_fetched_across_retry_cycles() {
        let mut s = state();
        s.selected_indices = vec!["logs-1".to_string()];
        s.mappings = Some(BTreeMap::new());
        // even with an error pending and retries in flight the mapping
        // predicate stays false
        s.execution_error = Some("boom".to_string());
        s.retry_count = 2;
        assert!(!needs_mappings(&s));
    }

    #[test]
    fn execution_error_routes_to_repair_while_budget_remains() {
        let mut s = state();
        s.execution_error = Some("parsing_exception".to_string());
        s.retry_count = 0;
        assert!(should_retry(&s, 3));
        assert_eq!(Stage::ExecuteQuery.next(&s, &config()), Stage::RepairQuery);
    }

    #[test]
    fn clean_execution_routes_to_finalize() {
        let s = state();
        assert!(!should_retry(&s, 3));
        assert_eq!(Stage::ExecuteQuery.next(&s, &config()), Stage::Finalize);
    }

    #[test]
    fn exhausted_retries_route_to_finalize_despite_error() {
        let mut s = state();
        s.execution_error = Some("parsing_exception".to_string());
        s.retry_count = 3;
        assert!(!should_retry(&s, 3));
        assert_eq!(Stage::ExecuteQuery.next(&s, &config()), Stage::Finalize);
    }
}
