use std::collections::BTreeMap;

use quarry_core::{QueryPlan, RepairContext, RunState, Turn, WorkflowError, merge_index_fields};
use quarry_llm::{ChatBackend, Message, prompts, request_structured};
use quarry_mcp::ToolBackend;

use super::WorkflowRunner;

impl<C: ChatBackend, T: ToolBackend> WorkflowRunner<C, T> {
    /// Generate (or regenerate) the ES|QL plan.
    ///
    /// One contract serves both the first attempt and repair cycles:
    /// when `repair_context` is present the prompt carries the failing
    /// query and its error. A contract violation that survives the
    /// repair pass is recorded as an execution error so it flows through
    /// the same retry branch instead of aborting the run.
    pub(crate) async fn generate(&self, state: &mut RunState) -> Result<(), WorkflowError> {
        let fields: BTreeMap<String, String> = state
            .mappings
            .as_ref()
            .map(merge_index_fields)
            .unwrap_or_default();

        let prompt = prompts::query_generation_prompt(
            &state.user_query,
            &state.selected_indices,
            &fields,
            state.repair_context.as_ref(),
        );

        match request_structured::<QueryPlan>(&self.chat, "Generation", vec![Message::user(prompt)])
            .await
        {
            Ok(plan) => {
                self.log(format!("Generated ES|QL query: {}", plan.query));
                state.push_turn(Turn::assistant(format!(
                    "Generated ES|QL query: {}",
                    plan.query
                )));
                state.plan = Some(plan);
            }
            Err(e) => {
                let msg = format!("query generation failed: {e}");
                self.warn(&msg);
                state.push_turn(Turn::assistant(msg.clone()));
                state.plan = None;
                state.execution_error = Some(msg);
            }
        }
        Ok(())
    }

    /// One repair trip: bank the failure as context for the next
    /// generation, charge the retry budget, clear the error.
    pub(crate) fn prepare_repair(&self, state: &mut RunState) {
        let error = state.execution_error.take().unwrap_or_default();
        let failed_query = state
            .current_query()
            .unwrap_or_default()
            .to_string();

        state.retry_count += 1;
        self.log(format!(
            "Repair cycle {} of {}: {}",
            state.retry_count, self.config.max_retries, error
        ));
        state.repair_context = Some(RepairContext {
            failed_query,
            error,
        });
    }
}
