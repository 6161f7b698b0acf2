use quarry_core::{RunState, Turn, WorkflowError};
use quarry_llm::{ChatBackend, IndexSelection, Message, prompts, request_structured};
use quarry_mcp::ToolBackend;

use super::WorkflowRunner;

impl<C: ChatBackend, T: ToolBackend> WorkflowRunner<C, T> {
    /// Ask the model which of the discovered names are relevant.
    ///
    /// Names the model invents are dropped with a warning. An empty
    /// selection — whether the model chose nothing usable or violated
    /// the output contract outright — falls back to a bounded,
    /// deterministic default: the first `selection_fallback_limit`
    /// discovered names in sorted order.
    pub(crate) async fn select_indices(&self, state: &mut RunState) -> Result<(), WorkflowError> {
        let known = state.known_names();
        if known.is_empty() {
            self.warn("No indices discovered — nothing to select");
            state.push_turn(Turn::assistant("No indices available to query".to_string()));
            return Ok(());
        }

        let available: Vec<String> = known.iter().cloned().collect();
        let prompt = prompts::index_selection_prompt(&state.user_query, &available);

        let mut chosen = match request_structured::<IndexSelection>(
            &self.chat,
            "Selection",
            vec![Message::user(prompt)],
        )
        .await
        {
            Ok(selection) => {
                self.log(format!("Selection reasoning: {}", selection.reasoning));
                selection.indices
            }
            Err(e) => {
                self.warn(format!("Index selection violated its contract ({e})"));
                Vec::new()
            }
        };

        chosen.retain(|name| {
            let valid = known.contains(name);
            if !valid {
                self.warn(format!("Dropping selected index not in catalog: {name}"));
            }
            valid
        });

        if chosen.is_empty() {
            chosen = available
                .iter()
                .take(self.config.selection_fallback_limit)
                .cloned()
                .collect();
            self.log(format!(
                "Selection empty after validation — falling back to first {} discovered names",
                chosen.len()
            ));
        }

        state.push_turn(Turn::assistant(format!(
            "Selected indices: {}",
            chosen.join(", ")
        )));
        state.selected_indices = chosen;
        Ok(())
    }
}
