use std::collections::BTreeMap;

use quarry_core::{RunState, Turn, WorkflowError, merge_index_fields};
use quarry_llm::ChatBackend;
use quarry_mcp::{GET_MAPPING_TOOL, ToolBackend, normalize};

use super::WorkflowRunner;

impl<C: ChatBackend, T: ToolBackend> WorkflowRunner<C, T> {
    /// Fetch field schemas for the selected indices.
    ///
    /// Runs at most once per traversal — the branch predicate keeps it
    /// off once `mappings` is `Some`, and a degraded (unparseable)
    /// response still counts as fetched.
    pub(crate) async fn fetch_mappings(&self, state: &mut RunState) -> Result<(), WorkflowError> {
        let args = serde_json::json!({ "indices": state.selected_indices });

        let raw = self
            .tools
            .call_tool(GET_MAPPING_TOOL, Some(args))
            .await
            .map_err(|e| WorkflowError::Tool(format!("mapping retrieval failed: {e}")))?;

        match normalize::extract_mappings(&raw) {
            Ok(mappings) => {
                let field_count = merge_index_fields(&mappings).len();
                self.log(format!(
                    "Retrieved mappings for {} indices ({} unique fields)",
                    mappings.len(),
                    field_count
                ));
                state.push_turn(Turn::tool(format!(
                    "Flattened {} unique fields from {} indices",
                    field_count,
                    mappings.len()
                )));
                state.mappings = Some(mappings);
                Ok(())
            }
            Err(WorkflowError::Parse(msg)) => {
                self.warn(format!(
                    "Mapping response could not be interpreted ({msg}) — continuing without field schemas"
                ));
                state.push_turn(Turn::tool("Mappings were unreadable".to_string()));
                state.mappings = Some(BTreeMap::new());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
