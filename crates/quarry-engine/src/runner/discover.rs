use quarry_core::{RunState, Turn, WorkflowError};
use quarry_llm::ChatBackend;
use quarry_mcp::{LIST_INDICES_TOOL, ToolBackend, normalize};

use super::WorkflowRunner;

impl<C: ChatBackend, T: ToolBackend> WorkflowRunner<C, T> {
    /// Discover available indices and data streams.
    ///
    /// An unreachable discovery tool is fatal — no useful state exists
    /// yet. An uninterpretable response merely degrades to an empty
    /// catalog and the run continues.
    pub(crate) async fn discover(&self, state: &mut RunState) -> Result<(), WorkflowError> {
        let raw = self
            .tools
            .call_tool(LIST_INDICES_TOOL, None)
            .await
            .map_err(|e| WorkflowError::Tool(format!("index discovery failed: {e}")))?;

        match normalize::extract_indices(&raw) {
            Ok(catalog) => {
                self.log(format!(
                    "Found {} indices and {} data streams",
                    catalog.indices.len(),
                    catalog.data_streams.len()
                ));
                state.push_turn(Turn::tool(format!(
                    "Listed {} indices and {} data streams",
                    catalog.indices.len(),
                    catalog.data_streams.len()
                )));
                state.available_indices = catalog.indices;
                state.available_data_streams = catalog.data_streams;
                Ok(())
            }
            Err(WorkflowError::Parse(msg)) => {
                self.warn(format!(
                    "Discovery response could not be interpreted ({msg}) — continuing with an empty catalog"
                ));
                state.push_turn(Turn::tool("Index listing was unreadable".to_string()));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
