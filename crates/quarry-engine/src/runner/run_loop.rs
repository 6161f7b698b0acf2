use quarry_core::{RunState, WorkflowError};
use quarry_llm::ChatBackend;
use quarry_mcp::ToolBackend;

use super::control::Stage;
use super::{RunEvent, WorkflowRunner};

impl<C: ChatBackend, T: ToolBackend> WorkflowRunner<C, T> {
    /// Drive the state machine from discovery to `Done`.
    ///
    /// Stages run strictly sequentially; each one commits its state
    /// delta only after its collaborator call returns, then the pure
    /// transition function picks the next stage. Only errors the graph
    /// has no branch for (discovery or mapping tool unreachable)
    /// propagate as `Err` — everything else rides in the state.
    pub async fn run(&self, state: &mut RunState) -> Result<(), WorkflowError> {
        self.log(format!("Starting run for query: {}", state.user_query));

        let mut stage = Stage::DiscoverIndices;
        while stage != Stage::Done {
            self.emit(RunEvent::StageStarted(stage));

            let result = match stage {
                Stage::DiscoverIndices => self.discover(state).await,
                Stage::SelectIndices => self.select_indices(state).await,
                Stage::FetchMappings => self.fetch_mappings(state).await,
                Stage::GenerateQuery => self.generate(state).await,
                Stage::ExecuteQuery => self.execute(state).await,
                Stage::RepairQuery => {
                    self.prepare_repair(state);
                    Ok(())
                }
                Stage::Finalize => self.finalize(state).await,
                Stage::Done => unreachable!("loop exits before Done runs"),
            };

            if let Err(e) = result {
                self.emit_error(format!("Run failed at {:?}: {}", stage, e));
                return Err(e);
            }

            self.emit(RunEvent::StageCompleted(stage));
            stage = stage.next(state, self.config());
        }

        self.log("Run completed");
        self.emit(RunEvent::RunCompleted);
        Ok(())
    }
}
