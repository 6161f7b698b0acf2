use quarry_core::session::SessionStore;
use quarry_core::{RunState, Turn, WorkflowError};
use quarry_llm::ChatBackend;
use quarry_mcp::ToolBackend;

use crate::runner::WorkflowRunner;

/// Composition root for one query: seeds run state (optionally from a
/// persisted thread), drives the runner to its terminal stage, persists
/// the conversation, and hands back the final state.
pub struct RunDriver<C: ChatBackend, T: ToolBackend> {
    runner: WorkflowRunner<C, T>,
    sessions: Option<SessionStore>,
}

impl<C: ChatBackend, T: ToolBackend> RunDriver<C, T> {
    pub fn new(runner: WorkflowRunner<C, T>, sessions: Option<SessionStore>) -> Self {
        Self { runner, sessions }
    }

    pub async fn run(
        &self,
        thread_id: Option<&str>,
        user_query: &str,
    ) -> Result<RunState, WorkflowError> {
        let mut state = RunState::new(user_query);

        if let (Some(store), Some(id)) = (&self.sessions, thread_id) {
            match store.load(id) {
                Ok(Some(history)) => state.messages = history,
                Ok(None) => {}
                Err(e) => return Err(WorkflowError::Session(e.to_string())),
            }
        }

        state.push_turn(Turn::user(user_query));

        self.runner.run(&mut state).await?;

        if let (Some(store), Some(id)) = (&self.sessions, thread_id) {
            store
                .save(id, &state.messages)
                .map_err(|e| WorkflowError::Session(e.to_string()))?;
        }

        Ok(state)
    }
}
