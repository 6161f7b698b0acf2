mod control;
mod discover;
mod execute;
mod export;
mod finalize;
mod generate;
mod mappings;
mod run_loop;
mod select;


pub use control::{Stage, needs_mappings, should_retry};

use quarry_core::EngineConfig;
use quarry_llm::ChatBackend;
use quarry_mcp::ToolBackend;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;
use tracing::{error, info, warn};

/// Events sent from the runner back to the caller while a traversal is
/// in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    Log(String),
    StageStarted(Stage),
    StageCompleted(Stage),
    RunCompleted,
    Error(String),
}

/// Drives one workflow traversal over a chat backend and a tool backend.
///
/// Generic over both collaborators so tests can script responses and
/// count invocations.
pub struct WorkflowRunner<C: ChatBackend, T: ToolBackend> {
    chat: C,
    tools: T,
    config: EngineConfig,
    event_tx: Sender<RunEvent>,
}

impl<C: ChatBackend, T: ToolBackend> WorkflowRunner<C, T> {
    pub fn new(chat: C, tools: T, config: EngineConfig, event_tx: Sender<RunEvent>) -> Self {
        Self {
            chat,
            tools,
            config,
            event_tx,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn emit(&self, event: RunEvent) {
        let _ = self.event_tx.try_send(event);
    }

    pub(crate) fn log(&self, msg: impl Into<String>) {
        let msg = msg.into();
        info!("{}", msg);
        self.emit(RunEvent::Log(msg));
    }

    pub(crate) fn warn(&self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!("{}", msg);
        self.emit(RunEvent::Log(msg));
    }

    pub(crate) fn emit_error(&self, msg: impl Into<String>) {
        let msg = msg.into();
        error!("{}", msg);
        self.emit(RunEvent::Error(msg));
    }
}
