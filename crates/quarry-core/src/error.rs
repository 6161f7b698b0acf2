use thiserror::Error;

/// Error taxonomy for a workflow traversal.
///
/// Only `Tool` failures raised before any useful state exists (index
/// discovery, mapping retrieval) abort a run. Everything downstream is
/// folded into `RunState::execution_error` and handled by the retry
/// branch — at that point an error is data, not an unwind.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A tool collaborator was unreachable or reported a failure.
    #[error("tool call failed: {0}")]
    Tool(String),

    /// A response could not be interpreted after bounded unwrapping.
    #[error("unparseable response: {0}")]
    Parse(String),

    /// The model violated a structured-output contract.
    #[error("model output contract violation: {0}")]
    ModelOutput(String),

    /// Session store I/O failed while loading or saving a thread.
    #[error("session store failure: {0}")]
    Session(String),
}
