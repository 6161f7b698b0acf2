mod client;
mod protocol;

pub mod normalize;

pub use client::McpClient;
pub use protocol::*;

use anyhow::Result;
use serde_json::Value;

/// Tool names exposed by the backend's MCP server.
pub const LIST_INDICES_TOOL: &str = "platform_core_list_indices";
pub const GET_MAPPING_TOOL: &str = "platform_core_get_index_mapping";
pub const EXECUTE_ESQL_TOOL: &str = "platform_core_execute_esql";

/// Abstraction over the remote tool collaborator.
///
/// Returns the raw `tools/call` result value — envelope included — so
/// callers run it through [`normalize`]. The engine is generic over this
/// so tests can script responses and count invocations.
pub trait ToolBackend {
    async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<Value>;
}
