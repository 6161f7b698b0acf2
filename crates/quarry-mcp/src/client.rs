use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::protocol::*;
use crate::ToolBackend;

/// Stdio MCP client: spawns the server process and speaks JSON-RPC 2.0
/// over its pipes, one message per line.
pub struct McpClient {
    process: Child,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    request_id: AtomicU64,
    tools: Vec<Tool>,
}

impl McpClient {
    /// Spawn an MCP server and initialize the connection.
    pub async fn spawn(command: &str, args: &[&str]) -> Result<Self> {
        info!("Spawning MCP server: {} {:?}", command, args);

        let mut process = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .context("Failed to spawn MCP server")?;

        let stdin = process.stdin.take().ok_or_else(|| anyhow!("No stdin"))?;
        let stdout = process.stdout.take().ok_or_else(|| anyhow!("No stdout"))?;

        let mut client = Self {
            process,
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            request_id: AtomicU64::new(1),
            tools: Vec::new(),
        };

        client.initialize().await?;
        client.fetch_tools().await?;

        Ok(client)
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    async fn write_line(&self, line: &str) -> Result<()> {
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse> {
        let id = self.next_id();
        let request = JsonRpcRequest::new(id, method, params);
        let request_json = serde_json::to_string(&request)?;

        debug!("MCP request: {}", request_json);

        self.write_line(&request_json).await?;

        let response_line = {
            let mut stdout = self.stdout.lock().await;
            let mut line = String::new();
            stdout.read_line(&mut line).await?;
            line
        };

        debug!("MCP response: {}", response_line.trim());

        let response: JsonRpcResponse =
            serde_json::from_str(&response_line).context("Failed to parse MCP response")?;

        if let Some(err) = &response.error {
            error!("MCP error: {} (code {})", err.message, err.code);
        }

        Ok(response)
    }

    async fn initialize(&mut self) -> Result<()> {
        let params = InitializeParams {
            protocol_version: "2024-11-05".to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo {
                name: "quarry".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let response = self
            .send_request("initialize", Some(serde_json::to_value(params)?))
            .await?;

        if let Some(result) = response.result {
            let init_result: InitializeResult = serde_json::from_value(result)?;
            info!(
                "MCP initialized: protocol={}, server={:?}",
                init_result.protocol_version,
                init_result.server_info.as_ref().map(|s| &s.name)
            );
        }

        // Send initialized notification
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        });
        self.write_line(&serde_json::to_string(&notification)?)
            .await?;

        Ok(())
    }

    async fn fetch_tools(&mut self) -> Result<()> {
        let response = self.send_request("tools/list", None).await?;

        if let Some(result) = response.result {
            let tools_result: ToolsListResult = serde_json::from_value(result)?;
            info!("Loaded {} MCP tools", tools_result.tools.len());
            for tool in &tools_result.tools {
                debug!("  - {}: {:?}", tool.name, tool.description);
            }
            self.tools = tools_result.tools;
        }

        Ok(())
    }

    /// Get available tools
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Call a tool by name; returns the raw `tools/call` result value.
    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<Value> {
        let params = ToolCallParams {
            name: name.to_string(),
            arguments,
        };

        let response = self
            .send_request("tools/call", Some(serde_json::to_value(params)?))
            .await?;

        if let Some(err) = response.error {
            return Err(anyhow!("Tool call failed: {}", err.message));
        }

        response
            .result
            .ok_or_else(|| anyhow!("No result from tool call"))
    }

    /// Check if the server process is still running
    pub fn is_running(&mut self) -> bool {
        matches!(self.process.try_wait(), Ok(None))
    }
}

impl ToolBackend for McpClient {
    async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<Value> {
        McpClient::call_tool(self, name, arguments).await
    }
}

impl Drop for McpClient {
    fn drop(&mut self) {
        let _ = self.process.start_kill();
    }
}
