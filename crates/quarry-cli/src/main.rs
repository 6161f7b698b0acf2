use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use quarry_core::session::SessionStore;
use quarry_core::EngineConfig;
use quarry_engine::{RunDriver, RunEvent, WorkflowRunner};
use quarry_llm::{LlmClient, LlmConfig};
use quarry_mcp::McpClient;

/// Ask questions of a tabular backend in plain language.
#[derive(Debug, Parser)]
#[command(name = "quarry", version)]
struct Args {
    /// The question to answer.
    query: String,

    /// Thread id for conversation continuity across invocations.
    #[arg(long)]
    thread: Option<String>,

    /// Command used to spawn the MCP server, arguments included
    /// (e.g. "npx -y <server-package>").
    #[arg(long)]
    mcp_command: String,

    /// Chat completions endpoint base URL.
    #[arg(long)]
    base_url: Option<String>,

    /// Model name sent to the chat endpoint.
    #[arg(long)]
    model: Option<String>,

    /// API key for the chat endpoint (falls back to $QUARRY_API_KEY).
    #[arg(long)]
    api_key: Option<String>,

    /// Directory CSV exports are written into.
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Directory conversation threads are stored in.
    #[arg(long)]
    session_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();

    let mut llm_config = LlmConfig::default();
    if let Some(base_url) = args.base_url {
        llm_config.base_url = base_url;
    }
    if let Some(model) = args.model {
        llm_config.model = model;
    }
    llm_config.api_key = args
        .api_key
        .or_else(|| std::env::var("QUARRY_API_KEY").ok());

    let mut engine_config = EngineConfig::default();
    if let Some(dir) = args.export_dir {
        engine_config.export_dir = dir;
    }

    let parts: Vec<&str> = args.mcp_command.split_whitespace().collect();
    let (command, command_args) = parts
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("--mcp-command is empty"))?;
    let mcp = McpClient::spawn(command, command_args).await?;

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(256);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                RunEvent::Log(msg) => eprintln!("  {msg}"),
                RunEvent::StageStarted(stage) => eprintln!("→ {stage:?}"),
                RunEvent::Error(msg) => eprintln!("! {msg}"),
                _ => {}
            }
        }
    });

    let runner = WorkflowRunner::new(LlmClient::new(llm_config), mcp, engine_config, event_tx);
    let sessions = args.session_dir.map(SessionStore::new);
    let driver = RunDriver::new(runner, sessions);

    let state = driver.run(args.thread.as_deref(), &args.query).await?;

    match state.final_answer {
        Some(answer) => println!("{answer}"),
        None => println!("The run produced no answer."),
    }

    Ok(())
}
