//! Runs one task against the tools of an MCP server.

#[macro_use]
extern crate tracing;

mod logging;

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use llmbas::config::EnvConfig;
use llmbas::core::{Message, RunnerBuilder};
use llmbas::mcp::{Connection, McpServerConfig, McpToolSource};
use llmbas_openai_model::OpenAIProvider;

const SERVER_NAME: &str = "mcp_tools";

/// Let a model solve a task with the tools of an MCP server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Address of the MCP server, `host:port` or a full URL.
    ///
    /// `host:port` means `http://host:port/mcp`. The server must speak the
    /// streamable HTTP transport, the legacy SSE transport isn't supported.
    address: String,
    /// The task to solve.
    task: String,
    /// Also append logs to this file.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = logging::init(cli.log.as_deref()) {
        eprintln!("failed to open log file: {err}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(module = "MAIN", "{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = EnvConfig::from_env()?;

    let servers = McpServerConfig::default()
        .with_server(SERVER_NAME, Connection::from_address(&cli.address));
    let source = McpToolSource::connect(&servers).await?;
    info!(module = "MAIN", tools = source.len(), "tools discovered");

    let mut builder =
        RunnerBuilder::with_model_provider(OpenAIProvider::new(config.openai))
            .with_tools(source.into_tools())
            .with_retry_policy(config.retry_policy);
    if let Some(timeout) = config.tool_timeout {
        builder = builder.with_tool_timeout(timeout);
    }
    let runner = builder.build()?;

    let cancel = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(module = "MAIN", "interrupted, cancelling");
            cancel.cancel();
        }
    });

    let state = runner.run(cli.task).await?;
    if let Some(Message::Assistant { content, .. }) = state.messages().last() {
        println!("{content}");
    }
    Ok(())
}
