//! Toolweave - tool execution server with jobs, workflows and live events
//!
//! Usage:
//!   toolweave serve                      Start MCP server on stdio
//!   toolweave tools                      List registered tools
//!   toolweave call echo --params '{...}' Invoke one tool
//!   toolweave workflows                  List loaded workflows
//!   toolweave run <workflow> --input ... Run a workflow once
//!   toolweave --help                     Show all commands

use anyhow::Result;
use clap::Parser;

use toolweave::cli::output::OutputMode;
use toolweave::cli::{Cli, Commands};
use toolweave::config::ServerConfig;
use toolweave::init::AppContext;
use toolweave::mcp::run_mcp_server;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Tracing to stderr (safe for MCP stdio transport)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("toolweave=info".parse()?),
        )
        .init();

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    let mode = OutputMode::from_json_flag(cli.json);

    let ctx = AppContext::new(config).await;
    match &cli.command {
        Commands::Serve => {
            run_mcp_server(ctx).await?;
        }
        cmd => {
            let outcome = toolweave::cli::execute(cmd, &ctx, mode).await;
            ctx.shutdown();
            outcome?;
        }
    }

    Ok(())
}
