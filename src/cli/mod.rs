//! CLI interface for toolweave.

pub mod handlers;
pub mod output;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ServerConfig;
use output::OutputMode;

/// Toolweave - tool execution server with jobs, workflows and live events
#[derive(Parser)]
#[command(name = "toolweave", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: ~/.config/toolweave/config.toml)
    #[arg(long, env = "TOOLWEAVE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Workflow definition file to load
    #[arg(long, global = true)]
    pub workflows: Option<PathBuf>,

    /// Serve the HTTP event stream on this address (e.g. 127.0.0.1:3911)
    #[arg(long, global = true)]
    pub events_addr: Option<String>,

    /// Per-invocation tool deadline in seconds (0 disables it)
    #[arg(long, global = true)]
    pub tool_timeout: Option<u64>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Apply command-line overrides; they win over file and environment.
    pub fn apply_overrides(&self, config: &mut ServerConfig) {
        if let Some(path) = &self.workflows {
            config.workflows_path = Some(path.clone());
        }
        if let Some(addr) = &self.events_addr {
            config.events_addr = Some(addr.clone());
        }
        if let Some(secs) = self.tool_timeout {
            config.tool_timeout_secs = secs;
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start MCP server (stdio transport)
    #[command(alias = "mcp")]
    Serve,

    /// List registered tools
    Tools,

    /// Invoke a single tool
    Call {
        /// Tool name
        tool: String,
        /// JSON object of parameters
        #[arg(long)]
        params: Option<String>,
    },

    /// List loaded workflows
    Workflows,

    /// Run a workflow once and print its result
    Run {
        /// Workflow name
        workflow: String,
        /// JSON workflow input
        #[arg(long)]
        input: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, elvish, powershell)
        shell: clap_complete::Shell,
    },
}

/// Execute a CLI command.
pub async fn execute(
    command: &Commands,
    ctx: &crate::init::AppContext,
    mode: OutputMode,
) -> anyhow::Result<()> {
    match command {
        Commands::Serve => unreachable!("MCP handled in main"),
        Commands::Tools => handlers::tools::handle_list_tools(ctx, mode),
        Commands::Call { tool, params } => {
            handlers::tools::handle_call_tool(ctx, tool, params.as_deref(), mode).await?
        }
        Commands::Workflows => handlers::workflow::handle_list_workflows(ctx, mode).await,
        Commands::Run { workflow, input } => {
            handlers::workflow::handle_run_workflow(ctx, workflow, input.as_deref(), mode).await?
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                *shell,
                &mut Cli::command(),
                "toolweave",
                &mut std::io::stdout(),
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_overrides_win() {
        let cli = Cli::parse_from([
            "toolweave",
            "--workflows",
            "flows.json",
            "--tool-timeout",
            "0",
            "run",
            "greet",
            "--input",
            "{}",
        ]);
        let mut config = ServerConfig {
            tool_timeout_secs: 30,
            ..Default::default()
        };
        cli.apply_overrides(&mut config);
        assert_eq!(config.workflows_path, Some(PathBuf::from("flows.json")));
        assert_eq!(config.tool_timeout(), None);
        assert!(matches!(cli.command, Commands::Run { ref workflow, .. } if workflow == "greet"));
    }
}
