use anyhow::Context as _;
use rmcp::{
    model::{
        CallToolRequestParams, CallToolResult, Content, Implementation, IntoContents, JsonObject,
        ListToolsResult, PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo,
        Tool as McpTool,
    },
    service::RequestContext,
    ErrorData as McpError, RoleServer, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::init::AppContext;
use crate::mcp::error::ToolError;
use crate::tools::{ExecutionContext, ToolResult};
use crate::ToolweaveError;

pub const RUN_WORKFLOW: &str = "run_workflow";
pub const LIST_WORKFLOWS: &str = "list_workflows";

/// Arguments of the `run_workflow` tool.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunWorkflowInput {
    /// Name of a loaded workflow.
    pub workflow_name: String,
    /// Workflow input, available to step templates as `{workflow.input.*}`.
    #[serde(default)]
    pub input: Value,
}

/// MCP server exposing every registered tool plus the workflow tools.
#[derive(Clone)]
pub struct ToolweaveServer {
    ctx: Arc<AppContext>,
}

impl ToolweaveServer {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    /// Protocol listing: registered tools in name order, then the workflow tools.
    pub fn tool_listing(&self) -> Vec<McpTool> {
        let mut tools: Vec<McpTool> = self
            .ctx
            .registry
            .get_all_tools()
            .iter()
            .map(|tool| {
                McpTool::new(
                    tool.name().to_string(),
                    tool.description().to_string(),
                    Arc::new(tool.input_schema().to_json_schema()),
                )
            })
            .collect();

        tools.push(McpTool::new(
            RUN_WORKFLOW,
            "Run a named multi-step workflow. Steps run in order; the first failing step stops the run.",
            schema_object::<RunWorkflowInput>(),
        ));
        tools.push(McpTool::new(
            LIST_WORKFLOWS,
            "List the loaded workflows with their descriptions.",
            Arc::new(empty_object_schema()),
        ));
        tools
    }

    /// Route one `tools/call`. `cancel` fires when the client abandons the call.
    #[instrument(name = "mcp.call_tool", skip(self, arguments, cancel))]
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
        cancel: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let arguments = arguments.map(Value::Object).unwrap_or(Value::Null);
        match name {
            RUN_WORKFLOW => self.run_workflow(arguments, cancel).await,
            LIST_WORKFLOWS => Ok(self.list_workflows().await),
            _ => self.call_registered(name, arguments, cancel).await,
        }
    }

    async fn call_registered(
        &self,
        name: &str,
        arguments: Value,
        cancel: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let context =
            ExecutionContext::new(&self.ctx.config.session_id).with_cancellation(cancel);
        match self
            .ctx
            .registry
            .execute(name, arguments, &self.ctx.config, context)
            .await
        {
            Ok(result) => Ok(to_call_result(&result)),
            Err(err @ ToolweaveError::ToolNotFound { .. }) => Err(err.into()),
            Err(err) => Ok(CallToolResult::error(ToolError::from(&err).into_contents())),
        }
    }

    async fn run_workflow(
        &self,
        arguments: Value,
        cancel: CancellationToken,
    ) -> Result<CallToolResult, McpError> {
        let input: RunWorkflowInput = serde_json::from_value(arguments).map_err(|e| {
            McpError::invalid_params(format!("Invalid run_workflow arguments: {}", e), None)
        })?;

        let result = self
            .ctx
            .workflows
            .execute_workflow_with_cancel(
                &input.workflow_name,
                input.input,
                &self.ctx.config,
                &self.ctx.config.session_id,
                cancel,
            )
            .await;

        let text = serde_json::to_string_pretty(&result).unwrap_or_else(|_| result.message.clone());
        if result.success {
            Ok(CallToolResult::success(vec![Content::text(text)]))
        } else {
            Ok(CallToolResult::error(vec![Content::text(text)]))
        }
    }

    async fn list_workflows(&self) -> CallToolResult {
        let workflows: Vec<Value> = self
            .ctx
            .workflows
            .list_workflows()
            .await
            .into_iter()
            .map(|(name, description)| json!({ "name": name, "description": description }))
            .collect();
        let text = serde_json::to_string_pretty(&workflows).unwrap_or_else(|_| "[]".to_string());
        CallToolResult::success(vec![Content::text(text)])
    }
}

fn to_call_result(result: &ToolResult) -> CallToolResult {
    let content = result
        .content
        .iter()
        .map(|item| Content::text(item.text.clone()))
        .collect();
    if result.is_error() {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    }
}

fn schema_object<T: JsonSchema>() -> Arc<JsonObject> {
    match serde_json::to_value(schemars::schema_for!(T)) {
        Ok(Value::Object(map)) => Arc::new(map),
        _ => Arc::new(empty_object_schema()),
    }
}

fn empty_object_schema() -> JsonObject {
    let mut schema = JsonObject::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), json!({}));
    schema.insert("additionalProperties".into(), json!(false));
    schema
}

impl ServerHandler for ToolweaveServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "toolweave".to_string(),
                title: Some("Toolweave Tool Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                r#"# Toolweave

Tools validate their input strictly: unknown fields are rejected.

## Long-running work
Tools that start background jobs return a job id. Poll it with
get_job_result (pending, running, completed or failed) and stop it with
cancel_job.

## Workflows
- list_workflows — loaded workflows and what they do
- run_workflow(workflowName, input) — run steps in order; results of earlier
  steps feed later ones
"#
                .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tool_listing(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(&request.name, request.arguments, context.ct.clone())
            .await
    }
}

/// Run the MCP server on stdio until the client disconnects or ctrl-c.
///
/// When `events_addr` is configured the HTTP event stream runs alongside and
/// is shut down with it.
pub async fn run_mcp_server(ctx: AppContext) -> anyhow::Result<()> {
    let ctx = Arc::new(ctx);
    let server = ToolweaveServer::new(ctx.clone());

    tracing::info!("Starting toolweave MCP server v{}", env!("CARGO_PKG_VERSION"));

    let shutdown = CancellationToken::new();
    let events = match &ctx.config.events_addr {
        Some(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind event stream to {}", addr))?;
            Some(tokio::spawn(crate::events::http::serve(
                listener,
                ctx.hub.clone(),
                shutdown.clone(),
            )))
        }
        None => None,
    };

    // Stdio transport
    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let service = server.serve(transport).await?;
    tracing::info!(
        "MCP server listening on stdio ({} tools)",
        ctx.registry.len() + 2
    );

    let signal = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        signal.cancel();
    });

    tokio::select! {
        quit = service.waiting() => {
            quit?;
        }
        _ = shutdown.cancelled() => {}
    }

    tracing::info!("MCP server shutting down");
    shutdown.cancel();
    ctx.shutdown();
    if let Some(handle) = events {
        match handle.await {
            Ok(Err(e)) => tracing::error!("Event stream failed: {}", e),
            Err(e) => tracing::error!("Event stream task panicked: {}", e),
            Ok(Ok(())) => {}
        }
    }

    Ok(())
}
