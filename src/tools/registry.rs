use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

use crate::config::ServerConfig;
use crate::tools::{ExecutionContext, Tool, ToolResult};
use crate::utils::{run_with_deadline, Deadline};
use crate::ToolweaveError;

/// Holds registered tools and dispatches validated invocations to them.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool with the same name.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.write().insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Tool re-registered; previous definition replaced");
        } else {
            tracing::debug!(tool = %name, "Tool registered");
        }
    }

    /// Register a tool, rejecting a name that is already taken.
    pub fn try_register(&self, tool: Arc<dyn Tool>) -> Result<(), ToolweaveError> {
        let mut tools = self.tools.write();
        let name = tool.name().to_string();
        if tools.contains_key(&name) {
            return Err(ToolweaveError::DuplicateTool { name });
        }
        tracing::debug!(tool = %name, "Tool registered");
        tools.insert(name, tool);
        Ok(())
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// All registered tools, sorted by name.
    pub fn get_all_tools(&self) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<_> = self.tools.read().values().cloned().collect();
        tools.sort_by(|a, b| a.name().cmp(b.name()));
        tools
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.get_all_tools()
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    pub fn clear(&self) {
        self.tools.write().clear();
    }

    /// Validate `raw_params` against the tool's schema and run it.
    ///
    /// Errors already of type [`ToolweaveError`] raised by the tool pass
    /// through unchanged. Anything else, an empty or malformed result, a
    /// deadline or a cancellation becomes [`ToolweaveError::ToolExecution`].
    #[instrument(
        name = "registry.execute",
        skip_all,
        fields(tool = %name, session = %context.session_id)
    )]
    pub async fn execute(
        &self,
        name: &str,
        raw_params: Value,
        config: &ServerConfig,
        context: ExecutionContext,
    ) -> Result<ToolResult, ToolweaveError> {
        tracing::debug!("Tool invocation requested");

        let Some(tool) = self.get_tool(name) else {
            tracing::error!("Tool not found");
            return Err(ToolweaveError::ToolNotFound {
                name: name.to_string(),
            });
        };

        let params = tool.input_schema().validate(&raw_params).map_err(|issues| {
            tracing::warn!(issues = issues.len(), "Tool input validation failed");
            ToolweaveError::Validation {
                tool_name: name.to_string(),
                issues,
            }
        })?;
        let params_snapshot = Value::Object(params.clone());

        let started = Instant::now();
        let outcome = run_with_deadline(
            tool.execute(params, config, &context),
            config.tool_timeout(),
            &context.cancellation,
        )
        .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Deadline::Finished(Ok(result)) if result.is_well_formed() => {
                tracing::info!(elapsed_ms, is_error = result.is_error(), "Tool executed");
                Ok(result)
            }
            Deadline::Finished(Ok(_)) => {
                tracing::error!(elapsed_ms, "Tool returned an empty or malformed result");
                Err(execution_error(
                    name,
                    "Tool returned an empty or malformed result",
                    params_snapshot,
                    context,
                    None,
                ))
            }
            Deadline::Finished(Err(err)) => match err.downcast::<ToolweaveError>() {
                Ok(typed) => {
                    tracing::warn!(elapsed_ms, kind = typed.kind(), "Tool failed: {}", typed);
                    Err(typed)
                }
                Err(err) => {
                    tracing::error!(elapsed_ms, "Tool failed: {}", err);
                    Err(execution_error(
                        name,
                        &err.to_string(),
                        params_snapshot,
                        context,
                        Some(err.into()),
                    ))
                }
            },
            Deadline::TimedOut(limit) => {
                tracing::error!(elapsed_ms, "Tool timed out");
                Err(execution_error(
                    name,
                    &format!("timed out after {}s", limit.as_secs_f64()),
                    params_snapshot,
                    context,
                    None,
                ))
            }
            Deadline::Cancelled => {
                tracing::warn!(elapsed_ms, "Tool invocation cancelled");
                Err(execution_error(
                    name,
                    "invocation cancelled",
                    params_snapshot,
                    context,
                    None,
                ))
            }
        }
    }
}

fn execution_error(
    tool_name: &str,
    message: &str,
    params: Value,
    context: ExecutionContext,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
) -> ToolweaveError {
    ToolweaveError::ToolExecution {
        tool_name: tool_name.to_string(),
        message: message.to_string(),
        params,
        context: Box::new(context),
        source,
    }
}
