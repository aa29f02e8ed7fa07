//! Tools that ship with the server.
//!
//! `get_job_result` and `cancel_job` are the client half of the async-tool
//! pattern; `background_echo` is its smallest producer. `echo` exists so a
//! fresh install has something to call and chain in workflows.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ServerConfig;
use crate::jobs::{JobRunner, JobStore, JobView};
use crate::tools::{ExecutionContext, FieldKind, InputSchema, Tool, ToolRegistry, ToolResult};

/// Register every built-in tool.
pub fn register_builtin_tools(registry: &ToolRegistry, runner: &JobRunner) {
    registry.register(Arc::new(EchoTool::new()));
    registry.register(Arc::new(BackgroundEchoTool::new(runner.clone())));
    registry.register(Arc::new(GetJobResultTool::new(Arc::clone(runner.store()))));
    registry.register(Arc::new(CancelJobTool::new(runner.clone())));
}

fn str_param<'a>(params: &'a Map<String, Value>, key: &str) -> anyhow::Result<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow::anyhow!("parameter '{}' must be a string", key))
}

fn render_echo(message: &str, repeat: u64, uppercase: bool) -> String {
    let message = if uppercase {
        message.to_uppercase()
    } else {
        message.to_string()
    };
    vec![message; repeat as usize].join("\n")
}

pub struct EchoTool {
    schema: InputSchema,
}

impl EchoTool {
    pub fn new() -> Self {
        Self {
            schema: InputSchema::new()
                .required("message", FieldKind::String, "Text to echo back")
                .optional("repeat", FieldKind::Integer, "How many times to repeat it")
                .range(Some(1), Some(20))
                .optional("uppercase", FieldKind::Boolean, "Upper-case the text"),
        }
    }
}

impl Default for EchoTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo a message back, optionally repeated or upper-cased."
    }

    fn input_schema(&self) -> &InputSchema {
        &self.schema
    }

    async fn execute(
        &self,
        params: Map<String, Value>,
        _config: &ServerConfig,
        _context: &ExecutionContext,
    ) -> anyhow::Result<ToolResult> {
        let message = str_param(&params, "message")?;
        let repeat = params.get("repeat").and_then(Value::as_u64).unwrap_or(1);
        let uppercase = params
            .get("uppercase")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(ToolResult::text(render_echo(message, repeat, uppercase)))
    }
}

/// Echo that runs as a background job and reports its job id right away.
pub struct BackgroundEchoTool {
    runner: JobRunner,
    schema: InputSchema,
}

impl BackgroundEchoTool {
    pub fn new(runner: JobRunner) -> Self {
        Self {
            runner,
            schema: InputSchema::new()
                .required("message", FieldKind::String, "Text to echo back")
                .optional("delay_ms", FieldKind::Integer, "Simulated work time")
                .range(Some(0), Some(600_000)),
        }
    }
}

#[async_trait]
impl Tool for BackgroundEchoTool {
    fn name(&self) -> &str {
        "background_echo"
    }

    fn description(&self) -> &str {
        "Echo a message from a background job. Returns a job id; poll it with get_job_result."
    }

    fn input_schema(&self) -> &InputSchema {
        &self.schema
    }

    async fn execute(
        &self,
        params: Map<String, Value>,
        _config: &ServerConfig,
        _context: &ExecutionContext,
    ) -> anyhow::Result<ToolResult> {
        let message = str_param(&params, "message")?.to_string();
        let delay_ms = params.get("delay_ms").and_then(Value::as_u64).unwrap_or(0);
        let delay = Duration::from_millis(delay_ms);

        let job_id = self
            .runner
            .submit(self.name(), Value::Object(params), move |handle| async move {
                handle.progress("echoing").await;
                tokio::time::sleep(delay).await;
                Ok::<_, anyhow::Error>(serde_json::to_value(ToolResult::text(message))?)
            })
            .await?;

        Ok(
            ToolResult::text(format!(
                "Job started: {}. Use get_job_result to fetch the outcome.",
                job_id
            ))
            .with_metadata("jobId", json!(job_id)),
        )
    }
}

pub struct GetJobResultTool {
    store: Arc<JobStore>,
    schema: InputSchema,
}

impl GetJobResultTool {
    pub fn new(store: Arc<JobStore>) -> Self {
        Self {
            store,
            schema: InputSchema::new().required(
                "jobId",
                FieldKind::String,
                "Id returned when the job was started",
            ),
        }
    }
}

#[async_trait]
impl Tool for GetJobResultTool {
    fn name(&self) -> &str {
        "get_job_result"
    }

    fn description(&self) -> &str {
        "Check the status of a background job and fetch its result when finished."
    }

    fn input_schema(&self) -> &InputSchema {
        &self.schema
    }

    async fn execute(
        &self,
        params: Map<String, Value>,
        _config: &ServerConfig,
        _context: &ExecutionContext,
    ) -> anyhow::Result<ToolResult> {
        let job_id = str_param(&params, "jobId")?;
        let job = self.store.get_job(job_id).await;
        Ok(JobView::from_lookup(job_id, job).to_tool_result())
    }
}

pub struct CancelJobTool {
    runner: JobRunner,
    schema: InputSchema,
}

impl CancelJobTool {
    pub fn new(runner: JobRunner) -> Self {
        Self {
            runner,
            schema: InputSchema::new().required("jobId", FieldKind::String, "Job to cancel"),
        }
    }
}

#[async_trait]
impl Tool for CancelJobTool {
    fn name(&self) -> &str {
        "cancel_job"
    }

    fn description(&self) -> &str {
        "Cancel a running background job."
    }

    fn input_schema(&self) -> &InputSchema {
        &self.schema
    }

    async fn execute(
        &self,
        params: Map<String, Value>,
        _config: &ServerConfig,
        _context: &ExecutionContext,
    ) -> anyhow::Result<ToolResult> {
        let job_id = str_param(&params, "jobId")?;
        if self.runner.cancel(job_id) {
            Ok(ToolResult::text(format!("Cancellation requested for job '{}'.", job_id)))
        } else {
            Ok(ToolResult::error(
                format!("Job '{}' is not running.", job_id),
                Some(json!({ "jobId": job_id })),
            ))
        }
    }
}
