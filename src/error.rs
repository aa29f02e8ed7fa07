use serde_json::{json, Value};
use thiserror::Error;

use crate::tools::schema::FieldIssue;
use crate::tools::types::ExecutionContext;
use crate::workflow::resolver::ResolutionError;

/// Error type for toolweave operations.
///
/// Every variant can describe itself as a type name (`kind`) plus a structured
/// JSON payload (`context`), so loggers and API responses attach diagnostic
/// data the same way regardless of where the failure came from.
#[derive(Debug, Error)]
pub enum ToolweaveError {
    /// Input failed closed schema validation.
    #[error("Input validation failed for tool '{tool_name}': {}", join_issues(.issues))]
    Validation {
        tool_name: String,
        issues: Vec<FieldIssue>,
    },

    /// No tool registered under this name.
    #[error("Tool '{name}' not found")]
    ToolNotFound { name: String },

    /// A tool with this name is already registered.
    #[error("Tool '{name}' is already registered")]
    DuplicateTool { name: String },

    /// The tool's execute capability failed or produced an unusable result.
    #[error("Error executing tool '{tool_name}': {message}")]
    ToolExecution {
        tool_name: String,
        message: String,
        params: Value,
        context: Box<ExecutionContext>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A template path failed to resolve.
    #[error(transparent)]
    ParameterResolution(#[from] ResolutionError),

    /// No workflow definition loaded under this name.
    #[error("Workflow \"{name}\" not found.")]
    WorkflowNotFound { name: String },

    /// A workflow definition document could not be applied.
    #[error("Failed to load workflow definitions from {source_name}: {reason}")]
    WorkflowLoad { source_name: String, reason: String },

    /// A job with this id already exists.
    #[error("Job '{id}' already exists")]
    DuplicateJob { id: String },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn join_issues(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{}: {}", issue.field, issue.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ToolweaveError {
    /// Error type name used in workflow results and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolweaveError::Validation { .. } => "ValidationError",
            ToolweaveError::ToolNotFound { .. } => "ToolNotFound",
            ToolweaveError::DuplicateTool { .. } => "DuplicateTool",
            ToolweaveError::ToolExecution { .. } => "ToolExecutionError",
            ToolweaveError::ParameterResolution(_) => "ParameterResolutionError",
            ToolweaveError::WorkflowNotFound { .. } => "WorkflowNotFound",
            ToolweaveError::WorkflowLoad { .. } => "WorkflowLoadError",
            ToolweaveError::DuplicateJob { .. } => "DuplicateJob",
            ToolweaveError::Config(_) => "ConfigError",
            ToolweaveError::Io { .. } => "IoError",
            ToolweaveError::Json(_) => "JsonError",
        }
    }

    /// Structured diagnostic payload for this error.
    pub fn context(&self) -> Value {
        match self {
            ToolweaveError::Validation { tool_name, issues } => json!({
                "toolName": tool_name,
                "issues": issues,
            }),
            ToolweaveError::ToolNotFound { name } | ToolweaveError::DuplicateTool { name } => {
                json!({ "toolName": name })
            }
            ToolweaveError::ToolExecution {
                tool_name,
                params,
                context,
                source,
                ..
            } => json!({
                "toolName": tool_name,
                "params": params,
                "context": context,
                "cause": source.as_ref().map(|s| s.to_string()),
            }),
            ToolweaveError::ParameterResolution(err) => json!({
                "path": err.path,
                "segment": err.segment,
                "reason": err.reason.to_string(),
            }),
            ToolweaveError::WorkflowNotFound { name } => json!({ "workflowName": name }),
            ToolweaveError::WorkflowLoad {
                source_name,
                reason,
            } => json!({ "source": source_name, "reason": reason }),
            ToolweaveError::DuplicateJob { id } => json!({ "jobId": id }),
            ToolweaveError::Io { path, .. } => json!({ "path": path }),
            ToolweaveError::Config(_) | ToolweaveError::Json(_) => json!({}),
        }
    }
}
