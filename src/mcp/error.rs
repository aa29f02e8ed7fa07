use crate::ToolweaveError;
use rmcp::model::{Content, ErrorCode, ErrorData, IntoContents};
use serde::Serialize;
use std::borrow::Cow;

/// Structured error response for MCP tool calls.
/// Provides error_code + suggestion so LLMs can auto-fix.
#[derive(Debug, Serialize)]
pub struct ToolError {
    pub error_code: String,
    pub message: String,
    pub suggestion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ToolError {
    fn new(code: &str, message: String, suggestion: &str) -> Self {
        Self {
            error_code: code.into(),
            message,
            suggestion: suggestion.into(),
            details: None,
        }
    }
}

impl IntoContents for ToolError {
    fn into_contents(self) -> Vec<Content> {
        let json = serde_json::to_string(&self).unwrap_or_else(|_| self.message.clone());
        vec![Content::text(json)]
    }
}

impl From<&ToolweaveError> for ToolError {
    fn from(err: &ToolweaveError) -> Self {
        let message = err.to_string();
        let mut tool_error = match err {
            ToolweaveError::Validation { .. } => ToolError::new(
                "VALIDATION_ERROR",
                message,
                "Check the listed fields against the tool's input schema. Unknown fields are rejected.",
            ),
            ToolweaveError::ToolNotFound { .. } => ToolError::new(
                "NOT_FOUND",
                message,
                "List the available tools and check the spelling of the tool name.",
            ),
            ToolweaveError::WorkflowNotFound { .. } => ToolError::new(
                "NOT_FOUND",
                message,
                "Use list_workflows to see which workflows are loaded.",
            ),
            ToolweaveError::ParameterResolution(_) => ToolError::new(
                "PARAMETER_RESOLUTION",
                message,
                "A template path points at data that does not exist. Check step ids and input keys.",
            ),
            ToolweaveError::ToolExecution { .. } => ToolError::new(
                "EXECUTION_ERROR",
                message,
                "Retry the operation or simplify the request.",
            ),
            ToolweaveError::DuplicateTool { .. } | ToolweaveError::DuplicateJob { .. } => {
                ToolError::new("CONFLICT", message, "Use a different name or id.")
            }
            ToolweaveError::Json(_) => ToolError::new(
                "INVALID_PARAMS",
                message,
                "Check parameter format and valid values.",
            ),
            ToolweaveError::WorkflowLoad { .. }
            | ToolweaveError::Config(_)
            | ToolweaveError::Io { .. } => ToolError::new(
                "INTERNAL_ERROR",
                message,
                "Check the server configuration and logs.",
            ),
        };
        tool_error.details = Some(err.context());
        tool_error
    }
}

impl From<ToolweaveError> for ErrorData {
    fn from(err: ToolweaveError) -> Self {
        let code = match &err {
            ToolweaveError::ToolNotFound { .. }
            | ToolweaveError::WorkflowNotFound { .. }
            | ToolweaveError::Validation { .. }
            | ToolweaveError::Json(_) => ErrorCode::INVALID_PARAMS,
            _ => ErrorCode::INTERNAL_ERROR,
        };
        let tool_error = ToolError::from(&err);
        ErrorData {
            code,
            message: Cow::Owned(tool_error.message),
            data: Some(serde_json::json!({
                "error_code": tool_error.error_code,
                "suggestion": tool_error.suggestion,
                "details": tool_error.details,
            })),
        }
    }
}
