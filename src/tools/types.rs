use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

/// Content type tag for plain text items.
pub const TEXT_CONTENT: &str = "text";

/// One item of tool output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: TEXT_CONTENT.to_string(),
            text: text.into(),
        }
    }
}

/// Result of a single tool invocation.
///
/// `content` must be non-empty; the registry rejects results that are not.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ContentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ToolResult {
    /// Successful result with a single text item.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            ..Default::default()
        }
    }

    /// Result flagged as an error, with optional structured details.
    pub fn error(text: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: Some(true),
            error_details: details,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Text of the first content item, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().map(|item| item.text.as_str())
    }

    /// A result is well-formed when it has at least one item and every item
    /// carries a type tag.
    pub fn is_well_formed(&self) -> bool {
        !self.content.is_empty()
            && self
                .content
                .iter()
                .all(|item| !item.content_type.trim().is_empty())
    }
}

/// Ambient identifiers handed to every tool invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Cancelled when the caller abandons the invocation.
    #[serde(skip)]
    pub cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    pub fn with_workflow(mut self, workflow_id: &str, step_id: &str) -> Self {
        self.workflow_id = Some(workflow_id.to_string());
        self.step_id = Some(step_id.to_string());
        self
    }

    pub fn with_job(mut self, job_id: &str) -> Self {
        self.job_id = Some(job_id.to_string());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_serializes_camel_case() {
        let result = ToolResult::error("boom", Some(serde_json::json!({"code": 7})));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["isError"], true);
        assert_eq!(value["errorDetails"]["code"], 7);
        assert_eq!(value["content"][0]["type"], "text");
        assert!(value.get("metadata").is_none());
    }

    #[test]
    fn test_well_formed_checks() {
        assert!(ToolResult::text("ok").is_well_formed());
        assert!(!ToolResult::default().is_well_formed());

        let untyped = ToolResult {
            content: vec![ContentItem {
                content_type: " ".into(),
                text: "x".into(),
            }],
            ..Default::default()
        };
        assert!(!untyped.is_well_formed());
    }

    #[test]
    fn test_context_skips_cancellation_token() {
        let ctx = ExecutionContext::new("s1").with_workflow("wf", "step1");
        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["workflowId"], "wf");
        assert_eq!(value["stepId"], "step1");
        assert!(value.get("cancellation").is_none());
        assert!(value.get("jobId").is_none());
    }
}
