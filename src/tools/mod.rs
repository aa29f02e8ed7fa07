//! Tool contract, registry and built-in tools.

pub mod builtin;
pub mod registry;
pub mod schema;
pub mod types;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::config::ServerConfig;

pub use registry::ToolRegistry;
pub use schema::{FieldIssue, FieldKind, InputSchema};
pub use types::{ContentItem, ExecutionContext, ToolResult};

/// A named, schema-validated unit of work.
///
/// Implementations receive parameters that already passed their
/// [`InputSchema`]. Returning an error of type [`crate::ToolweaveError`]
/// passes it through the registry unchanged; any other error is wrapped as a
/// tool execution failure.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> &InputSchema;

    async fn execute(
        &self,
        params: Map<String, Value>,
        config: &ServerConfig,
        context: &ExecutionContext,
    ) -> anyhow::Result<ToolResult>;
}
