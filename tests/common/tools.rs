//! Scriptable tools for driving the registry and workflows in tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use toolweave::config::ServerConfig;
use toolweave::tools::{ExecutionContext, FieldKind, InputSchema, Tool, ToolResult};

type Behaviour = dyn Fn(&Map<String, Value>) -> anyhow::Result<ToolResult> + Send + Sync;

/// A tool whose behaviour is a closure. Records every invocation.
pub struct ScriptedTool {
    name: String,
    schema: InputSchema,
    behaviour: Box<Behaviour>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(Map<String, Value>, ExecutionContext)>>,
}

impl ScriptedTool {
    pub fn new<F>(name: &str, schema: InputSchema, behaviour: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> anyhow::Result<ToolResult> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            schema,
            behaviour: Box::new(behaviour),
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Echoes the `text` parameter back as its only content item.
    pub fn echo(name: &str) -> Self {
        Self::new(
            name,
            InputSchema::new().required("text", FieldKind::Any, "Value to echo"),
            |params| {
                let text = match &params["text"] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                Ok(ToolResult::text(text))
            },
        )
    }

    /// Always fails with a plain (non-crate) error.
    pub fn failing(name: &str, message: &'static str) -> Self {
        Self::new(name, InputSchema::new(), move |_| {
            Err(anyhow::anyhow!(message))
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_invocation(&self) -> Option<(Map<String, Value>, ExecutionContext)> {
        self.seen.lock().last().cloned()
    }
}

#[async_trait]
impl Tool for ScriptedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Scripted test tool"
    }

    fn input_schema(&self) -> &InputSchema {
        &self.schema
    }

    async fn execute(
        &self,
        params: Map<String, Value>,
        _config: &ServerConfig,
        context: &ExecutionContext,
    ) -> anyhow::Result<ToolResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push((params.clone(), context.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.behaviour)(&params)
    }
}

/// Register a scripted tool and keep a handle to inspect it.
pub fn install(registry: &toolweave::tools::ToolRegistry, tool: ScriptedTool) -> Arc<ScriptedTool> {
    let tool = Arc::new(tool);
    registry.register(tool.clone());
    tool
}
