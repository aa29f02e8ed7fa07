//! Test harness wiring the core services together.
//!
//! Each TestHarness owns its own registry, hub, job store and workflow
//! executor plus a temporary directory for definition files.

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use toolweave::config::ServerConfig;
use toolweave::events::NotificationHub;
use toolweave::jobs::JobStore;
use toolweave::tools::ToolRegistry;
use toolweave::workflow::WorkflowExecutor;

use super::tools::{install, ScriptedTool};

pub struct TestHarness {
    pub config: ServerConfig,
    pub registry: Arc<ToolRegistry>,
    pub hub: Arc<NotificationHub>,
    pub jobs: Arc<JobStore>,
    pub workflows: WorkflowExecutor,
    /// Temporary directory (kept alive while harness exists)
    pub temp_dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let hub = Arc::new(NotificationHub::new());
        let jobs = Arc::new(JobStore::new(hub.clone()));
        let registry = Arc::new(ToolRegistry::new());
        let workflows = WorkflowExecutor::new(registry.clone());
        Self {
            config: ServerConfig::default(),
            registry,
            hub,
            jobs,
            workflows,
            temp_dir,
        }
    }

    pub fn install(&self, tool: ScriptedTool) -> Arc<ScriptedTool> {
        install(&self.registry, tool)
    }

    /// Write a file into the harness directory and return its path.
    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, contents).expect("Failed to write test file");
        path
    }

    /// Load workflow definitions from an in-memory JSON document.
    pub async fn load_workflows(&self, document: serde_json::Value) {
        self.workflows
            .load_definitions_from_str(&document.to_string(), "test")
            .await
            .expect("Failed to load test workflows");
    }
}
