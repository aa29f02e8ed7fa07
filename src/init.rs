//! Shared initialization logic for MCP and CLI modes.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::events::NotificationHub;
use crate::jobs::{JobRunner, JobStore};
use crate::tools::builtin::register_builtin_tools;
use crate::tools::ToolRegistry;
use crate::workflow::WorkflowExecutor;

/// Application context holding all services.
///
/// Shared between MCP server and CLI commands. Services are constructed here
/// and handed out as `Arc`s; nothing in the crate is a global.
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub hub: Arc<NotificationHub>,
    pub jobs: Arc<JobStore>,
    pub runner: JobRunner,
    pub registry: Arc<ToolRegistry>,
    pub workflows: Arc<WorkflowExecutor>,
}

impl AppContext {
    /// Build every service and register the built-in tools.
    ///
    /// Workflow definitions are loaded from `config.workflows_path` when set.
    /// A definition file that fails to load is logged and leaves the
    /// executor empty; it never prevents startup.
    pub async fn new(config: ServerConfig) -> Self {
        let config = Arc::new(config);

        let hub = Arc::new(NotificationHub::new());
        let jobs = Arc::new(JobStore::new(hub.clone()));
        let runner = JobRunner::new(jobs.clone(), config.job_timeout());

        let registry = Arc::new(ToolRegistry::new());
        register_builtin_tools(&registry, &runner);
        tracing::info!("{} tools registered", registry.len());

        let workflows = Arc::new(WorkflowExecutor::new(registry.clone()));
        if let Some(path) = &config.workflows_path {
            if let Err(e) = workflows.load_definitions(path).await {
                tracing::warn!("Starting without workflows: {}", e);
            }
        }

        Self {
            config,
            hub,
            jobs,
            runner,
            registry,
            workflows,
        }
    }

    /// Release resources owned by the process: closes every observer stream.
    pub fn shutdown(&self) {
        let in_flight = self.runner.in_flight();
        if in_flight > 0 {
            tracing::warn!("Shutting down with {} background jobs still running", in_flight);
        }
        self.hub.shutdown();
    }
}
