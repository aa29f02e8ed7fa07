use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::config::ServerConfig;
use crate::tools::{ExecutionContext, ToolRegistry};
use crate::workflow::definition::{
    WorkflowDefinition, WorkflowError, WorkflowFile, WorkflowResult, WorkflowStep,
};
use crate::workflow::resolver::{resolve_with, PlaceholderPolicy};
use crate::ToolweaveError;

type Snapshot = Arc<HashMap<String, WorkflowDefinition>>;

/// Runs named workflows step by step through the tool registry.
pub struct WorkflowExecutor {
    registry: Arc<ToolRegistry>,
    definitions: RwLock<Snapshot>,
}

impl WorkflowExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            definitions: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Load definitions from a JSON file, replacing the current snapshot.
    ///
    /// On any failure the previous snapshot stays in place.
    pub async fn load_definitions(&self, path: &Path) -> Result<usize, ToolweaveError> {
        let source_name = path.display().to_string();
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    path = %source_name,
                    "Workflow definition file not found; keeping current definitions"
                );
                return Err(ToolweaveError::WorkflowLoad {
                    source_name,
                    reason: "file not found".to_string(),
                });
            }
            Err(source) => {
                tracing::error!(
                    path = %source_name,
                    error = %source,
                    "Failed to read workflow definitions"
                );
                return Err(ToolweaveError::Io {
                    path: source_name,
                    source,
                });
            }
        };
        self.load_definitions_from_str(&text, &source_name).await
    }

    /// Parse a definition document and swap it in as the new snapshot.
    pub async fn load_definitions_from_str(
        &self,
        text: &str,
        source_name: &str,
    ) -> Result<usize, ToolweaveError> {
        let parsed = parse_document(text).inspect_err(|reason| {
            tracing::error!(source = source_name, %reason, "Rejected workflow definitions");
        });
        let workflows = parsed.map_err(|reason| ToolweaveError::WorkflowLoad {
            source_name: source_name.to_string(),
            reason,
        })?;

        let count = workflows.len();
        *self.definitions.write().await = Arc::new(workflows);
        tracing::info!(source = source_name, count, "Workflow definitions loaded");
        Ok(count)
    }

    /// Names and descriptions of loaded workflows, sorted by name.
    pub async fn list_workflows(&self) -> Vec<(String, String)> {
        let snapshot = self.snapshot().await;
        let mut list: Vec<_> = snapshot
            .iter()
            .map(|(name, def)| (name.clone(), def.description.clone()))
            .collect();
        list.sort();
        list
    }

    pub async fn get_definition(&self, name: &str) -> Option<WorkflowDefinition> {
        self.snapshot().await.get(name).cloned()
    }

    async fn snapshot(&self) -> Snapshot {
        self.definitions.read().await.clone()
    }

    pub async fn execute_workflow(
        &self,
        name: &str,
        input: Value,
        config: &ServerConfig,
        session_id: &str,
    ) -> WorkflowResult {
        self.execute_workflow_with_cancel(
            name,
            input,
            config,
            session_id,
            CancellationToken::new(),
        )
        .await
    }

    /// Run a workflow; `cancel` is handed to every step invocation.
    #[instrument(
        name = "workflow.execute",
        skip_all,
        fields(workflow = %name, session = %session_id)
    )]
    pub async fn execute_workflow_with_cancel(
        &self,
        name: &str,
        input: Value,
        config: &ServerConfig,
        session_id: &str,
        cancel: CancellationToken,
    ) -> WorkflowResult {
        let snapshot = self.snapshot().await;
        let Some(definition) = snapshot.get(name) else {
            tracing::warn!("Workflow not found");
            let err = ToolweaveError::WorkflowNotFound {
                name: name.to_string(),
            };
            return WorkflowResult {
                success: false,
                message: err.to_string(),
                step_results: None,
                outputs: None,
                error: Some(WorkflowError {
                    step_id: None,
                    tool_name: None,
                    message: err.to_string(),
                    error_type: err.kind().to_string(),
                    details: Some(err.context()),
                }),
            };
        };

        tracing::info!(steps = definition.steps.len(), "Workflow started");

        let mut context = json!({ "workflow": { "input": input }, "steps": {} });
        let mut step_results = BTreeMap::new();

        for (index, step) in definition.steps.iter().enumerate() {
            let number = index + 1;
            tracing::debug!(
                step = %step.id,
                tool = %step.tool_name,
                number,
                "Running workflow step"
            );

            let outcome = match resolve_step_params(step, &context) {
                Ok(params) => {
                    let step_context = ExecutionContext::new(session_id)
                        .with_workflow(name, &step.id)
                        .with_cancellation(cancel.child_token());
                    self.registry
                        .execute(&step.tool_name, params, config, step_context)
                        .await
                }
                Err(err) => Err(err),
            };

            let result = match outcome {
                Ok(result) => result,
                Err(err) => {
                    tracing::error!(step = %step.id, number, "Workflow step failed: {}", err);
                    return WorkflowResult {
                        success: false,
                        message: format!(
                            "Workflow \"{}\" failed at step {} ({}): {}",
                            name, number, step.tool_name, err
                        ),
                        step_results: Some(step_results),
                        outputs: None,
                        error: Some(WorkflowError {
                            step_id: Some(step.id.clone()),
                            tool_name: Some(step.tool_name.clone()),
                            message: err.to_string(),
                            error_type: err.kind().to_string(),
                            details: Some(err.context()),
                        }),
                    };
                }
            };

            if result.is_error() {
                tracing::warn!(step = %step.id, "Step tool reported an error result; continuing");
            }
            context["steps"][step.id.as_str()] = json!({ "output": result });
            step_results.insert(step.id.clone(), result);
        }

        let outputs = definition
            .output
            .as_ref()
            .map(|templates| resolve_outputs(templates, &context));

        tracing::info!("Workflow completed");
        WorkflowResult {
            success: true,
            message: format!("Workflow \"{}\" completed successfully.", name),
            step_results: Some(step_results),
            outputs,
            error: None,
        }
    }
}

fn parse_document(text: &str) -> Result<HashMap<String, WorkflowDefinition>, String> {
    let document: Value =
        serde_json::from_str(text).map_err(|e| format!("malformed JSON: {}", e))?;
    if document.get("workflows").is_none() {
        return Err("document has no \"workflows\" key".to_string());
    }
    let file: WorkflowFile =
        serde_json::from_value(document).map_err(|e| format!("invalid definition: {}", e))?;

    let mut problems: Vec<String> = file
        .workflows
        .iter()
        .flat_map(|(name, def)| {
            def.problems()
                .into_iter()
                .map(move |p| format!("workflow '{}': {}", name, p))
        })
        .collect();
    if !problems.is_empty() {
        problems.sort();
        return Err(problems.join("; "));
    }
    Ok(file.workflows)
}

fn resolve_step_params(step: &WorkflowStep, context: &Value) -> Result<Value, ToolweaveError> {
    let mut params = Map::new();
    for (key, template) in &step.params {
        let value = match template {
            Value::String(text) => resolve_with(text, context, PlaceholderPolicy::Abort)?,
            literal => literal.clone(),
        };
        params.insert(key.clone(), value);
    }
    Ok(Value::Object(params))
}

fn resolve_outputs(
    templates: &BTreeMap<String, String>,
    context: &Value,
) -> BTreeMap<String, Value> {
    templates
        .iter()
        .map(|(key, template)| {
            let value = resolve_with(template, context, PlaceholderPolicy::Tolerate)
                .unwrap_or_else(|err| {
                    tracing::warn!(output = %key, "Output template failed: {}", err);
                    Value::String(format!("Error: Failed to resolve output template: {}", err))
                });
            (key.clone(), value)
        })
        .collect()
}
