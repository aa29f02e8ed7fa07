//! Workflow command handlers: list and run.

use anyhow::Result;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::cli::handlers::parse_json_arg;
use crate::cli::output::{
    output_json, print_error, print_header, print_hint, print_kv, print_success, print_table,
    truncate, OutputMode,
};
use crate::init::AppContext;
use crate::tools::ToolResult;
use crate::workflow::WorkflowStep;

pub async fn handle_list_workflows(ctx: &AppContext, mode: OutputMode) {
    let workflows = ctx.workflows.list_workflows().await;

    if mode == OutputMode::Json {
        let listing: Vec<Value> = workflows
            .iter()
            .map(|(name, description)| json!({ "name": name, "description": description }))
            .collect();
        output_json(&listing);
        return;
    }

    if workflows.is_empty() && ctx.config.workflows_path.is_none() {
        print_hint(
            "No workflow file configured. Pass --workflows <file> or set TOOLWEAVE_WORKFLOWS.",
        );
        return;
    }

    let mut rows = Vec::with_capacity(workflows.len());
    for (name, description) in &workflows {
        let steps = ctx
            .workflows
            .get_definition(name)
            .await
            .map(|def| def.steps.len())
            .unwrap_or(0);
        rows.push(vec![
            name.clone(),
            truncate(description, 60),
            steps.to_string(),
        ]);
    }
    print_table(&["Workflow", "Description", "Steps"], rows);
}

/// One row per executed step, in definition order.
fn step_rows(
    steps: &[WorkflowStep],
    results: &BTreeMap<String, ToolResult>,
) -> Vec<Vec<String>> {
    steps
        .iter()
        .filter_map(|step| {
            let result = results.get(&step.id)?;
            Some(vec![
                step.id.clone(),
                if result.is_error() { "error" } else { "ok" }.to_string(),
                truncate(result.first_text().unwrap_or(""), 70),
            ])
        })
        .collect()
}

pub async fn handle_run_workflow(
    ctx: &AppContext,
    name: &str,
    input: Option<&str>,
    mode: OutputMode,
) -> Result<()> {
    let input = parse_json_arg(input, "input")?;
    let result = ctx
        .workflows
        .execute_workflow(name, input, &ctx.config, &ctx.config.session_id)
        .await;

    if mode == OutputMode::Json {
        output_json(&result);
    } else {
        if let Some(step_results) = &result.step_results {
            let steps = ctx
                .workflows
                .get_definition(name)
                .await
                .map(|def| def.steps)
                .unwrap_or_default();
            print_header("Steps");
            print_table(&["Step", "Status", "Output"], step_rows(&steps, step_results));
        }

        if let Some(outputs) = &result.outputs {
            print_header("Outputs");
            for (key, value) in outputs {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                print_kv(key, &rendered);
            }
        }

        if result.success {
            print_success(&result.message);
        } else {
            print_error(&result.message);
        }
    }

    if !result.success {
        anyhow::bail!("workflow '{}' did not complete", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str) -> WorkflowStep {
        serde_json::from_value(json!({ "id": id, "toolName": "echo" })).unwrap()
    }

    #[test]
    fn test_step_rows_follow_definition_order() {
        let steps = vec![step("zeta"), step("alpha"), step("mid"), step("skipped")];
        let mut results = BTreeMap::new();
        results.insert("alpha".to_string(), ToolResult::text("second"));
        results.insert("zeta".to_string(), ToolResult::text("first"));
        results.insert("mid".to_string(), ToolResult::text("third"));

        let rows = step_rows(&steps, &results);
        let ids: Vec<&str> = rows.iter().map(|row| row[0].as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
        assert_eq!(rows[0][1], "ok");
        assert_eq!(rows[0][2], "first");
    }
}
