//! Tool command handlers: list and call.

use anyhow::Result;
use serde_json::{json, Value};

use crate::cli::handlers::parse_json_arg;
use crate::cli::output::{
    output_json, print_error, print_hint, print_table, truncate, OutputMode,
};
use crate::init::AppContext;
use crate::tools::ExecutionContext;

pub fn handle_list_tools(ctx: &AppContext, mode: OutputMode) {
    let tools = ctx.registry.get_all_tools();

    if mode == OutputMode::Json {
        let listing: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name(),
                    "description": tool.description(),
                    "inputSchema": tool.input_schema().to_json_schema(),
                })
            })
            .collect();
        output_json(&listing);
        return;
    }

    let rows = tools
        .iter()
        .map(|tool| {
            let required: Vec<&str> = tool
                .input_schema()
                .fields()
                .iter()
                .filter(|f| f.required)
                .map(|f| f.name.as_str())
                .collect();
            vec![
                tool.name().to_string(),
                truncate(tool.description(), 70),
                required.join(", "),
            ]
        })
        .collect();
    print_table(&["Tool", "Description", "Required"], rows);
    print_hint("Run a tool with: toolweave call <tool> --params '{...}'");
}

pub async fn handle_call_tool(
    ctx: &AppContext,
    tool: &str,
    params: Option<&str>,
    mode: OutputMode,
) -> Result<()> {
    let params = parse_json_arg(params, "params")?;
    let context = ExecutionContext::new(&ctx.config.session_id);
    let result = ctx
        .registry
        .execute(tool, params, &ctx.config, context)
        .await?;

    if mode == OutputMode::Json {
        output_json(&result);
        return Ok(());
    }

    for item in &result.content {
        if result.is_error() {
            print_error(&item.text);
        } else {
            println!("{}", item.text);
        }
    }
    Ok(())
}
