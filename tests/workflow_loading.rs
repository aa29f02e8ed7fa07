/// Integration tests for loading workflow definition files
mod common;

use common::TestHarness;
use toolweave::ToolweaveError;

const GREET: &str = r#"{
    "workflows": {
        "greet": {
            "description": "Say hello",
            "steps": [ { "id": "hi", "toolName": "echo", "params": { "text": "hello" } } ]
        }
    }
}"#;

async fn loaded_names(harness: &TestHarness) -> Vec<String> {
    harness
        .workflows
        .list_workflows()
        .await
        .into_iter()
        .map(|(name, _)| name)
        .collect()
}

#[tokio::test]
async fn test_load_from_file() {
    let harness = TestHarness::new();
    let path = harness.write_file("workflows.json", GREET);

    let count = harness.workflows.load_definitions(&path).await.unwrap();
    assert_eq!(count, 1);

    let definition = harness.workflows.get_definition("greet").await.unwrap();
    assert_eq!(definition.description, "Say hello");
    assert_eq!(definition.steps[0].tool_name, "echo");
}

#[tokio::test]
async fn test_missing_file_keeps_current_definitions() {
    let harness = TestHarness::new();
    let path = harness.write_file("workflows.json", GREET);
    harness.workflows.load_definitions(&path).await.unwrap();

    let missing = harness.temp_dir.path().join("nope.json");
    let err = harness.workflows.load_definitions(&missing).await.unwrap_err();
    assert!(matches!(err, ToolweaveError::WorkflowLoad { .. }));
    assert_eq!(loaded_names(&harness).await, vec!["greet"]);
}

#[tokio::test]
async fn test_malformed_documents_keep_current_definitions() {
    let harness = TestHarness::new();
    let path = harness.write_file("workflows.json", GREET);
    harness.workflows.load_definitions(&path).await.unwrap();

    for (name, bad) in [
        ("truncated.json", r#"{"workflows": {"#),
        ("no_key.json", r#"{"flows": {}}"#),
        (
            "dup_steps.json",
            r#"{"workflows": {"x": {"steps": [
                {"id": "a", "toolName": "echo"},
                {"id": "a", "toolName": "echo"}
            ]}}}"#,
        ),
    ] {
        let bad_path = harness.write_file(name, bad);
        let err = harness.workflows.load_definitions(&bad_path).await.unwrap_err();
        assert_eq!(err.kind(), "WorkflowLoadError", "{}", name);
        assert_eq!(loaded_names(&harness).await, vec!["greet"], "{}", name);
    }
}

#[tokio::test]
async fn test_reload_replaces_whole_snapshot() {
    let harness = TestHarness::new();
    let path = harness.write_file("workflows.json", GREET);
    harness.workflows.load_definitions(&path).await.unwrap();

    let replacement = harness.write_file(
        "replacement.json",
        r#"{"workflows": {
            "a": {"steps": []},
            "b": {"description": "second", "steps": []}
        }}"#,
    );
    assert_eq!(harness.workflows.load_definitions(&replacement).await.unwrap(), 2);
    assert_eq!(loaded_names(&harness).await, vec!["a", "b"]);
    assert!(harness.workflows.get_definition("greet").await.is_none());
}
