//! CLI command handlers.

pub mod tools;
pub mod workflow;

use anyhow::{Context, Result};
use serde_json::Value;

/// Parse an optional JSON argument, defaulting to an empty object.
pub(crate) fn parse_json_arg(raw: Option<&str>, flag: &str) -> Result<Value> {
    match raw {
        Some(text) => serde_json::from_str(text)
            .with_context(|| format!("--{} must be valid JSON", flag)),
        None => Ok(Value::Object(Default::default())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_json_arg() {
        assert_eq!(parse_json_arg(None, "params").unwrap(), json!({}));
        assert_eq!(
            parse_json_arg(Some(r#"{"a": 1}"#), "params").unwrap(),
            json!({"a": 1})
        );
        let err = parse_json_arg(Some("{"), "input").unwrap_err();
        assert!(err.to_string().contains("--input"));
    }
}
