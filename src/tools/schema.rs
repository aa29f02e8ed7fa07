//! Closed input schemas for tools.
//!
//! A schema is an ordered set of named fields, each with a kind and a
//! required flag. Validation is closed: keys the schema does not declare are
//! rejected. Every problem is collected so a caller sees all of them at once.

use serde::Serialize;
use serde_json::{json, Map, Value};

/// A single validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Value kind accepted by a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Any,
}

impl FieldKind {
    fn json_type(self) -> Option<&'static str> {
        match self {
            FieldKind::String => Some("string"),
            FieldKind::Integer => Some("integer"),
            FieldKind::Number => Some("number"),
            FieldKind::Boolean => Some("boolean"),
            FieldKind::Object => Some("object"),
            FieldKind::Array => Some("array"),
            FieldKind::Any => None,
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Number => value.is_number(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
            FieldKind::Any => true,
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub description: Option<String>,
    pub allowed: Option<Vec<String>>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
}

impl FieldSpec {
    fn check(&self, value: &Value, issues: &mut Vec<FieldIssue>) {
        if !self.kind.accepts(value) {
            let expected = self.kind.json_type().unwrap_or("any");
            issues.push(FieldIssue::new(
                &self.name,
                format!("expected {}, received {}", expected, describe(value)),
            ));
            return;
        }

        if let (Some(allowed), Some(s)) = (&self.allowed, value.as_str()) {
            if !allowed.iter().any(|a| a == s) {
                issues.push(FieldIssue::new(
                    &self.name,
                    format!("'{}' is not one of: {}", s, allowed.join(", ")),
                ));
            }
        }

        if let Some(n) = value.as_i64() {
            if let Some(min) = self.minimum {
                if n < min {
                    issues.push(FieldIssue::new(
                        &self.name,
                        format!("must be >= {}, received {}", min, n),
                    ));
                }
            }
            if let Some(max) = self.maximum {
                if n > max {
                    issues.push(FieldIssue::new(
                        &self.name,
                        format!("must be <= {}, received {}", max, n),
                    ));
                }
            }
        }
    }
}

/// Closed field → validator map for a tool's parameters.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    fn field(mut self, name: &str, kind: FieldKind, required: bool, description: &str) -> Self {
        self.fields.retain(|f| f.name != name);
        self.fields.push(FieldSpec {
            name: name.to_string(),
            kind,
            required,
            description: (!description.is_empty()).then(|| description.to_string()),
            allowed: None,
            minimum: None,
            maximum: None,
        });
        self
    }

    pub fn required(self, name: &str, kind: FieldKind, description: &str) -> Self {
        self.field(name, kind, true, description)
    }

    pub fn optional(self, name: &str, kind: FieldKind, description: &str) -> Self {
        self.field(name, kind, false, description)
    }

    /// Restrict the most recently added string field to a fixed set of values.
    pub fn one_of(mut self, values: &[&str]) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.allowed = Some(values.iter().map(|v| v.to_string()).collect());
        }
        self
    }

    /// Bound the most recently added integer field.
    pub fn range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.minimum = min;
            last.maximum = max;
        }
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Validate raw parameters and return them as an object.
    ///
    /// `null` is treated as an empty object so tools without fields accept a
    /// missing argument list.
    pub fn validate(&self, raw: &Value) -> Result<Map<String, Value>, Vec<FieldIssue>> {
        let params = match raw {
            Value::Object(map) => map.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(vec![FieldIssue::new(
                    "(root)",
                    format!("expected object, received {}", describe(other)),
                )])
            }
        };

        let mut issues = Vec::new();

        for key in params.keys() {
            if !self.fields.iter().any(|f| &f.name == key) {
                issues.push(FieldIssue::new(key, "unrecognized field"));
            }
        }

        for spec in &self.fields {
            match params.get(&spec.name) {
                None | Some(Value::Null) if spec.required => {
                    issues.push(FieldIssue::new(&spec.name, "required field is missing"));
                }
                None | Some(Value::Null) => {}
                Some(value) => spec.check(value, &mut issues),
            }
        }

        if issues.is_empty() {
            Ok(params)
        } else {
            Err(issues)
        }
    }

    /// Render as a JSON Schema object for protocol tool listings.
    pub fn to_json_schema(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        for spec in &self.fields {
            let mut prop = Map::new();
            if let Some(t) = spec.kind.json_type() {
                prop.insert("type".into(), json!(t));
            }
            if let Some(desc) = &spec.description {
                prop.insert("description".into(), json!(desc));
            }
            if let Some(allowed) = &spec.allowed {
                prop.insert("enum".into(), json!(allowed));
            }
            if let Some(min) = spec.minimum {
                prop.insert("minimum".into(), json!(min));
            }
            if let Some(max) = spec.maximum {
                prop.insert("maximum".into(), json!(max));
            }
            properties.insert(spec.name.clone(), Value::Object(prop));
        }

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect();

        let mut schema = Map::new();
        schema.insert("type".into(), json!("object"));
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), json!(required));
        }
        schema.insert("additionalProperties".into(), json!(false));
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn schema() -> InputSchema {
        InputSchema::new()
            .required("message", FieldKind::String, "Text to echo")
            .optional("repeat", FieldKind::Integer, "")
            .range(Some(1), Some(10))
            .optional("mode", FieldKind::String, "")
            .one_of(&["plain", "upper"])
    }

    #[test]
    fn test_accepts_valid_params() {
        let params = schema()
            .validate(&json!({"message": "hi", "repeat": 2}))
            .unwrap();
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_null_treated_as_empty_object() {
        let empty = InputSchema::new();
        assert!(empty.validate(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_reports_every_issue() {
        let issues = schema()
            .validate(&json!({"repeat": 50, "mode": "loud", "bogus": true}))
            .unwrap_err();
        let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["bogus", "message", "repeat", "mode"]);
    }

    #[test]
    fn test_type_mismatch() {
        let issues = schema().validate(&json!({"message": 5})).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].message, "expected string, received integer");
    }

    #[test]
    fn test_rejects_non_object_root() {
        let issues = schema().validate(&json!(["message"])).unwrap_err();
        assert_eq!(issues[0].field, "(root)");
    }

    #[test]
    fn test_json_schema_is_closed() {
        let rendered = schema().to_json_schema();
        assert_eq!(rendered["additionalProperties"], json!(false));
        assert_eq!(rendered["required"], json!(["message"]));
        assert_eq!(rendered["properties"]["repeat"]["maximum"], json!(10));
        assert_eq!(
            rendered["properties"]["mode"]["enum"],
            json!(["plain", "upper"])
        );
    }
}
