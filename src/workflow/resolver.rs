//! Template and path resolution for workflow parameters and outputs.
//!
//! A template is either exactly one `{path}` expression, which resolves to
//! the referenced value with its original JSON type, or free text with any
//! number of embedded `{path}` placeholders, which resolves to a string.
//!
//! Paths are dot-separated keys; each segment may end with a single `[n]`
//! index, e.g. `steps.fetch.output.content[0].text`.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Text substituted for an object or array inside embedded templates.
pub const COMPLEX_VALUE_PLACEHOLDER: &str = "[complex value]";

/// What to do when an embedded placeholder fails to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderPolicy {
    /// Fail the whole template on the first unresolved placeholder.
    Abort,
    /// Keep the placeholder text as-is and carry on.
    Tolerate,
}

/// Why a path segment could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionFailure {
    MissingKey,
    NotAnArray,
    IndexOutOfBounds { index: usize, len: usize },
    NullTraversal,
    MalformedSegment,
}

impl fmt::Display for ResolutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionFailure::MissingKey => write!(f, "key not found"),
            ResolutionFailure::NotAnArray => write!(f, "index applied to a non-array value"),
            ResolutionFailure::IndexOutOfBounds { index, len } => {
                write!(f, "index {} out of bounds (length {})", index, len)
            }
            ResolutionFailure::NullTraversal => write!(f, "cannot traverse through null"),
            ResolutionFailure::MalformedSegment => write!(f, "malformed path segment"),
        }
    }
}

/// A template path failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to resolve path '{path}' at segment '{segment}': {reason}")]
pub struct ResolutionError {
    pub path: String,
    pub segment: String,
    pub reason: ResolutionFailure,
}

struct Segment<'a> {
    raw: &'a str,
    key: &'a str,
    index: Option<usize>,
}

fn parse_segment(raw: &str) -> Option<Segment<'_>> {
    let (key, index) = match raw.find('[') {
        Some(open) => {
            let inner = raw[open + 1..].strip_suffix(']')?;
            if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            (&raw[..open], Some(inner.parse().ok()?))
        }
        None if raw.contains(']') => return None,
        None => (raw, None),
    };
    if key.is_empty() {
        return None;
    }
    Some(Segment { raw, key, index })
}

/// Resolve a dotted path against `context`.
pub fn resolve_path<'a>(path: &str, context: &'a Value) -> Result<&'a Value, ResolutionError> {
    let fail = |segment: &str, reason| ResolutionError {
        path: path.to_string(),
        segment: segment.to_string(),
        reason,
    };

    let mut current = context;
    for raw in path.trim().split('.') {
        let segment =
            parse_segment(raw).ok_or_else(|| fail(raw, ResolutionFailure::MalformedSegment))?;

        current = match current {
            Value::Object(map) => map
                .get(segment.key)
                .ok_or_else(|| fail(segment.raw, ResolutionFailure::MissingKey))?,
            Value::Null => return Err(fail(segment.raw, ResolutionFailure::NullTraversal)),
            _ => return Err(fail(segment.raw, ResolutionFailure::MissingKey)),
        };

        if let Some(index) = segment.index {
            let items = current
                .as_array()
                .ok_or_else(|| fail(segment.raw, ResolutionFailure::NotAnArray))?;
            current = items.get(index).ok_or_else(|| {
                fail(
                    segment.raw,
                    ResolutionFailure::IndexOutOfBounds {
                        index,
                        len: items.len(),
                    },
                )
            })?;
        }
    }
    Ok(current)
}

/// If the whole template is a single `{path}`, return the path.
fn exact_expression(template: &str) -> Option<&str> {
    let inner = template.strip_prefix('{')?.strip_suffix('}')?;
    if inner.is_empty() || inner.contains('{') || inner.contains('}') {
        return None;
    }
    Some(inner)
}

fn render_scalar(value: &Value, path: &str) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(_) | Value::Object(_) => {
            tracing::warn!(
                path,
                "Embedded placeholder resolved to a complex value; substituting placeholder text"
            );
            COMPLEX_VALUE_PLACEHOLDER.to_string()
        }
    }
}

/// Resolve a template using [`PlaceholderPolicy::Abort`].
pub fn resolve(template: &str, context: &Value) -> Result<Value, ResolutionError> {
    resolve_with(template, context, PlaceholderPolicy::Abort)
}

/// Resolve a template.
///
/// Failures in the single-expression form always propagate. In the embedded
/// form `policy` decides whether one unresolved placeholder fails the whole
/// template.
pub fn resolve_with(
    template: &str,
    context: &Value,
    policy: PlaceholderPolicy,
) -> Result<Value, ResolutionError> {
    if let Some(path) = exact_expression(template) {
        return resolve_path(path, context).cloned();
    }

    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let after_open = &rest[open + 1..];
        let Some(close) = after_open.find('}') else {
            break;
        };
        let candidate = &after_open[..close];

        // A nested '{' means the earlier brace was literal text.
        if let Some(nested) = candidate.rfind('{') {
            rendered.push_str(&rest[..open + 1 + nested]);
            rest = &rest[open + 1 + nested..];
            continue;
        }

        rendered.push_str(&rest[..open]);
        let placeholder = &rest[open..open + close + 2];

        if candidate.trim().is_empty() {
            rendered.push_str(placeholder);
        } else {
            match resolve_path(candidate, context) {
                Ok(value) => rendered.push_str(&render_scalar(value, candidate)),
                Err(err) => match policy {
                    PlaceholderPolicy::Abort => return Err(err),
                    PlaceholderPolicy::Tolerate => {
                        tracing::warn!("Leaving unresolved placeholder {}: {}", placeholder, err);
                        rendered.push_str(placeholder);
                    }
                },
            }
        }
        rest = &rest[open + close + 2..];
    }

    rendered.push_str(rest);
    Ok(Value::String(rendered))
}
