use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::ToolweaveError;

/// Lifecycle: `Pending → Running → {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Full identity of the error a job failed with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    /// Error type name, e.g. `ToolExecutionError` or `TimeoutError`.
    pub name: String,
    pub message: String,
    /// Messages of the underlying causes, outermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl JobError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            chain: Vec::new(),
            details: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        if let Some(typed) = err.downcast_ref::<ToolweaveError>() {
            return Self::from(typed);
        }
        Self {
            name: "Error".to_string(),
            message: err.to_string(),
            chain: err.chain().skip(1).map(|cause| cause.to_string()).collect(),
            details: None,
        }
    }
}

impl From<&ToolweaveError> for JobError {
    fn from(err: &ToolweaveError) -> Self {
        let mut chain = Vec::new();
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        Self {
            name: err.kind().to_string(),
            message: err.to_string(),
            chain,
            details: Some(err.context()),
        }
    }
}

/// A tracked unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Job {
    pub(crate) fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            progress_message: None,
            result: None,
            error: None,
            tool_name: None,
            params: None,
        }
    }

    /// Advance `updated_at`, never moving it backwards.
    pub(crate) fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

/// Job-lifecycle notification payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum JobEvent {
    JobCreated { job_id: String, status: JobStatus },
    JobUpdated { job_id: String, status: JobStatus },
    JobCompleted { job_id: String, result: Value },
    JobFailed { job_id: String, error: JobError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_payload_shapes() {
        let created = JobEvent::JobCreated {
            job_id: "j1".into(),
            status: JobStatus::Pending,
        };
        assert_eq!(
            serde_json::to_value(&created).unwrap(),
            json!({"type": "JOB_CREATED", "jobId": "j1", "status": "pending"})
        );

        let failed = JobEvent::JobFailed {
            job_id: "j1".into(),
            error: JobError::new("TimeoutError", "too slow"),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({
                "type": "JOB_FAILED",
                "jobId": "j1",
                "error": {"name": "TimeoutError", "message": "too slow"}
            })
        );
    }

    #[test]
    fn test_job_error_from_anyhow_keeps_chain() {
        let err = anyhow::anyhow!("connection refused").context("fetching model list");
        let job_error = JobError::from_anyhow(&err);
        assert_eq!(job_error.name, "Error");
        assert_eq!(job_error.message, "fetching model list");
        assert_eq!(job_error.chain, vec!["connection refused".to_string()]);
    }

    #[test]
    fn test_job_error_from_typed_error() {
        let err: anyhow::Error = ToolweaveError::ToolNotFound { name: "x".into() }.into();
        let job_error = JobError::from_anyhow(&err);
        assert_eq!(job_error.name, "ToolNotFound");
        assert_eq!(job_error.details, Some(json!({"toolName": "x"})));
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut job = Job::new("j".into());
        assert_eq!(job.created_at, job.updated_at);
        let before = job.updated_at;
        job.touch();
        assert!(job.updated_at >= before);
    }
}
