//! Asynchronous job tracking.
//!
//! [`JobStore`] owns job state and announces every transition on the
//! notification hub. [`JobRunner`] is the async-tool pattern on top of it:
//! hand it a future, get a job id back, poll the job later through
//! [`JobView`].

pub mod runner;
pub mod store;
pub mod types;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::tools::ToolResult;

pub use runner::{JobHandle, JobRunner};
pub use store::{JobStore, JOB_EVENT};
pub use types::{Job, JobError, JobEvent, JobStatus};

/// What a client sees when it asks about a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum JobView {
    NotFound {
        job_id: String,
    },
    Pending {
        job_id: String,
        created_at: DateTime<Utc>,
    },
    Running {
        job_id: String,
        progress: Option<String>,
        updated_at: DateTime<Utc>,
    },
    Completed {
        job_id: String,
        result: Value,
    },
    Failed {
        job_id: String,
        error: JobError,
    },
}

impl JobView {
    pub fn from_lookup(job_id: &str, job: Option<Job>) -> Self {
        let Some(job) = job else {
            return JobView::NotFound {
                job_id: job_id.to_string(),
            };
        };
        match job.status {
            JobStatus::Pending => JobView::Pending {
                job_id: job.id,
                created_at: job.created_at,
            },
            JobStatus::Running => JobView::Running {
                job_id: job.id,
                progress: job.progress_message,
                updated_at: job.updated_at,
            },
            JobStatus::Completed => JobView::Completed {
                job_id: job.id,
                result: job.result.unwrap_or(Value::Null),
            },
            JobStatus::Failed => JobView::Failed {
                job_id: job.id,
                error: job
                    .error
                    .unwrap_or_else(|| JobError::new("Error", "Job failed without an error")),
            },
        }
    }

    /// Render as a tool response. A completed job whose result is itself a
    /// tool result is returned as that result.
    pub fn to_tool_result(&self) -> ToolResult {
        match self {
            JobView::NotFound { job_id } => ToolResult::error(
                format!("Job '{}' not found.", job_id),
                Some(json!({ "jobId": job_id })),
            ),
            JobView::Pending { job_id, .. } => {
                ToolResult::text(format!("Job '{}' is pending. Check again later.", job_id))
                    .with_metadata("jobId", json!(job_id))
                    .with_metadata("status", json!("pending"))
            }
            JobView::Running {
                job_id, progress, ..
            } => {
                let text = match progress {
                    Some(progress) => format!("Job '{}' is running: {}", job_id, progress),
                    None => format!("Job '{}' is running. Check again later.", job_id),
                };
                ToolResult::text(text)
                    .with_metadata("jobId", json!(job_id))
                    .with_metadata("status", json!("running"))
            }
            JobView::Completed { job_id, result } => {
                let rendered = serde_json::from_value::<ToolResult>(result.clone())
                    .ok()
                    .filter(ToolResult::is_well_formed)
                    .unwrap_or_else(|| {
                        let text = match result {
                            Value::String(s) => s.clone(),
                            other => serde_json::to_string_pretty(other)
                                .unwrap_or_else(|_| other.to_string()),
                        };
                        ToolResult::text(text)
                    });
                rendered
                    .with_metadata("jobId", json!(job_id))
                    .with_metadata("status", json!("completed"))
            }
            JobView::Failed { job_id, error } => ToolResult::error(
                format!("Job '{}' failed: {}", job_id, error.message),
                serde_json::to_value(error).ok(),
            )
            .with_metadata("jobId", json!(job_id))
            .with_metadata("status", json!("failed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus) -> Job {
        let mut job = Job::new("j1".into());
        job.status = status;
        job
    }

    #[test]
    fn test_not_found_is_error() {
        let view = JobView::from_lookup("missing", None);
        assert_eq!(
            view,
            JobView::NotFound {
                job_id: "missing".into()
            }
        );
        let result = view.to_tool_result();
        assert!(result.is_error());
        assert!(result.first_text().unwrap().contains("missing"));
    }

    #[test]
    fn test_each_state_has_distinct_shape() {
        let pending = JobView::from_lookup("j1", Some(job(JobStatus::Pending)));
        assert!(matches!(pending, JobView::Pending { .. }));
        assert_eq!(serde_json::to_value(&pending).unwrap()["status"], "pending");

        let mut running = job(JobStatus::Running);
        running.progress_message = Some("step 2 of 3".into());
        let view = JobView::from_lookup("j1", Some(running));
        assert_eq!(
            view.to_tool_result().first_text(),
            Some("Job 'j1' is running: step 2 of 3")
        );

        let mut failed = job(JobStatus::Failed);
        failed.error = Some(JobError::new("TimeoutError", "too slow"));
        let result = JobView::from_lookup("j1", Some(failed)).to_tool_result();
        assert!(result.is_error());
        assert_eq!(result.error_details.unwrap()["name"], "TimeoutError");
    }

    #[test]
    fn test_completed_tool_result_is_unwrapped() {
        let mut completed = job(JobStatus::Completed);
        completed.result = Some(serde_json::to_value(ToolResult::text("hello")).unwrap());
        let result = JobView::from_lookup("j1", Some(completed)).to_tool_result();
        assert_eq!(result.first_text(), Some("hello"));
        assert_eq!(result.metadata.unwrap()["status"], "completed");

        let mut plain = job(JobStatus::Completed);
        plain.result = Some(json!({"count": 3}));
        let result = JobView::from_lookup("j1", Some(plain)).to_tool_result();
        assert!(result.first_text().unwrap().contains("\"count\": 3"));
    }
}
