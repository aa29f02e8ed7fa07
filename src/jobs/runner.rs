use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::jobs::store::JobStore;
use crate::jobs::types::{JobError, JobStatus};
use crate::utils::{run_with_deadline, Deadline};
use crate::ToolweaveError;

/// What a background task gets to see of its own job.
#[derive(Clone)]
pub struct JobHandle {
    pub job_id: String,
    pub cancel: CancellationToken,
    store: Arc<JobStore>,
}

impl JobHandle {
    /// Publish a progress message for the running job.
    pub async fn progress(&self, message: impl Into<String>) {
        self.store
            .update_job_status(&self.job_id, JobStatus::Running, Some(message.into()))
            .await;
    }
}

/// Runs tool work in the background under a job id.
///
/// Each submitted job gets its own cancellation token and races the configured
/// job deadline. Whatever happens, the job ends Completed or Failed; work that
/// panics fails its job with a `PanicError`.
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<JobStore>,
    timeout: Option<Duration>,
    tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl JobRunner {
    pub fn new(store: Arc<JobStore>, timeout: Option<Duration>) -> Self {
        Self {
            store,
            timeout,
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Create a job for `tool_name` and spawn `work` for it. Returns the job id
    /// immediately.
    pub async fn submit<F, Fut>(
        &self,
        tool_name: &str,
        params: Value,
        work: F,
    ) -> Result<String, ToolweaveError>
    where
        F: FnOnce(JobHandle) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let job_id = Uuid::new_v4().to_string();
        self.store
            .create_job_with_id(&job_id, tool_name, params)
            .await?;

        let cancel = CancellationToken::new();
        self.tokens.lock().insert(job_id.clone(), cancel.clone());

        let handle = JobHandle {
            job_id: job_id.clone(),
            cancel: cancel.clone(),
            store: Arc::clone(&self.store),
        };
        let runner = self.clone();
        let span = tracing::info_span!("job", job_id = %job_id, tool = %tool_name);
        let id = job_id.clone();

        tokio::spawn(
            async move {
                runner.store.start_job(&id).await;
                let guarded = AssertUnwindSafe(async move { work(handle).await }).catch_unwind();
                match run_with_deadline(guarded, runner.timeout, &cancel).await {
                    Deadline::Finished(Ok(Ok(value))) => {
                        runner.store.complete_job(&id, value).await;
                    }
                    Deadline::Finished(Ok(Err(e))) => {
                        runner.store.fail_job(&id, JobError::from_anyhow(&e)).await;
                    }
                    Deadline::Finished(Err(payload)) => {
                        let message = panic_message(payload.as_ref());
                        tracing::error!("Job work panicked: {}", message);
                        let error =
                            JobError::new("PanicError", format!("Job panicked: {}", message));
                        runner.store.fail_job(&id, error).await;
                    }
                    Deadline::TimedOut(limit) => {
                        let error = JobError::new(
                            "TimeoutError",
                            format!("Job timed out after {}s", limit.as_secs()),
                        );
                        runner.store.fail_job(&id, error).await;
                    }
                    Deadline::Cancelled => {
                        let error = JobError::new("CancelledError", "Job was cancelled");
                        runner.store.fail_job(&id, error).await;
                    }
                }
                runner.tokens.lock().remove(&id);
            }
            .instrument(span),
        );

        Ok(job_id)
    }

    /// Signal a running job to stop. Returns false if no such job is in flight.
    pub fn cancel(&self, job_id: &str) -> bool {
        match self.tokens.lock().get(job_id) {
            Some(token) => {
                token.cancel();
                tracing::info!(job_id, "Job cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Number of submitted jobs that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tokens.lock().len()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NotificationHub;
    use serde_json::json;

    fn runner(timeout: Option<Duration>) -> JobRunner {
        let store = Arc::new(JobStore::new(Arc::new(NotificationHub::new())));
        JobRunner::new(store, timeout)
    }

    async fn wait_terminal(runner: &JobRunner, id: &str) -> crate::jobs::Job {
        loop {
            let job = runner.store().get_job(id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_successful_work_completes_job() {
        let runner = runner(None);
        let id = runner
            .submit("echo", json!({"message": "hi"}), |handle| async move {
                handle.progress("working").await;
                Ok::<_, anyhow::Error>(json!({"echo": "hi"}))
            })
            .await
            .unwrap();

        let job = wait_terminal(&runner, &id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result, Some(json!({"echo": "hi"})));
        assert_eq!(job.progress_message.as_deref(), Some("working"));
        assert_eq!(job.tool_name.as_deref(), Some("echo"));
    }

    #[tokio::test]
    async fn test_failing_work_fails_job() {
        let runner = runner(None);
        let id = runner
            .submit("broken", json!({}), |_| async {
                Err::<Value, _>(anyhow::anyhow!("disk full"))
            })
            .await
            .unwrap();

        let job = wait_terminal(&runner, &id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.unwrap().message, "disk full");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_fails_job() {
        let runner = runner(Some(Duration::from_secs(2)));
        let id = runner
            .submit("slow", json!({}), |_| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, anyhow::Error>(json!(null))
            })
            .await
            .unwrap();

        let job = wait_terminal(&runner, &id).await;
        let error = job.error.unwrap();
        assert_eq!(error.name, "TimeoutError");
        assert!(error.message.contains("2s"));
    }

    #[tokio::test]
    async fn test_cancel_fails_job() {
        let runner = runner(None);
        let id = runner
            .submit("forever", json!({}), |_| std::future::pending::<anyhow::Result<Value>>())
            .await
            .unwrap();

        assert!(runner.cancel(&id));
        let job = wait_terminal(&runner, &id).await;
        assert_eq!(job.error.unwrap().name, "CancelledError");
        assert!(!runner.cancel("unknown"));
    }

    #[tokio::test]
    async fn test_panicking_work_fails_job_and_releases_token() {
        let runner = runner(None);
        let id = runner
            .submit("boom", json!({}), |_| async {
                if true {
                    panic!("tool bug");
                }
                Ok::<_, anyhow::Error>(json!(null))
            })
            .await
            .unwrap();

        let job = wait_terminal(&runner, &id).await;
        assert_eq!(job.status, JobStatus::Failed);
        let error = job.error.unwrap();
        assert_eq!(error.name, "PanicError");
        assert!(error.message.contains("tool bug"));

        while runner.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!runner.cancel(&id));
    }

    #[tokio::test]
    async fn test_in_flight_tracks_running_jobs() {
        let runner = runner(None);
        assert_eq!(runner.in_flight(), 0);
        let id = runner
            .submit("forever", json!({}), |_| std::future::pending::<anyhow::Result<Value>>())
            .await
            .unwrap();
        assert_eq!(runner.in_flight(), 1);

        runner.cancel(&id);
        wait_terminal(&runner, &id).await;
        while runner.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}
