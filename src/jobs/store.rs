use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::events::NotificationHub;
use crate::jobs::types::{Job, JobError, JobEvent, JobStatus};
use crate::ToolweaveError;

/// SSE event name for every job-lifecycle notification.
pub const JOB_EVENT: &str = "job_update";

/// In-memory job map with a four-state lifecycle.
///
/// Every transition notifies the hub while the write lock is held, so the
/// notifications for one job are observed in transition order. Unknown ids
/// are silent no-ops; transitions out of a terminal state are logged and
/// ignored. Transition methods report whether they applied.
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
    hub: Arc<NotificationHub>,
}

impl JobStore {
    pub fn new(hub: Arc<NotificationHub>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            hub,
        }
    }

    /// Create a Pending job under a fresh random id.
    pub async fn create_job(&self) -> String {
        let mut jobs = self.jobs.write().await;
        let mut id = Uuid::new_v4().to_string();
        while jobs.contains_key(&id) {
            id = Uuid::new_v4().to_string();
        }
        let job = Job::new(id.clone());
        self.announce_created(&job);
        jobs.insert(id.clone(), job);
        info!(job_id = %id, "Job created");
        id
    }

    /// Create a Pending job under a caller-chosen id, recording what it runs.
    pub async fn create_job_with_id(
        &self,
        id: &str,
        tool_name: &str,
        params: Value,
    ) -> Result<(), ToolweaveError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(id) {
            return Err(ToolweaveError::DuplicateJob { id: id.to_string() });
        }
        let mut job = Job::new(id.to_string());
        job.tool_name = Some(tool_name.to_string());
        job.params = Some(params);
        self.announce_created(&job);
        jobs.insert(id.to_string(), job);
        info!(job_id = %id, tool = %tool_name, "Job created");
        Ok(())
    }

    pub async fn start_job(&self, id: &str) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(id) else {
            debug!(job_id = %id, "start_job on unknown job");
            return false;
        };
        if job.status != JobStatus::Pending {
            warn!(job_id = %id, status = %job.status, "Ignoring start of a job that is not pending");
            return false;
        }
        job.status = JobStatus::Running;
        job.touch();
        self.announce_updated(job);
        true
    }

    pub async fn complete_job(&self, id: &str, result: Value) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(id) else {
            debug!(job_id = %id, "complete_job on unknown job");
            return false;
        };
        if !self.advance(job, JobStatus::Completed) {
            return false;
        }
        job.result = Some(result.clone());
        self.hub.notify(
            JOB_EVENT,
            &JobEvent::JobCompleted {
                job_id: job.id.clone(),
                result,
            },
        );
        info!(job_id = %id, "Job completed");
        true
    }

    pub async fn fail_job(&self, id: &str, error: JobError) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(id) else {
            debug!(job_id = %id, "fail_job on unknown job");
            return false;
        };
        if !self.advance(job, JobStatus::Failed) {
            return false;
        }
        job.error = Some(error.clone());
        self.hub.notify(
            JOB_EVENT,
            &JobEvent::JobFailed {
                job_id: job.id.clone(),
                error: error.clone(),
            },
        );
        warn!(job_id = %id, error = %error.message, "Job failed");
        true
    }

    /// Low-level transition primitive. `message`, when given, becomes the
    /// job's progress message. Emits the same update shape as `start_job`.
    pub async fn update_job_status(
        &self,
        id: &str,
        status: JobStatus,
        message: Option<String>,
    ) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(id) else {
            debug!(job_id = %id, "update_job_status on unknown job");
            return false;
        };
        let applied = if job.status == JobStatus::Running && status == JobStatus::Running {
            job.touch();
            true
        } else {
            self.advance(job, status)
        };
        if !applied {
            return false;
        }
        if message.is_some() {
            job.progress_message = message;
        }
        self.announce_updated(job);
        true
    }

    /// Attach a result without changing status. Does not notify.
    pub async fn set_job_result(&self, id: &str, result: Value) -> bool {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(id) {
            Some(job) => {
                job.result = Some(result);
                job.touch();
                true
            }
            None => false,
        }
    }

    pub async fn get_job(&self, id: &str) -> Option<Job> {
        self.jobs.read().await.get(id).cloned()
    }

    /// All jobs, oldest first.
    pub async fn list_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    pub async fn remove_job(&self, id: &str) -> Option<Job> {
        self.jobs.write().await.remove(id)
    }

    /// Drop terminal jobs whose last update is older than `older_than`.
    pub async fn prune_finished(&self, older_than: chrono::Duration) -> usize {
        let cutoff = Utc::now() - older_than;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| !(job.status.is_terminal() && job.updated_at <= cutoff));
        let pruned = before - jobs.len();
        if pruned > 0 {
            info!(pruned, "Pruned finished jobs");
        }
        pruned
    }

    /// Move `job` to `to`. A Pending job headed for a terminal state passes
    /// through Running first, announced like any other update.
    fn advance(&self, job: &mut Job, to: JobStatus) -> bool {
        match (job.status, to) {
            (from, _) if from.is_terminal() => {
                warn!(job_id = %job.id, from = %from, to = %to, "Ignoring transition out of a terminal state");
                false
            }
            (from, JobStatus::Pending) => {
                warn!(job_id = %job.id, from = %from, "Ignoring transition back to pending");
                false
            }
            (JobStatus::Pending, target) if target.is_terminal() => {
                job.status = JobStatus::Running;
                job.touch();
                self.announce_updated(job);
                job.status = target;
                job.touch();
                true
            }
            (_, target) => {
                job.status = target;
                job.touch();
                true
            }
        }
    }

    fn announce_created(&self, job: &Job) {
        self.hub.notify(
            JOB_EVENT,
            &JobEvent::JobCreated {
                job_id: job.id.clone(),
                status: job.status,
            },
        );
    }

    fn announce_updated(&self, job: &Job) {
        self.hub.notify(
            JOB_EVENT,
            &JobEvent::JobUpdated {
                job_id: job.id.clone(),
                status: job.status,
            },
        );
    }
}
