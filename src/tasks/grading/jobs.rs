use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use crate::core::time::{format_primitive, primitive_now_utc};

use super::orchestrator::{BatchSummary, GradingOrchestrator};

/// How long a finished job stays queryable.
pub(super) const JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub(crate) enum JobState {
    Running,
    Completed { summary: BatchSummary },
    Failed { error: String },
}

impl JobState {
    fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct BatchJob {
    pub(crate) job_id: String,
    pub(crate) assignment_id: String,
    pub(crate) started_at: String,
    #[serde(flatten)]
    pub(crate) state: JobState,
}

struct JobEntry {
    assignment_id: String,
    started_at: String,
    finished_at: Option<Instant>,
    state: watch::Receiver<JobState>,
}

impl JobEntry {
    fn expired(&self, now: Instant) -> bool {
        self.finished_at.is_some_and(|finished| now.duration_since(finished) >= JOB_RETENTION)
    }
}

/// Detached batch runs keyed by job id. A run keeps going after the request
/// that started it has returned. Finished runs are evicted on the next spawn
/// once they are older than [`JOB_RETENTION`].
#[derive(Clone)]
pub(crate) struct BatchJobs {
    orchestrator: Arc<GradingOrchestrator>,
    jobs: Arc<RwLock<HashMap<String, JobEntry>>>,
}

impl BatchJobs {
    pub(crate) fn new(orchestrator: Arc<GradingOrchestrator>) -> Self {
        Self { orchestrator, jobs: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub(crate) async fn spawn(&self, assignment_id: &str) -> String {
        let job_id = Uuid::new_v4().to_string();
        let (sender, receiver) = watch::channel(JobState::Running);

        {
            let mut jobs = self.jobs.write().await;
            let now = Instant::now();
            let before = jobs.len();
            jobs.retain(|_, entry| !entry.expired(now));
            if jobs.len() < before {
                tracing::debug!(evicted = before - jobs.len(), "Evicted finished batch jobs");
            }

            jobs.insert(
                job_id.clone(),
                JobEntry {
                    assignment_id: assignment_id.to_string(),
                    started_at: format_primitive(primitive_now_utc()),
                    finished_at: None,
                    state: receiver,
                },
            );
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let jobs = Arc::clone(&self.jobs);
        let assignment_id = assignment_id.to_string();
        let span_job_id = job_id.clone();
        tokio::spawn(async move {
            let state = match orchestrator.batch_grade_assignment(&assignment_id).await {
                Ok(summary) => JobState::Completed { summary },
                Err(err) => {
                    tracing::error!(
                        job_id = %span_job_id,
                        assignment_id = %assignment_id,
                        error = %err,
                        "Batch job failed"
                    );
                    JobState::Failed { error: err.to_string() }
                }
            };
            if let Some(entry) = jobs.write().await.get_mut(&span_job_id) {
                entry.finished_at = Some(Instant::now());
            }
            sender.send_replace(state);
        });

        tracing::info!(job_id = %job_id, "Batch grading job started");
        job_id
    }

    pub(crate) async fn get(&self, job_id: &str) -> Option<BatchJob> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(job_id)?;
        let state = entry.state.borrow().clone();
        Some(BatchJob {
            job_id: job_id.to_string(),
            assignment_id: entry.assignment_id.clone(),
            started_at: entry.started_at.clone(),
            state,
        })
    }

    /// Resolves once the job leaves `running`.
    pub(crate) async fn wait(&self, job_id: &str) -> Option<JobState> {
        let mut receiver = self.jobs.read().await.get(job_id)?.state.clone();
        let state = match receiver.wait_for(|state| !state.is_running()).await {
            Ok(state) => state.clone(),
            Err(_) => JobState::Failed { error: "batch task stopped unexpectedly".to_string() },
        };
        Some(state)
    }

    pub(crate) async fn running_count(&self) -> usize {
        self.jobs.read().await.values().filter(|entry| entry.state.borrow().is_running()).count()
    }
}
