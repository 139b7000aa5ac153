use std::sync::Arc;

use sqlx::PgPool;

use crate::core::{config::Settings, metrics::MetricsHandle};
use crate::tasks::grading::{BatchJobs, GradingOrchestrator};

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    metrics: MetricsHandle,
    grading: Arc<GradingOrchestrator>,
    jobs: BatchJobs,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        db: PgPool,
        metrics: MetricsHandle,
        grading: Arc<GradingOrchestrator>,
    ) -> Self {
        let jobs = BatchJobs::new(Arc::clone(&grading));
        Self { inner: Arc::new(InnerState { settings, db, metrics, grading, jobs }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn metrics(&self) -> &MetricsHandle {
        &self.inner.metrics
    }

    pub(crate) fn grading(&self) -> &GradingOrchestrator {
        &self.inner.grading
    }

    pub(crate) fn jobs(&self) -> &BatchJobs {
        &self.inner.jobs
    }
}
