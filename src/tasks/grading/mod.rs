mod context;
mod error;
mod jobs;
mod orchestrator;

pub(crate) use error::GradingError;
pub(crate) use jobs::{BatchJob, BatchJobs};
pub(crate) use orchestrator::{GradedSubmission, GradingDetails, GradingOrchestrator};
