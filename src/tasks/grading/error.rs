use thiserror::Error;

use crate::repositories::store::StoreError;
use crate::services::ai_grading::AiError;

#[derive(Debug, Error)]
pub(crate) enum GradingError {
    #[error("submission {0} not found")]
    SubmissionNotFound(String),
    #[error("assignment {0} not found")]
    AssignmentNotFound(String),
    #[error("submission {0} is already graded")]
    AlreadyGraded(String),
    #[error("submission {id} cannot be graded: {reason}")]
    NotGradable { id: String, reason: String },
    #[error("could not extract submission text: {0}")]
    ContentExtraction(String),
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for GradingError {
    /// A unique-constraint conflict on the grade means another writer won.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(submission_id) => Self::AlreadyGraded(submission_id),
            other => Self::Store(other),
        }
    }
}

impl GradingError {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::SubmissionNotFound(_) | Self::AssignmentNotFound(_) => "not_found",
            Self::AlreadyGraded(_) => "already_graded",
            Self::NotGradable { .. } => "not_gradable",
            Self::ContentExtraction(_) => "content_extraction",
            Self::Ai(AiError::EmptyInput) => "empty_input",
            Self::Ai(err) if err.is_retryable() => "provider_transient",
            Self::Ai(_) => "provider_rejected",
            Self::Store(_) => "store",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflict_maps_to_already_graded() {
        let err = GradingError::from(StoreError::Conflict("sub-1".to_string()));
        assert!(matches!(err, GradingError::AlreadyGraded(ref id) if id == "sub-1"));
        assert_eq!(err.kind(), "already_graded");
    }

    #[test]
    fn provider_errors_are_classified_by_retryability() {
        assert_eq!(GradingError::from(AiError::RateLimited).kind(), "provider_transient");
        assert_eq!(
            GradingError::from(AiError::ProviderAuth("bad key".into())).kind(),
            "provider_rejected"
        );
        assert_eq!(GradingError::from(AiError::EmptyInput).kind(), "empty_input");
    }
}
