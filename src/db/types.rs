use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "submissionstatus", rename_all = "lowercase")]
pub(crate) enum SubmissionStatus {
    Draft,
    Pending,
    Submitted,
    Grading,
    Graded,
    Failed,
}

impl SubmissionStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Submitted => "submitted",
            Self::Grading => "grading",
            Self::Graded => "graded",
            Self::Failed => "failed",
        }
    }

    /// Statuses picked up by batch grading.
    pub(crate) fn is_awaiting_grading(self) -> bool {
        matches!(self, Self::Pending | Self::Submitted)
    }

    /// `failed -> grading` is the only backwards edge; `grading -> grading`
    /// covers a stalled attempt being picked up again.
    pub(crate) fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::Draft, Self::Pending | Self::Submitted) => true,
            (Self::Pending, Self::Submitted) => true,
            (Self::Pending | Self::Submitted | Self::Failed | Self::Grading, Self::Grading) => true,
            (Self::Grading, Self::Graded | Self::Failed) => true,
            (Self::Pending | Self::Submitted, Self::Failed) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "assignmentkind", rename_all = "lowercase")]
pub(crate) enum AssignmentKind {
    Essay,
    Quiz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "questiontype", rename_all = "snake_case")]
pub(crate) enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Essay,
}

#[cfg(test)]
mod tests {
    use super::SubmissionStatus::*;

    #[test]
    fn grading_transitions_follow_lifecycle() {
        assert!(Submitted.can_transition_to(Grading));
        assert!(Pending.can_transition_to(Grading));
        assert!(Grading.can_transition_to(Graded));
        assert!(Grading.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Grading));
    }

    #[test]
    fn graded_and_draft_cannot_enter_grading() {
        assert!(!Graded.can_transition_to(Grading));
        assert!(!Draft.can_transition_to(Grading));
        assert!(!Graded.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Graded));
    }

    #[test]
    fn batch_picks_only_pending_and_submitted() {
        assert!(Pending.is_awaiting_grading());
        assert!(Submitted.is_awaiting_grading());
        assert!(!Failed.is_awaiting_grading());
        assert!(!Grading.is_awaiting_grading());
    }
}
