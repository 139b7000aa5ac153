use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{CriterionScore, Grade};
use crate::services::quiz_grading::{Question, QuestionKind};
use crate::tasks::grading::{GradedSubmission, GradingDetails};

const INLINE_QUESTION_ID: &str = "inline";

#[derive(Debug, Serialize)]
pub(crate) struct GradeResponse {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) score: f64,
    pub(crate) feedback: Option<String>,
    pub(crate) rubric_scores: BTreeMap<String, CriterionScore>,
    pub(crate) graded_by: Option<String>,
    pub(crate) created_at: String,
}

impl From<Grade> for GradeResponse {
    fn from(grade: Grade) -> Self {
        Self {
            id: grade.id,
            submission_id: grade.submission_id,
            score: grade.score,
            feedback: grade.feedback,
            rubric_scores: grade.rubric_scores.0,
            graded_by: grade.graded_by,
            created_at: format_primitive(grade.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GradeSubmissionResponse {
    pub(crate) grade: GradeResponse,
    pub(crate) details: GradingDetails,
}

impl From<GradedSubmission> for GradeSubmissionResponse {
    fn from(graded: GradedSubmission) -> Self {
        Self { grade: graded.grade.into(), details: graded.details }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchJobAccepted {
    pub(crate) job_id: String,
    pub(crate) assignment_id: String,
    pub(crate) status_url: String,
}

/// Inline question definition plus the student's response.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GradeAnswerRequest {
    #[validate(length(max = 128))]
    pub(crate) question_id: Option<String>,
    #[validate(length(min = 1, max = 20000))]
    pub(crate) prompt: String,
    #[validate(range(min = 0.0, max = 1000.0))]
    pub(crate) points: f64,
    #[serde(flatten)]
    pub(crate) kind: QuestionKind,
    #[validate(length(max = 50000))]
    pub(crate) answer: String,
}

impl GradeAnswerRequest {
    pub(crate) fn into_parts(self) -> (Question, String) {
        let question = Question {
            id: self.question_id.unwrap_or_else(|| INLINE_QUESTION_ID.to_string()),
            prompt: self.prompt,
            points: self.points,
            kind: self.kind,
        };
        (question, self.answer)
    }
}
