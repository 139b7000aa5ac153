use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{AssignmentKind, QuestionType, SubmissionStatus};

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Assignment {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) kind: AssignmentKind,
    pub(crate) description: Option<String>,
    pub(crate) reference_answer: Option<String>,
    pub(crate) reference_pdf_text: Option<String>,
    pub(crate) total_points: f64,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct RubricCriterion {
    pub(crate) max_points: f64,
    #[serde(default)]
    pub(crate) description: String,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Rubric {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) criteria: Json<BTreeMap<String, RubricCriterion>>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) student_id: String,
    pub(crate) version: i32,
    pub(crate) status: SubmissionStatus,
    pub(crate) content: Option<String>,
    pub(crate) pdf_url: Option<String>,
    pub(crate) submitted_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct CriterionScore {
    #[serde(alias = "score")]
    pub(crate) points: f64,
    #[serde(default)]
    pub(crate) feedback: String,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Grade {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) score: f64,
    pub(crate) feedback: Option<String>,
    pub(crate) rubric_scores: Json<BTreeMap<String, CriterionScore>>,
    pub(crate) ai_response: Option<Json<serde_json::Value>>,
    pub(crate) graded_by: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct QuestionOption {
    pub(crate) id: String,
    pub(crate) text: String,
    #[serde(default)]
    pub(crate) is_correct: bool,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct QuestionRow {
    pub(crate) id: String,
    pub(crate) assignment_id: String,
    pub(crate) position: i32,
    pub(crate) question_type: QuestionType,
    pub(crate) prompt: String,
    pub(crate) points: f64,
    pub(crate) options: Json<Vec<QuestionOption>>,
    pub(crate) correct_answers: Json<Vec<String>>,
    pub(crate) reference_answer: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct Answer {
    pub(crate) id: String,
    pub(crate) submission_id: String,
    pub(crate) question_id: String,
    pub(crate) response: String,
    pub(crate) is_correct: Option<bool>,
    pub(crate) points_earned: Option<f64>,
    pub(crate) feedback: Option<String>,
    pub(crate) graded_at: Option<PrimitiveDateTime>,
}
