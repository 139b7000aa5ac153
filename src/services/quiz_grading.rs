use serde::{Deserialize, Serialize};

use crate::db::models::{QuestionOption, QuestionRow};
use crate::db::types::QuestionType;
use crate::services::ai_grading::{AiError, AiGradingService};

pub(crate) const MANUAL_REVIEW_FEEDBACK: &str =
    "Automatic grading failed for this answer; manual instructor review is required.";

/// Grading policy per question type. Adding a variant forces the grader's
/// match to be updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "question_type", rename_all = "snake_case")]
pub(crate) enum QuestionKind {
    MultipleChoice {
        options: Vec<QuestionOption>,
    },
    TrueFalse {
        options: Vec<QuestionOption>,
    },
    ShortAnswer {
        #[serde(default)]
        correct_answers: Vec<String>,
        #[serde(default)]
        reference_answer: Option<String>,
    },
    Essay {
        #[serde(default)]
        reference_answer: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Question {
    pub(crate) id: String,
    pub(crate) prompt: String,
    pub(crate) points: f64,
    #[serde(flatten)]
    pub(crate) kind: QuestionKind,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        let kind = match row.question_type {
            QuestionType::MultipleChoice => QuestionKind::MultipleChoice { options: row.options.0 },
            QuestionType::TrueFalse => QuestionKind::TrueFalse { options: row.options.0 },
            QuestionType::ShortAnswer => QuestionKind::ShortAnswer {
                correct_answers: row.correct_answers.0,
                reference_answer: row.reference_answer,
            },
            QuestionType::Essay => QuestionKind::Essay { reference_answer: row.reference_answer },
        };
        Self { id: row.id, prompt: row.prompt, points: row.points, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct AnswerGrade {
    pub(crate) is_correct: bool,
    pub(crate) points_earned: f64,
    pub(crate) feedback: String,
}

impl AnswerGrade {
    fn full(points: f64, feedback: impl Into<String>) -> Self {
        Self { is_correct: true, points_earned: points, feedback: feedback.into() }
    }

    fn zero(feedback: impl Into<String>) -> Self {
        Self { is_correct: false, points_earned: 0.0, feedback: feedback.into() }
    }
}

#[derive(Clone)]
pub(crate) struct QuizAnswerGrader {
    ai: AiGradingService,
}

impl QuizAnswerGrader {
    pub(crate) fn new(ai: AiGradingService) -> Self {
        Self { ai }
    }

    /// Deterministic checks first; the AI client is only consulted for
    /// short answers without a literal match and for essays. AI failures
    /// become a zero-point result flagged for manual review.
    pub(crate) async fn grade_answer(&self, question: &Question, answer: &str) -> AnswerGrade {
        match &question.kind {
            QuestionKind::MultipleChoice { options } => {
                grade_choice(options, question.points, |option| option.id == answer.trim())
            }
            QuestionKind::TrueFalse { options } => {
                let normalized = answer.trim().to_lowercase();
                grade_choice(options, question.points, |option| {
                    option.id.to_lowercase() == normalized
                        || option.text.trim().to_lowercase() == normalized
                })
            }
            QuestionKind::ShortAnswer { correct_answers, reference_answer } => {
                self.grade_short_answer(question, correct_answers, reference_answer.as_deref(), answer)
                    .await
            }
            QuestionKind::Essay { reference_answer } => {
                match self
                    .ai
                    .grade_essay(answer, &question.prompt, reference_answer.as_deref(), question.points)
                    .await
                {
                    Ok(essay) => AnswerGrade {
                        is_correct: essay.is_correct,
                        points_earned: essay.score,
                        feedback: essay.feedback,
                    },
                    Err(err) => manual_review(&question.id, err),
                }
            }
        }
    }

    async fn grade_short_answer(
        &self,
        question: &Question,
        correct_answers: &[String],
        reference_answer: Option<&str>,
        answer: &str,
    ) -> AnswerGrade {
        let normalized = answer.trim().to_lowercase();
        if !normalized.is_empty()
            && correct_answers.iter().any(|accepted| accepted.trim().to_lowercase() == normalized)
        {
            return AnswerGrade::full(question.points, "Correct!");
        }

        let Some(reference) = reference_answer.filter(|text| !text.trim().is_empty()) else {
            return AnswerGrade::zero("Incorrect.");
        };

        match self.ai.grade_short_answer(answer, reference, &question.prompt, question.points).await
        {
            Ok(graded) => AnswerGrade {
                is_correct: graded.is_correct,
                points_earned: graded.score,
                feedback: graded.feedback,
            },
            Err(err) => manual_review(&question.id, err),
        }
    }
}

fn grade_choice(
    options: &[QuestionOption],
    points: f64,
    selected: impl Fn(&QuestionOption) -> bool,
) -> AnswerGrade {
    match options.iter().find(|option| option.is_correct) {
        Some(correct) if selected(correct) => AnswerGrade::full(points, "Correct!"),
        Some(correct) => {
            AnswerGrade::zero(format!("Incorrect. The correct answer is: {}", correct.text))
        }
        None => AnswerGrade::zero("Incorrect."),
    }
}

fn manual_review(question_id: &str, err: AiError) -> AnswerGrade {
    tracing::warn!(question_id, error = %err, "AI answer grading failed; flagging for review");
    metrics::counter!("quiz_answers_manual_review_total").increment(1);
    AnswerGrade::zero(MANUAL_REVIEW_FEEDBACK)
}
