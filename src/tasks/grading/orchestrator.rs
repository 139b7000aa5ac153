use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use serde_json::json;

use crate::db::models::{CriterionScore, Grade, Submission};
use crate::db::types::{AssignmentKind, SubmissionStatus};
use crate::repositories::store::{AnswerResult, GradingStore, NewGrade};
use crate::services::ai_grading::{round2, AiError, AiGradingService, BatchSubmission, SubmissionGrading};
use crate::services::audit::{self, AuditEvent, AuditLog};
use crate::services::quiz_grading::{AnswerGrade, Question, QuizAnswerGrader};
use crate::services::storage::DocumentSource;
use crate::services::text_extraction::TextExtractor;

use super::context::AssignmentContext;
use super::error::GradingError;

const QUIZ_ANSWER_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct QuizAnswerDetail {
    pub(crate) question_id: String,
    pub(crate) is_correct: bool,
    pub(crate) points_earned: f64,
    pub(crate) points_possible: f64,
    pub(crate) feedback: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum GradingDetails {
    Rubric {
        percentage: f64,
        strengths: Vec<String>,
        areas_for_improvement: Vec<String>,
        suggestions: Vec<String>,
    },
    Quiz {
        max_points: f64,
        answers: Vec<QuizAnswerDetail>,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct GradedSubmission {
    pub(crate) grade: Grade,
    pub(crate) details: GradingDetails,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub(crate) struct BatchSummary {
    pub(crate) total: usize,
    pub(crate) graded: usize,
    pub(crate) failed: usize,
}

/// Drives a submission from `pending`/`submitted` through `grading` to
/// `graded` or `failed`.
pub(crate) struct GradingOrchestrator {
    store: Arc<dyn GradingStore>,
    ai: AiGradingService,
    quiz: QuizAnswerGrader,
    documents: Arc<dyn DocumentSource>,
    extractor: Arc<dyn TextExtractor>,
    audit: Arc<dyn AuditLog>,
}

impl GradingOrchestrator {
    pub(crate) fn new(
        store: Arc<dyn GradingStore>,
        ai: AiGradingService,
        documents: Arc<dyn DocumentSource>,
        extractor: Arc<dyn TextExtractor>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        let quiz = QuizAnswerGrader::new(ai.clone());
        Self { store, ai, quiz, documents, extractor, audit }
    }

    pub(crate) async fn grade_submission_by_id(
        &self,
        submission_id: &str,
    ) -> Result<GradedSubmission, GradingError> {
        let timer = Instant::now();
        let context = self
            .store
            .find_submission_context(submission_id)
            .await?
            .ok_or_else(|| GradingError::SubmissionNotFound(submission_id.to_string()))?;

        self.ensure_gradable(&context.submission).await?;
        self.claim(&context.submission).await?;
        tracing::info!(
            submission_id,
            assignment_id = %context.assignment.id,
            "Grading submission"
        );

        let assignment = AssignmentContext::assemble(&context.assignment, context.rubric.as_ref());
        let outcome = match assignment.kind {
            AssignmentKind::Essay => self.grade_essay(&context.submission, &assignment).await,
            AssignmentKind::Quiz => self.grade_quiz(&context.submission, &assignment).await,
        };
        self.settle(submission_id, outcome, timer).await
    }

    /// Grades every pending submission of an assignment. Per-item failures
    /// are counted; only loading the assignment or the pending list aborts.
    pub(crate) async fn batch_grade_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<BatchSummary, GradingError> {
        let timer = Instant::now();
        let (assignment, rubric) = self
            .store
            .find_assignment(assignment_id)
            .await?
            .ok_or_else(|| GradingError::AssignmentNotFound(assignment_id.to_string()))?;
        let pending = self.store.list_pending_submissions(assignment_id).await?;
        let context = AssignmentContext::assemble(&assignment, rubric.as_ref());

        let mut summary = BatchSummary { total: pending.len(), ..BatchSummary::default() };
        tracing::info!(assignment_id, total = summary.total, "Starting batch grading");

        match context.kind {
            AssignmentKind::Quiz => self.batch_grade_quizzes(&context, &pending, &mut summary).await,
            AssignmentKind::Essay => self.batch_grade_essays(&context, &pending, &mut summary).await,
        }

        metrics::counter!("batch_grading_items_total", "status" => "graded")
            .increment(summary.graded as u64);
        metrics::counter!("batch_grading_items_total", "status" => "failed")
            .increment(summary.failed as u64);
        tracing::info!(
            assignment_id,
            total = summary.total,
            graded = summary.graded,
            failed = summary.failed,
            duration_seconds = timer.elapsed().as_secs_f64(),
            "Batch grading finished"
        );
        self.audit.record(AuditEvent::assignment(
            audit::BATCH_COMPLETED,
            assignment_id,
            json!(summary),
        ));

        Ok(summary)
    }

    pub(crate) async fn grade_answer(&self, question: &Question, answer: &str) -> AnswerGrade {
        self.quiz.grade_answer(question, answer).await
    }

    pub(crate) async fn ensure_assignment(&self, assignment_id: &str) -> Result<(), GradingError> {
        match self.store.find_assignment(assignment_id).await? {
            Some(_) => Ok(()),
            None => Err(GradingError::AssignmentNotFound(assignment_id.to_string())),
        }
    }

    /// Quiz submissions share the loaded assignment and run in paced groups.
    async fn batch_grade_quizzes(
        &self,
        context: &AssignmentContext,
        pending: &[Submission],
        summary: &mut BatchSummary,
    ) {
        let (group_size, pause) = self.ai.batch_pacing();
        for (index, group) in pending.chunks(group_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(pause).await;
            }

            let outcomes = join_all(group.iter().map(|submission| async move {
                let timer = Instant::now();
                if let Err(err) = self.claim(submission).await {
                    tracing::info!(submission_id = %submission.id, error = %err, "Skipping submission");
                    return false;
                }
                let outcome = self.grade_quiz(submission, context).await;
                self.settle(&submission.id, outcome, timer).await.is_ok()
            }))
            .await;

            for graded in outcomes {
                if graded {
                    summary.graded += 1;
                } else {
                    summary.failed += 1;
                }
            }
        }
    }

    async fn batch_grade_essays(
        &self,
        context: &AssignmentContext,
        pending: &[Submission],
        summary: &mut BatchSummary,
    ) {
        let mut ready = Vec::with_capacity(pending.len());
        for submission in pending {
            if let Err(err) = self.claim(submission).await {
                tracing::info!(submission_id = %submission.id, error = %err, "Skipping submission");
                summary.failed += 1;
                continue;
            }

            match self.resolve_content(submission).await {
                Ok(content) => ready.push(BatchSubmission { id: submission.id.clone(), content }),
                Err(err) => {
                    summary.failed += 1;
                    self.record_failure(&submission.id, &err).await;
                }
            }
        }

        for entry in self.ai.batch_grade(&ready, &context.grading).await {
            let timer = Instant::now();
            let outcome = match entry.outcome {
                Ok(grading) => self.persist_rubric_grade(&entry.submission_id, grading).await,
                Err(err) => Err(err.into()),
            };

            match self.settle(&entry.submission_id, outcome, timer).await {
                Ok(_) => summary.graded += 1,
                Err(_) => summary.failed += 1,
            }
        }
    }

    /// Takes the submission into `grading`. Losing the claim to a concurrent
    /// grader surfaces as `AlreadyGraded`.
    async fn claim(&self, submission: &Submission) -> Result<(), GradingError> {
        if self.store.begin_grading(&submission.id).await? {
            return Ok(());
        }

        if self.store.grade_exists(&submission.id).await? {
            Err(GradingError::AlreadyGraded(submission.id.clone()))
        } else {
            Err(GradingError::NotGradable {
                id: submission.id.clone(),
                reason: "status changed while claiming".to_string(),
            })
        }
    }

    async fn settle(
        &self,
        submission_id: &str,
        outcome: Result<GradedSubmission, GradingError>,
        timer: Instant,
    ) -> Result<GradedSubmission, GradingError> {
        match outcome {
            Ok(graded) => {
                self.record_success(&graded, timer.elapsed().as_secs_f64());
                Ok(graded)
            }
            Err(err) => {
                self.record_failure(submission_id, &err).await;
                Err(err)
            }
        }
    }

    async fn ensure_gradable(&self, submission: &Submission) -> Result<(), GradingError> {
        if submission.status == SubmissionStatus::Graded
            || self.store.grade_exists(&submission.id).await?
        {
            return Err(GradingError::AlreadyGraded(submission.id.clone()));
        }

        if !submission.status.can_transition_to(SubmissionStatus::Grading) {
            return Err(GradingError::NotGradable {
                id: submission.id.clone(),
                reason: format!("status is {}", submission.status.as_str()),
            });
        }

        Ok(())
    }

    async fn grade_essay(
        &self,
        submission: &Submission,
        assignment: &AssignmentContext,
    ) -> Result<GradedSubmission, GradingError> {
        let content = self.resolve_content(submission).await?;
        let grading = self.ai.grade_submission(&content, &assignment.grading).await?;
        self.persist_rubric_grade(&submission.id, grading).await
    }

    /// Stored text wins; otherwise the PDF is extracted once and the text is
    /// written back onto the submission.
    async fn resolve_content(&self, submission: &Submission) -> Result<String, GradingError> {
        if let Some(content) = submission.content.as_deref().filter(|text| !text.trim().is_empty())
        {
            return Ok(content.to_string());
        }

        let Some(pdf_url) = submission.pdf_url.as_deref().filter(|url| !url.trim().is_empty())
        else {
            return Err(AiError::EmptyInput.into());
        };

        let document = self
            .documents
            .fetch(pdf_url)
            .await
            .map_err(|err| GradingError::ContentExtraction(format!("{err:#}")))?;
        let text = self
            .extractor
            .extract_text(&document)
            .await
            .map_err(|err| GradingError::ContentExtraction(err.to_string()))?;

        if let Err(err) = self.store.save_extracted_content(&submission.id, &text).await {
            tracing::warn!(submission_id = %submission.id, error = %err, "Failed to store extracted text");
        }
        Ok(text)
    }

    async fn persist_rubric_grade(
        &self,
        submission_id: &str,
        grading: SubmissionGrading,
    ) -> Result<GradedSubmission, GradingError> {
        let grade = self
            .store
            .commit_grade(NewGrade {
                submission_id: submission_id.to_string(),
                score: grading.score,
                feedback: Some(grading.feedback).filter(|text| !text.trim().is_empty()),
                rubric_scores: grading.rubric_scores,
                ai_response: grading.raw_response,
            })
            .await?;

        Ok(GradedSubmission {
            grade,
            details: GradingDetails::Rubric {
                percentage: grading.percentage,
                strengths: grading.strengths,
                areas_for_improvement: grading.areas_for_improvement,
                suggestions: grading.suggestions,
            },
        })
    }

    async fn grade_quiz(
        &self,
        submission: &Submission,
        assignment: &AssignmentContext,
    ) -> Result<GradedSubmission, GradingError> {
        let questions: Vec<Question> = self
            .store
            .list_questions(&assignment.assignment_id)
            .await?
            .into_iter()
            .map(Question::from)
            .collect();
        if questions.is_empty() {
            return Err(GradingError::NotGradable {
                id: submission.id.clone(),
                reason: "quiz has no questions".to_string(),
            });
        }

        let answers = self.store.list_answers(&submission.id).await?;
        let responses: HashMap<&str, &str> = answers
            .iter()
            .map(|answer| (answer.question_id.as_str(), answer.response.as_str()))
            .collect();

        let mut graded: Vec<(&Question, &str, AnswerGrade)> = Vec::with_capacity(questions.len());
        for group in questions.chunks(QUIZ_ANSWER_CONCURRENCY) {
            let grades = join_all(group.iter().map(|question| {
                let response = responses.get(question.id.as_str()).copied().unwrap_or_default();
                async move { (question, response, self.quiz.grade_answer(question, response).await) }
            }))
            .await;
            graded.extend(grades);
        }

        let max_points: f64 = questions.iter().map(|question| question.points).sum();
        let score = round2(graded.iter().map(|(_, _, grade)| grade.points_earned).sum());
        let correct = graded.iter().filter(|(_, _, grade)| grade.is_correct).count();

        let details: Vec<QuizAnswerDetail> = graded
            .iter()
            .map(|(question, _, grade)| QuizAnswerDetail {
                question_id: question.id.clone(),
                is_correct: grade.is_correct,
                points_earned: grade.points_earned,
                points_possible: question.points,
                feedback: grade.feedback.clone(),
            })
            .collect();
        let results = graded
            .into_iter()
            .map(|(question, response, grade)| AnswerResult {
                question_id: question.id.clone(),
                response: response.to_string(),
                is_correct: grade.is_correct,
                points_earned: grade.points_earned,
                feedback: grade.feedback,
            })
            .collect();

        let grade = self
            .store
            .commit_quiz_grade(
                NewGrade {
                    submission_id: submission.id.clone(),
                    score,
                    feedback: Some(format!(
                        "{correct} of {} questions answered correctly.",
                        questions.len()
                    )),
                    rubric_scores: details
                        .iter()
                        .map(|detail| {
                            (
                                detail.question_id.clone(),
                                CriterionScore {
                                    points: detail.points_earned,
                                    feedback: detail.feedback.clone(),
                                },
                            )
                        })
                        .collect(),
                    ai_response: json!({
                        "kind": "quiz",
                        "max_points": max_points,
                        "answers": details,
                    }),
                },
                results,
            )
            .await?;

        Ok(GradedSubmission { grade, details: GradingDetails::Quiz { max_points, answers: details } })
    }

    fn record_success(&self, graded: &GradedSubmission, duration_seconds: f64) {
        metrics::counter!("grading_jobs_total", "status" => "graded").increment(1);
        metrics::histogram!("grading_duration_seconds").record(duration_seconds);
        tracing::info!(
            submission_id = %graded.grade.submission_id,
            score = graded.grade.score,
            duration_seconds,
            "Submission graded"
        );
        self.audit.record(AuditEvent::submission(
            audit::GRADING_COMPLETED,
            &graded.grade.submission_id,
            json!({"grade_id": graded.grade.id, "score": graded.grade.score}),
        ));
    }

    /// Best-effort `failed` status write. A lost race leaves the winner's
    /// `graded` status alone.
    async fn record_failure(&self, submission_id: &str, err: &GradingError) {
        metrics::counter!("grading_jobs_total", "status" => "failed").increment(1);

        if let GradingError::AlreadyGraded(_) = err {
            tracing::info!(submission_id, "Submission was graded concurrently");
            return;
        }

        tracing::error!(submission_id, error = %err, kind = err.kind(), "Grading failed");
        match self.store.mark_failed(submission_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(submission_id, "Submission left its grading status; not marking failed")
            }
            Err(status_err) => {
                tracing::error!(submission_id, error = %status_err, "Failed to mark submission failed")
            }
        }
        self.audit.record(AuditEvent::submission(
            audit::GRADING_FAILED,
            submission_id,
            json!({"error": err.to_string(), "kind": err.kind()}),
        ));
    }
}
