use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::{Answer, Assignment, CriterionScore, Grade, QuestionRow, Rubric, Submission};
use crate::repositories;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    /// Unique constraint on `grades.submission_id` rejected the insert.
    #[error("a grade already exists for submission {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub(crate) struct SubmissionContext {
    pub(crate) submission: Submission,
    pub(crate) assignment: Assignment,
    pub(crate) rubric: Option<Rubric>,
}

#[derive(Debug, Clone)]
pub(crate) struct NewGrade {
    pub(crate) submission_id: String,
    pub(crate) score: f64,
    pub(crate) feedback: Option<String>,
    pub(crate) rubric_scores: BTreeMap<String, CriterionScore>,
    pub(crate) ai_response: serde_json::Value,
}

#[derive(Debug, Clone)]
pub(crate) struct AnswerResult {
    pub(crate) question_id: String,
    pub(crate) response: String,
    pub(crate) is_correct: bool,
    pub(crate) points_earned: f64,
    pub(crate) feedback: String,
}

/// Persistence seam for the grading orchestrator.
///
/// `commit_grade` and `commit_quiz_grade` are atomic: the grade row and the
/// `graded` status land together or not at all.
#[async_trait]
pub(crate) trait GradingStore: Send + Sync {
    async fn find_submission_context(
        &self,
        submission_id: &str,
    ) -> Result<Option<SubmissionContext>, StoreError>;

    async fn find_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<Option<(Assignment, Option<Rubric>)>, StoreError>;

    async fn list_pending_submissions(
        &self,
        assignment_id: &str,
    ) -> Result<Vec<Submission>, StoreError>;

    async fn grade_exists(&self, submission_id: &str) -> Result<bool, StoreError>;

    async fn save_extracted_content(
        &self,
        submission_id: &str,
        content: &str,
    ) -> Result<(), StoreError>;

    /// Conditional `-> grading` transition. `false` means another writer
    /// graded the submission or moved it out of a gradable status.
    async fn begin_grading(&self, submission_id: &str) -> Result<bool, StoreError>;

    /// Conditional `-> failed` transition that leaves graded submissions alone.
    async fn mark_failed(&self, submission_id: &str) -> Result<bool, StoreError>;

    async fn commit_grade(&self, grade: NewGrade) -> Result<Grade, StoreError>;

    async fn list_questions(&self, assignment_id: &str) -> Result<Vec<QuestionRow>, StoreError>;

    async fn list_answers(&self, submission_id: &str) -> Result<Vec<Answer>, StoreError>;

    async fn commit_quiz_grade(
        &self,
        grade: NewGrade,
        answers: Vec<AnswerResult>,
    ) -> Result<Grade, StoreError>;
}

#[derive(Clone)]
pub(crate) struct PgGradingStore {
    pool: PgPool,
}

impl PgGradingStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_grade_and_mark_graded(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        grade: &NewGrade,
    ) -> Result<Grade, StoreError> {
        let now = primitive_now_utc();
        let id = Uuid::new_v4().to_string();

        let inserted = repositories::grades::insert(
            &mut **tx,
            repositories::grades::CreateGrade {
                id: &id,
                submission_id: &grade.submission_id,
                score: grade.score,
                feedback: grade.feedback.as_deref(),
                rubric_scores: &grade.rubric_scores,
                ai_response: &grade.ai_response,
                graded_by: None,
                created_at: now,
            },
        )
        .await
        .map_err(|err| map_grade_conflict(err, &grade.submission_id))?;

        repositories::submissions::mark_graded(&mut **tx, &grade.submission_id, now).await?;

        Ok(inserted)
    }
}

fn map_grade_conflict(err: sqlx::Error, submission_id: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Conflict(submission_id.to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl GradingStore for PgGradingStore {
    async fn find_submission_context(
        &self,
        submission_id: &str,
    ) -> Result<Option<SubmissionContext>, StoreError> {
        let Some(submission) =
            repositories::submissions::find_by_id(&self.pool, submission_id).await?
        else {
            return Ok(None);
        };

        let Some(assignment) =
            repositories::assignments::find_by_id(&self.pool, &submission.assignment_id).await?
        else {
            return Ok(None);
        };

        let rubric = repositories::assignments::find_rubric(&self.pool, &assignment.id).await?;

        Ok(Some(SubmissionContext { submission, assignment, rubric }))
    }

    async fn find_assignment(
        &self,
        assignment_id: &str,
    ) -> Result<Option<(Assignment, Option<Rubric>)>, StoreError> {
        let Some(assignment) =
            repositories::assignments::find_by_id(&self.pool, assignment_id).await?
        else {
            return Ok(None);
        };

        let rubric = repositories::assignments::find_rubric(&self.pool, &assignment.id).await?;
        Ok(Some((assignment, rubric)))
    }

    async fn list_pending_submissions(
        &self,
        assignment_id: &str,
    ) -> Result<Vec<Submission>, StoreError> {
        Ok(repositories::submissions::list_awaiting_grading(&self.pool, assignment_id).await?)
    }

    async fn grade_exists(&self, submission_id: &str) -> Result<bool, StoreError> {
        Ok(repositories::grades::exists_for_submission(&self.pool, submission_id).await?)
    }

    async fn save_extracted_content(
        &self,
        submission_id: &str,
        content: &str,
    ) -> Result<(), StoreError> {
        repositories::submissions::update_content(
            &self.pool,
            submission_id,
            content,
            primitive_now_utc(),
        )
        .await?;
        Ok(())
    }

    async fn begin_grading(&self, submission_id: &str) -> Result<bool, StoreError> {
        Ok(repositories::submissions::claim_for_grading(
            &self.pool,
            submission_id,
            primitive_now_utc(),
        )
        .await?)
    }

    async fn mark_failed(&self, submission_id: &str) -> Result<bool, StoreError> {
        Ok(repositories::submissions::mark_failed(&self.pool, submission_id, primitive_now_utc())
            .await?)
    }

    async fn commit_grade(&self, grade: NewGrade) -> Result<Grade, StoreError> {
        let mut tx = self.pool.begin().await?;
        let inserted = Self::insert_grade_and_mark_graded(&mut tx, &grade).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    async fn list_questions(&self, assignment_id: &str) -> Result<Vec<QuestionRow>, StoreError> {
        Ok(repositories::questions::list_by_assignment(&self.pool, assignment_id).await?)
    }

    async fn list_answers(&self, submission_id: &str) -> Result<Vec<Answer>, StoreError> {
        Ok(repositories::answers::list_by_submission(&self.pool, submission_id).await?)
    }

    async fn commit_quiz_grade(
        &self,
        grade: NewGrade,
        answers: Vec<AnswerResult>,
    ) -> Result<Grade, StoreError> {
        let mut tx = self.pool.begin().await?;
        let graded_at = primitive_now_utc();

        for answer in &answers {
            repositories::answers::upsert_graded(
                &mut *tx,
                repositories::answers::GradedAnswer {
                    submission_id: &grade.submission_id,
                    question_id: &answer.question_id,
                    response: &answer.response,
                    is_correct: answer.is_correct,
                    points_earned: answer.points_earned,
                    feedback: &answer.feedback,
                    graded_at,
                },
            )
            .await?;
        }

        let inserted = Self::insert_grade_and_mark_graded(&mut tx, &grade).await?;
        tx.commit().await?;
        Ok(inserted)
    }
}
