//! Language-model grading client.
//!
//! Builds prompts from the submission and its assignment context, calls the
//! chat provider under the retry policy, and validates the JSON it returns.

mod prompts;
mod provider;
mod response;
mod retry;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::json;
use thiserror::Error;

use crate::core::config::Settings;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::db::models::RubricCriterion;

pub(crate) use provider::{ChatMessage, ChatProvider, ChatReply, ChatRequest, OpenAiChatClient};
pub(crate) use response::{round2, EssayGrading, ShortAnswerGrading, SubmissionGrading};
pub(crate) use retry::RetryPolicy;

pub(crate) const DEFAULT_SHORT_ANSWER_THRESHOLD: f64 = 80.0;
pub(crate) const DEFAULT_ESSAY_THRESHOLD: f64 = 60.0;
pub(crate) const DEFAULT_BATCH_SIZE: usize = 5;
pub(crate) const DEFAULT_BATCH_PAUSE: Duration = Duration::from_secs(1);

const NO_ANSWER_FEEDBACK: &str = "No answer provided.";

#[derive(Debug, Clone, Error)]
pub(crate) enum AiError {
    #[error("student answer is empty")]
    EmptyInput,
    #[error("malformed AI response: {0}")]
    MalformedResponse(String),
    #[error("AI provider rejected credentials: {0}")]
    ProviderAuth(String),
    #[error("AI provider rejected the request: {0}")]
    ProviderBadRequest(String),
    #[error("AI provider rate limit exceeded")]
    RateLimited,
    #[error("AI provider unavailable ({status}): {message}")]
    ProviderUnavailable { status: u16, message: String },
    #[error("AI provider request timed out")]
    Timeout,
    #[error("network error calling AI provider: {0}")]
    Network(String),
}

impl AiError {
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::MalformedResponse(_)
                | Self::RateLimited
                | Self::ProviderUnavailable { .. }
                | Self::Timeout
                | Self::Network(_)
        )
    }

    fn outcome_label(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::MalformedResponse(_) => "malformed",
            Self::ProviderAuth(_) => "auth",
            Self::ProviderBadRequest(_) => "bad_request",
            Self::RateLimited => "rate_limited",
            Self::ProviderUnavailable { .. } => "unavailable",
            Self::Timeout => "timeout",
            Self::Network(_) => "network",
        }
    }
}

/// Percentages at or above which an answer counts as correct.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct GradingThresholds {
    pub(crate) short_answer: f64,
    pub(crate) essay: f64,
}

impl Default for GradingThresholds {
    fn default() -> Self {
        Self { short_answer: DEFAULT_SHORT_ANSWER_THRESHOLD, essay: DEFAULT_ESSAY_THRESHOLD }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AiGradingConfig {
    pub(crate) grading_model: String,
    pub(crate) quick_model: String,
    pub(crate) max_tokens: u32,
    pub(crate) quick_max_tokens: u32,
    pub(crate) temperature: f64,
    pub(crate) retry: RetryPolicy,
    pub(crate) batch_size: usize,
    pub(crate) batch_pause: Duration,
    pub(crate) thresholds: GradingThresholds,
}

impl Default for AiGradingConfig {
    fn default() -> Self {
        Self {
            grading_model: "gpt-4o".to_string(),
            quick_model: "gpt-4o-mini".to_string(),
            max_tokens: 2000,
            quick_max_tokens: 500,
            temperature: 0.2,
            retry: RetryPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_pause: DEFAULT_BATCH_PAUSE,
            thresholds: GradingThresholds::default(),
        }
    }
}

impl AiGradingConfig {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        let ai = settings.ai();
        let grading = settings.grading();
        Self {
            grading_model: ai.grading_model.clone(),
            quick_model: ai.quick_model.clone(),
            max_tokens: ai.max_tokens,
            quick_max_tokens: ai.quick_max_tokens,
            temperature: ai.temperature,
            retry: RetryPolicy::with_max_attempts(ai.max_attempts),
            batch_size: grading.batch_size.max(1),
            batch_pause: Duration::from_millis(grading.batch_pause_ms),
            thresholds: GradingThresholds {
                short_answer: grading.short_answer_threshold,
                essay: grading.essay_threshold,
            },
        }
    }
}

/// Assignment data a rubric grading call is anchored on.
#[derive(Debug, Clone, Default)]
pub(crate) struct GradingContext {
    pub(crate) rubric: BTreeMap<String, RubricCriterion>,
    pub(crate) assignment_description: Option<String>,
    pub(crate) reference_answer: Option<String>,
    pub(crate) total_points: f64,
}

#[derive(Debug, Clone)]
pub(crate) struct BatchSubmission {
    pub(crate) id: String,
    pub(crate) content: String,
}

#[derive(Debug, Clone)]
pub(crate) struct BatchGradeEntry {
    pub(crate) submission_id: String,
    pub(crate) outcome: Result<SubmissionGrading, AiError>,
}

struct Completion<T> {
    parsed: T,
    reply: ChatReply,
    elapsed: Duration,
}

#[derive(Clone)]
pub(crate) struct AiGradingService {
    provider: Arc<dyn ChatProvider>,
    config: Arc<AiGradingConfig>,
}

impl AiGradingService {
    pub(crate) fn new(provider: Arc<dyn ChatProvider>, config: AiGradingConfig) -> Self {
        Self { provider, config: Arc::new(config) }
    }

    pub(crate) fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let provider = OpenAiChatClient::from_settings(settings)?;
        Ok(Self::new(Arc::new(provider), AiGradingConfig::from_settings(settings)))
    }

    /// Group size and pause between groups for batch work.
    pub(crate) fn batch_pacing(&self) -> (usize, Duration) {
        (self.config.batch_size.max(1), self.config.batch_pause)
    }

    /// Sends one request under the retry policy. Parsing happens inside the
    /// retried closure so malformed output is retried like a transient error.
    async fn call_json<T, P>(
        &self,
        operation: &'static str,
        model: &str,
        max_tokens: u32,
        system_prompt: &str,
        user_prompt: String,
        parse: P,
    ) -> Result<Completion<T>, AiError>
    where
        P: Fn(&str) -> Result<T, AiError>,
    {
        let request = ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage::system(system_prompt), ChatMessage::user(user_prompt)],
            json_response: true,
            temperature: self.config.temperature,
            max_tokens,
        };
        let parse = &parse;
        let timer = Instant::now();

        let result = retry::with_retry(&self.config.retry, operation, |attempt| {
            let provider = Arc::clone(&self.provider);
            let request = request.clone();
            async move {
                tracing::debug!(operation, attempt, model = %request.model, "Sending AI request");
                let reply = provider.complete(request).await?;
                let parsed = parse(&reply.content)?;
                Ok((parsed, reply))
            }
        })
        .await;

        let elapsed = timer.elapsed();
        metrics::histogram!("ai_request_duration_seconds", "operation" => operation)
            .record(elapsed.as_secs_f64());

        match result {
            Ok((parsed, reply)) => {
                metrics::counter!("ai_requests_total", "operation" => operation, "outcome" => "success")
                    .increment(1);
                tracing::info!(
                    operation,
                    model = %reply.model,
                    duration_seconds = elapsed.as_secs_f64(),
                    tokens_used = reply.tokens_used,
                    "AI request completed"
                );
                Ok(Completion { parsed, reply, elapsed })
            }
            Err(err) => {
                metrics::counter!(
                    "ai_requests_total",
                    "operation" => operation,
                    "outcome" => err.outcome_label()
                )
                .increment(1);
                Err(err)
            }
        }
    }

    pub(crate) async fn grade_submission(
        &self,
        student_answer: &str,
        context: &GradingContext,
    ) -> Result<SubmissionGrading, AiError> {
        let student_answer = student_answer.trim();
        if student_answer.is_empty() {
            return Err(AiError::EmptyInput);
        }

        let started_at = primitive_now_utc();
        let total_points = context.total_points;
        let user_prompt = prompts::submission_user_prompt(
            student_answer,
            &prompts::render_rubric(&context.rubric),
            prompts::sanitize(context.assignment_description.as_deref(), prompts::NO_DESCRIPTION),
            prompts::sanitize(context.reference_answer.as_deref(), prompts::NO_REFERENCE),
            total_points,
        );

        let completion = self
            .call_json(
                "grade_submission",
                &self.config.grading_model,
                self.config.max_tokens,
                prompts::SUBMISSION_SYSTEM_PROMPT,
                user_prompt,
                |content| response::parse_rubric_grading(content, total_points),
            )
            .await?;

        let mut grading = completion.parsed;
        grading.raw_response["_metadata"] = json!({
            "model": completion.reply.model,
            "request_started_at": format_primitive(started_at),
            "request_completed_at": format_primitive(primitive_now_utc()),
            "duration_seconds": completion.elapsed.as_secs_f64(),
            "tokens_used": completion.reply.tokens_used,
        });
        Ok(grading)
    }

    pub(crate) async fn grade_short_answer(
        &self,
        student_answer: &str,
        reference_answer: &str,
        question: &str,
        points: f64,
    ) -> Result<ShortAnswerGrading, AiError> {
        let student_answer = student_answer.trim();
        if student_answer.is_empty() {
            return Ok(ShortAnswerGrading {
                score: 0.0,
                percentage: 0.0,
                is_correct: false,
                feedback: NO_ANSWER_FEEDBACK.to_string(),
            });
        }

        let user_prompt = prompts::short_answer_user_prompt(
            question,
            prompts::sanitize(Some(reference_answer), prompts::NO_REFERENCE),
            student_answer,
        );
        let completion = self
            .call_json(
                "grade_short_answer",
                &self.config.quick_model,
                self.config.quick_max_tokens,
                &prompts::short_answer_system_prompt(self.config.thresholds.short_answer),
                user_prompt,
                response::parse_short_answer,
            )
            .await?;

        let (percentage, feedback) = completion.parsed;
        Ok(ShortAnswerGrading {
            score: round2(percentage / 100.0 * points),
            percentage,
            is_correct: percentage >= self.config.thresholds.short_answer,
            feedback,
        })
    }

    pub(crate) async fn grade_essay(
        &self,
        student_answer: &str,
        question: &str,
        reference_answer: Option<&str>,
        points: f64,
    ) -> Result<EssayGrading, AiError> {
        let student_answer = student_answer.trim();
        if student_answer.is_empty() {
            return Ok(EssayGrading {
                score: 0.0,
                percentage: 0.0,
                is_correct: false,
                dimension_scores: BTreeMap::new(),
                feedback: NO_ANSWER_FEEDBACK.to_string(),
            });
        }

        let user_prompt = prompts::essay_user_prompt(
            question,
            prompts::sanitize(reference_answer, prompts::NO_REFERENCE),
            student_answer,
            points,
        );
        let completion = self
            .call_json(
                "grade_essay",
                &self.config.grading_model,
                self.config.max_tokens,
                &prompts::essay_system_prompt(self.config.thresholds.essay),
                user_prompt,
                |content| response::parse_essay(content, points),
            )
            .await?;

        let essay = completion.parsed;
        Ok(EssayGrading {
            score: essay.score,
            percentage: essay.percentage,
            is_correct: essay.percentage >= self.config.thresholds.essay,
            feedback: compose_essay_feedback(&essay.feedback, &essay.strengths, &essay.improvements),
            dimension_scores: essay.dimension_scores,
        })
    }

    /// Grades submissions in groups of `batch_size`, concurrently within a
    /// group, pausing between groups. One entry per input, in input order.
    pub(crate) async fn batch_grade(
        &self,
        submissions: &[BatchSubmission],
        context: &GradingContext,
    ) -> Vec<BatchGradeEntry> {
        let mut entries = Vec::with_capacity(submissions.len());
        let (group_size, pause) = self.batch_pacing();

        for (index, group) in submissions.chunks(group_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(pause).await;
            }

            tracing::info!(group = index, size = group.len(), "Grading batch group");
            let outcomes = join_all(group.iter().map(|submission| async move {
                BatchGradeEntry {
                    submission_id: submission.id.clone(),
                    outcome: self.grade_submission(&submission.content, context).await,
                }
            }))
            .await;
            entries.extend(outcomes);
        }

        entries
    }
}

fn compose_essay_feedback(summary: &str, strengths: &[String], improvements: &[String]) -> String {
    let mut sections = Vec::new();
    if !summary.trim().is_empty() {
        sections.push(summary.trim().to_string());
    }
    if !strengths.is_empty() {
        sections.push(format!("**Strengths:**\n{}", bullet_list(strengths)));
    }
    if !improvements.is_empty() {
        sections.push(format!("**Areas for Improvement:**\n{}", bullet_list(improvements)));
    }
    sections.join("\n\n")
}

fn bullet_list(items: &[String]) -> String {
    items.iter().map(|item| format!("- {item}")).collect::<Vec<_>>().join("\n")
}
