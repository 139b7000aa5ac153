use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::db::models::CriterionScore;

use super::AiError;

/// Essay dimensions and their share of the question's points.
pub(crate) const ESSAY_DIMENSIONS: [(&str, f64); 4] = [
    ("content_accuracy", 0.40),
    ("completeness", 0.25),
    ("clarity_organization", 0.20),
    ("critical_thinking", 0.15),
];

const SCORE_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SubmissionGrading {
    pub(crate) score: f64,
    pub(crate) percentage: f64,
    pub(crate) rubric_scores: BTreeMap<String, CriterionScore>,
    pub(crate) feedback: String,
    pub(crate) strengths: Vec<String>,
    pub(crate) areas_for_improvement: Vec<String>,
    pub(crate) suggestions: Vec<String>,
    pub(crate) raw_response: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ShortAnswerGrading {
    pub(crate) score: f64,
    pub(crate) percentage: f64,
    pub(crate) is_correct: bool,
    pub(crate) feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct EssayGrading {
    pub(crate) score: f64,
    pub(crate) percentage: f64,
    pub(crate) is_correct: bool,
    pub(crate) dimension_scores: BTreeMap<String, f64>,
    pub(crate) feedback: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RubricScoreEntry {
    Detailed(CriterionScore),
    Points(f64),
}

impl From<RubricScoreEntry> for CriterionScore {
    fn from(entry: RubricScoreEntry) -> Self {
        match entry {
            RubricScoreEntry::Detailed(score) => score,
            RubricScoreEntry::Points(points) => CriterionScore { points, feedback: String::new() },
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
struct RubricGradingPayload {
    overall_score: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0))]
    percentage: Option<f64>,
    rubric_scores: Option<BTreeMap<String, RubricScoreEntry>>,
    feedback: Option<String>,
    strengths: Option<Vec<String>>,
    areas_for_improvement: Option<Vec<String>>,
    suggestions: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Validate)]
struct ShortAnswerPayload {
    #[validate(required, range(min = 0.0, max = 100.0))]
    percentage: Option<f64>,
    feedback: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct EssayPayload {
    score: Option<f64>,
    #[validate(range(min = 0.0, max = 100.0))]
    percentage: Option<f64>,
    dimension_scores: Option<BTreeMap<String, f64>>,
    strengths: Option<Vec<String>>,
    improvements: Option<Vec<String>>,
    feedback: Option<String>,
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn percentage_of(score: f64, total: f64) -> f64 {
    if total > 0.0 {
        (score / total * 100.0).round()
    } else {
        0.0
    }
}

fn decode<T>(content: &str) -> Result<(T, Value), AiError>
where
    T: DeserializeOwned + Validate,
{
    let raw: Value = serde_json::from_str(content)
        .map_err(|err| AiError::MalformedResponse(format!("response is not valid JSON: {err}")))?;
    let payload: T = serde_json::from_value(raw.clone())
        .map_err(|err| AiError::MalformedResponse(format!("unexpected response shape: {err}")))?;
    payload.validate().map_err(|err| AiError::MalformedResponse(err.to_string()))?;
    Ok((payload, raw))
}

fn within(value: f64, max: f64) -> bool {
    value.is_finite() && value >= 0.0 && value <= max + SCORE_TOLERANCE
}

pub(crate) fn parse_rubric_grading(
    content: &str,
    total_points: f64,
) -> Result<SubmissionGrading, AiError> {
    let (payload, raw) = decode::<RubricGradingPayload>(content)?;

    let score = payload
        .overall_score
        .ok_or_else(|| AiError::MalformedResponse("overall_score is missing".to_string()))?;
    if !within(score, total_points) {
        return Err(AiError::MalformedResponse(format!(
            "overall_score {score} is outside [0, {total_points}]"
        )));
    }

    Ok(SubmissionGrading {
        score,
        percentage: payload.percentage.unwrap_or_else(|| percentage_of(score, total_points)),
        rubric_scores: payload
            .rubric_scores
            .unwrap_or_default()
            .into_iter()
            .map(|(key, entry)| (key, entry.into()))
            .collect(),
        feedback: payload.feedback.unwrap_or_default(),
        strengths: payload.strengths.unwrap_or_default(),
        areas_for_improvement: payload.areas_for_improvement.unwrap_or_default(),
        suggestions: payload.suggestions.unwrap_or_default(),
        raw_response: raw,
    })
}

/// Returns `(percentage, feedback)`; correctness is decided by the caller's threshold.
pub(crate) fn parse_short_answer(content: &str) -> Result<(f64, String), AiError> {
    let (payload, _) = decode::<ShortAnswerPayload>(content)?;
    let percentage = payload
        .percentage
        .ok_or_else(|| AiError::MalformedResponse("percentage is missing".to_string()))?;
    Ok((percentage, payload.feedback.unwrap_or_default()))
}

pub(crate) struct EssayBreakdown {
    pub(crate) score: f64,
    pub(crate) percentage: f64,
    pub(crate) dimension_scores: BTreeMap<String, f64>,
    pub(crate) strengths: Vec<String>,
    pub(crate) improvements: Vec<String>,
    pub(crate) feedback: String,
}

pub(crate) fn parse_essay(content: &str, points: f64) -> Result<EssayBreakdown, AiError> {
    let (payload, _) = decode::<EssayPayload>(content)?;
    let dimension_scores = payload.dimension_scores.unwrap_or_default();

    for (name, weight) in ESSAY_DIMENSIONS {
        if let Some(value) = dimension_scores.get(name) {
            let cap = weight * points;
            if !within(*value, cap) {
                return Err(AiError::MalformedResponse(format!(
                    "{name} score {value} is outside [0, {cap}]"
                )));
            }
        }
    }

    let score = match payload.score {
        Some(score) => score,
        None if !dimension_scores.is_empty() => ESSAY_DIMENSIONS
            .iter()
            .filter_map(|(name, _)| dimension_scores.get(*name))
            .sum(),
        None => return Err(AiError::MalformedResponse("essay score is missing".to_string())),
    };
    if !within(score, points) {
        return Err(AiError::MalformedResponse(format!(
            "essay score {score} is outside [0, {points}]"
        )));
    }

    Ok(EssayBreakdown {
        score: round2(score),
        percentage: payload.percentage.unwrap_or_else(|| percentage_of(score, points)),
        dimension_scores,
        strengths: payload.strengths.unwrap_or_default(),
        improvements: payload.improvements.unwrap_or_default(),
        feedback: payload.feedback.unwrap_or_default(),
    })
}
