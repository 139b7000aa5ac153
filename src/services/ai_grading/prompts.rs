use std::collections::BTreeMap;

use crate::db::models::RubricCriterion;

pub(crate) const NO_RUBRIC: &str = "No rubric criteria provided";
pub(crate) const NO_DESCRIPTION: &str = "No assignment description provided";
pub(crate) const NO_REFERENCE: &str = "No reference answer provided";

const BINARY_MARKERS: [&str; 2] = ["%PDF-", "PK\u{3}\u{4}"];

pub(crate) const SUBMISSION_SYSTEM_PROMPT: &str = r#"You are an experienced academic grader.
Grade the student's submission strictly against the rubric and the reference answer when one is given.
Be consistent: the same submission must receive the same score on every run.
Never award more than the maximum points of a criterion or of the assignment.

Respond with strict JSON of this shape:
{
  "overall_score": <number between 0 and the total points>,
  "percentage": <number between 0 and 100>,
  "rubric_scores": {
    "<criterion key>": {"points": <number>, "feedback": "<why these points>"}
  },
  "feedback": "<overall feedback addressed to the student>",
  "strengths": ["<strength>"],
  "areas_for_improvement": ["<weakness>"],
  "suggestions": ["<concrete next step>"]
}"#;

const THRESHOLD_TOKEN: &str = "{threshold}";

const SHORT_ANSWER_SYSTEM_PROMPT: &str = r#"You grade short quiz answers by meaning, not wording.
Compare the student's answer with the reference answer and estimate how correct it is.
An answer with percentage >= {threshold} counts as correct.

Respond with strict JSON:
{"percentage": <0-100>, "is_correct": <bool>, "feedback": "<one or two sentences>"}"#;

const ESSAY_SYSTEM_PROMPT: &str = r#"You grade essay answers on four weighted dimensions:
- content_accuracy (40% of the points)
- completeness (25% of the points)
- clarity_organization (20% of the points)
- critical_thinking (15% of the points)
Each dimension score must lie between 0 and that dimension's share of the points.
An essay with percentage >= {threshold} counts as correct.

Respond with strict JSON:
{
  "score": <total points earned>,
  "percentage": <0-100>,
  "is_correct": <bool>,
  "dimension_scores": {
    "content_accuracy": <number>,
    "completeness": <number>,
    "clarity_organization": <number>,
    "critical_thinking": <number>
  },
  "strengths": ["<strength>"],
  "improvements": ["<improvement>"],
  "feedback": "<summary>"
}"#;

pub(crate) fn short_answer_system_prompt(threshold: f64) -> String {
    SHORT_ANSWER_SYSTEM_PROMPT.replace(THRESHOLD_TOKEN, &threshold.to_string())
}

pub(crate) fn essay_system_prompt(threshold: f64) -> String {
    ESSAY_SYSTEM_PROMPT.replace(THRESHOLD_TOKEN, &threshold.to_string())
}

/// True when the text looks like raw document bytes rather than prose.
pub(crate) fn looks_binary(text: &str) -> bool {
    text.contains('\0') || BINARY_MARKERS.iter().any(|marker| text.contains(marker))
}

/// Replaces blank or binary-looking context with a placeholder.
pub(crate) fn sanitize<'a>(value: Option<&'a str>, placeholder: &'a str) -> &'a str {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() && !looks_binary(text) => text,
        _ => placeholder,
    }
}

pub(crate) fn render_rubric(criteria: &BTreeMap<String, RubricCriterion>) -> String {
    if criteria.is_empty() {
        return NO_RUBRIC.to_string();
    }

    criteria
        .iter()
        .map(|(key, criterion)| {
            let description = sanitize(Some(&criterion.description), "no description");
            format!("- {key} (max {} points): {description}", criterion.max_points)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn submission_user_prompt(
    student_answer: &str,
    rubric: &str,
    description: &str,
    reference: &str,
    total_points: f64,
) -> String {
    format!(
        "Assignment description:\n{description}\n\n\
         Rubric:\n{rubric}\n\n\
         Reference answer:\n{reference}\n\n\
         Total points: {total_points}\n\n\
         Student submission:\n{student_answer}\n\n\
         Return the JSON described in the instructions."
    )
}

pub(crate) fn short_answer_user_prompt(
    question: &str,
    reference: &str,
    student_answer: &str,
) -> String {
    format!(
        "Question:\n{question}\n\nReference answer:\n{reference}\n\nStudent answer:\n{student_answer}"
    )
}

pub(crate) fn essay_user_prompt(
    question: &str,
    reference: &str,
    student_answer: &str,
    points: f64,
) -> String {
    format!(
        "Question:\n{question}\n\nReference answer:\n{reference}\n\n\
         Points available: {points}\n\nStudent essay:\n{student_answer}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correctness_thresholds_are_rendered_into_prompts() {
        let short = short_answer_system_prompt(70.0);
        assert!(short.contains("percentage >= 70 counts as correct"));
        assert!(!short.contains(THRESHOLD_TOKEN));

        let essay = essay_system_prompt(55.5);
        assert!(essay.contains("percentage >= 55.5 counts as correct"));
        assert!(essay.contains(r#""critical_thinking": <number>"#));
    }

    #[test]
    fn binary_context_is_replaced_with_placeholder() {
        let pdf = "%PDF-1.7\n1 0 obj << /Type /Catalog >>";
        assert_eq!(sanitize(Some(pdf), NO_REFERENCE), NO_REFERENCE);
        assert_eq!(sanitize(Some("with\0nul"), NO_DESCRIPTION), NO_DESCRIPTION);
        assert_eq!(sanitize(Some("   "), NO_DESCRIPTION), NO_DESCRIPTION);
        assert_eq!(sanitize(None, NO_REFERENCE), NO_REFERENCE);
        assert_eq!(sanitize(Some("  Explain osmosis. "), NO_DESCRIPTION), "Explain osmosis.");
    }

    #[test]
    fn rubric_renders_one_line_per_criterion() {
        let mut criteria = BTreeMap::new();
        criteria.insert(
            "accuracy".to_string(),
            RubricCriterion { max_points: 70.0, description: "Facts are right".to_string() },
        );
        criteria.insert(
            "explanation".to_string(),
            RubricCriterion { max_points: 30.0, description: String::new() },
        );

        let rendered = render_rubric(&criteria);
        assert_eq!(
            rendered,
            "- accuracy (max 70 points): Facts are right\n- explanation (max 30 points): no description"
        );
        assert_eq!(render_rubric(&BTreeMap::new()), NO_RUBRIC);
    }
}
