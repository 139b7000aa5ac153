use crate::db::models::{Assignment, Rubric};
use crate::db::types::AssignmentKind;
use crate::services::ai_grading::GradingContext;

/// Read-only view of an assignment, rebuilt for every grading run so rubric
/// and reference edits apply immediately.
#[derive(Debug, Clone)]
pub(crate) struct AssignmentContext {
    pub(crate) assignment_id: String,
    pub(crate) kind: AssignmentKind,
    pub(crate) grading: GradingContext,
}

impl AssignmentContext {
    pub(crate) fn assemble(assignment: &Assignment, rubric: Option<&Rubric>) -> Self {
        let reference_answer = non_blank(assignment.reference_pdf_text.as_deref())
            .or_else(|| non_blank(assignment.reference_answer.as_deref()));

        Self {
            assignment_id: assignment.id.clone(),
            kind: assignment.kind,
            grading: GradingContext {
                rubric: rubric.map(|rubric| rubric.criteria.0.clone()).unwrap_or_default(),
                assignment_description: non_blank(assignment.description.as_deref()),
                reference_answer,
                total_points: assignment.total_points,
            },
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|text| !text.is_empty()).map(ToString::to_string)
}
