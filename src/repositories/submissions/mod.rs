mod commands;
mod queries;

pub(crate) use commands::{claim_for_grading, mark_failed, mark_graded, update_content};
pub(crate) use queries::{find_by_id, list_awaiting_grading};

pub(crate) const COLUMNS: &str = "\
    id, assignment_id, student_id, version, status, content, pdf_url, submitted_at, \
    created_at, updated_at";
