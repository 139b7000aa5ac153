pub(crate) mod ai_grading;
pub(crate) mod audit;
pub(crate) mod quiz_grading;
pub(crate) mod storage;
pub(crate) mod text_extraction;
