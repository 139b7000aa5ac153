pub(crate) mod answers;
pub(crate) mod assignments;
pub(crate) mod audit;
pub(crate) mod grades;
pub(crate) mod questions;
pub(crate) mod store;
pub(crate) mod submissions;
