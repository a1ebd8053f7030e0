pub mod error;
pub mod format;
pub mod merge;
pub mod planner;

pub use error::{RetrievalError, Result};
pub use format::{format_ingestion_context, format_model_context};
pub use merge::merge_and_dedupe;
pub use planner::{PlannedContext, RetrievalPlanner};
