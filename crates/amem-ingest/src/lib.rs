pub mod draft;
pub mod error;
pub mod expiry;
pub mod pipeline;
pub mod similarity;

pub use draft::MemoryDraft;
pub use error::{IngestError, Result};
pub use expiry::compute_expiry;
pub use pipeline::{IngestReport, IngestionPipeline};
pub use similarity::{jaccard_similarity, resolve_match};
