pub mod backend;
pub mod error;
pub mod filter_compile;
pub mod pinecone;
pub mod record;
pub mod router;
pub mod upstash;

pub use backend::VectorBackend;
pub use error::{BackendError, Result};
pub use pinecone::PineconeBackend;
pub use record::{VectorMatch, VectorRecord, category_from_metadata, lifespan_from_metadata, memory_metadata, status_from_metadata};
pub use router::VectorRouter;
pub use upstash::UpstashBackend;
