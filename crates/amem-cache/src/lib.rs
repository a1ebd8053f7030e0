pub mod contract;
pub mod error;
pub mod key;
pub mod local;
pub mod remote;

pub use contract::{CacheStats, MemoryCache};
pub use error::{CacheError, Result};
pub use local::LocalCache;
pub use remote::{RemoteCache, RemoteKv};
