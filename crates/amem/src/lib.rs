pub mod core;
pub mod error;
pub mod messages;
mod reconstruct;

pub use core::MemoryCore;
pub use error::{Error, Result};
pub use messages::{ChatMessage, Role};
