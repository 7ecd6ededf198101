//! Streaming I/O helpers for reading server-sent events.

mod chunks;
mod sse;

pub use chunks::{Chunks, Error as ChunksError};
pub use sse::Sse;
