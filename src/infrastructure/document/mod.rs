//! Document backends implementing the `Document` port.

pub mod memory;

pub use memory::{Decoration, MemoryDocument, DEFAULT_CHANGE_LOG_LIMIT};
