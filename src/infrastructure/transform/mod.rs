//! Transformation service adapter
//!
//! HTTP client for the streaming rewrite backend, response body decoding,
//! and the retry policy used while establishing a stream.

pub mod client;
pub mod errors;
pub mod retry;
pub mod streaming;

pub use client::{HttpTransformConfig, HttpTransformService};
pub use errors::classify_status;
pub use retry::{RetryFailure, RetryPolicy};
pub use streaming::{parse_sse_event, SseChunkStream, StreamEvent, TextChunkStream};
