//! Application services
//!
//! The rewrite pipeline: scope tracking, text extraction, the streaming
//! client, the document patcher and the orchestrator that drives them.

pub mod action_orchestrator;
pub mod document_patcher;
pub mod scope_tracker;
pub mod streaming_client;
pub mod text_extractor;

pub use action_orchestrator::{ActionEvent, ActionOrchestrator, OrchestratorSettings};
pub use document_patcher::{DocumentPatcher, EditSession, PatchSummary};
pub use scope_tracker::ScopeTracker;
pub use streaming_client::{StreamingTransformClient, TransformStream};
pub use text_extractor::{ExtractedText, TextExtractor};
