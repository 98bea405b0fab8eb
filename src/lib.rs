//! Composer - AI-assisted writing composer
//!
//! Rewrites a region of a document ("scope") with a language-model action,
//! streaming the transformed text back into the document in place.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): actions, scopes, sessions, and the ports for
//!   the document surface and the transformation service
//! - **Service Layer** (`services`): the rewrite pipeline (scope tracking,
//!   extraction, streaming client, patcher, orchestrator)
//! - **Infrastructure Layer** (`infrastructure`): in-memory document, HTTP
//!   streaming client, configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use composer::services::{ActionOrchestrator, OrchestratorSettings, StreamingTransformClient};
//!
//! let orchestrator = ActionOrchestrator::new(document, client, OrchestratorSettings::default());
//! orchestrator.open_panel().await;
//! orchestrator.dispatch(ActionRequest::new(Action::Grammar, "gpt-4o-mini", 0.2))?;
//! orchestrator.wait_idle().await;
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ComposerError, DocumentError, ErrorKind, TransformError};
pub use domain::models::{
    Action, ActionKind, ActionRequest, Config, OrchestratorState, Scope, VisualFeedback,
};
pub use domain::ports::{Document, TransformService};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::document::MemoryDocument;
pub use services::{ActionEvent, ActionOrchestrator, OrchestratorSettings};
