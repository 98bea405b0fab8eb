pub mod action;
pub mod config;
pub mod document;
pub mod scope;
pub mod session;

pub use action::{Action, ActionKind, ActionRequest};
pub use config::{
    ComposerConfig, Config, LogFormat, LoggingConfig, RetryConfig, RotationPolicy, ServiceConfig,
};
pub use document::{
    Bias, DecorationHandle, DecorationStyle, DocumentVersion, Position, SelectionState, TextRange,
    VisualFeedback,
};
pub use scope::{CapturedSelection, ResolvedRange, Scope};
pub use session::{Chunk, OrchestratorState, SessionId, SessionStatus, TransformSession};
