//! Transform sessions and the orchestrator state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::action::ActionRequest;
use super::scope::Scope;

/// One incremental fragment of transformed text.
///
/// Chunks carry no position: arrival order is application order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
}

impl Chunk {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl From<&str> for Chunk {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Chunk {
    fn from(text: String) -> Self {
        Self { text }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// One in-flight or finished transformation.
#[derive(Debug, Clone)]
pub struct TransformSession {
    pub id: SessionId,
    pub request: ActionRequest,
    /// Scope as it was at dispatch time
    pub scope: Scope,
    pub chunks: Vec<Chunk>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TransformSession {
    pub fn new(request: ActionRequest, scope: Scope) -> Self {
        Self {
            id: SessionId::new(),
            request,
            scope,
            chunks: Vec::new(),
            status: SessionStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub const fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Record a received chunk. Returns its zero-based sequence number.
    pub fn push_chunk(&mut self, chunk: Chunk) -> usize {
        if self.status == SessionStatus::Pending {
            self.status = SessionStatus::Streaming;
        }
        self.chunks.push(chunk);
        self.chunks.len() - 1
    }

    pub fn mark_streaming(&mut self) {
        if self.status == SessionStatus::Pending {
            self.status = SessionStatus::Streaming;
        }
    }

    /// Move to a terminal status; the first terminal status wins.
    pub fn finish(&mut self, status: SessionStatus) {
        debug_assert!(status.is_terminal());
        if self.is_active() {
            self.status = status;
            self.finished_at = Some(Utc::now());
        }
    }

    /// Concatenation of every chunk received so far
    pub fn output(&self) -> String {
        self.chunks.iter().map(|c| c.text.as_str()).collect()
    }
}

/// States of the action orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestratorState {
    #[default]
    Idle,
    Resolving,
    Streaming,
    Finalizing,
    Failed,
    Cancelled,
}

impl OrchestratorState {
    pub const fn can_transition_to(self, next: Self) -> bool {
        use OrchestratorState::{Cancelled, Failed, Finalizing, Idle, Resolving, Streaming};
        matches!(
            (self, next),
            (Idle, Resolving)
                | (Resolving, Streaming | Failed | Cancelled)
                | (Streaming, Finalizing | Failed | Cancelled)
                | (Finalizing | Failed | Cancelled, Idle)
        )
    }
}

impl fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Streaming => "streaming",
            Self::Finalizing => "finalizing",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}
