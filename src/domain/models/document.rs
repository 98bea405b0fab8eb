//! Addressing primitives shared by every document backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque address of a location inside a document.
///
/// Positions are comparable within a single document version. After the
/// document changes they have to be mapped forward with
/// [`Document::map_position`](crate::domain::ports::Document::map_position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(pub usize);

impl Position {
    pub const fn offset(self) -> usize {
        self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Half-open range `[start, end)` with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    /// Build a range from two endpoints in any order
    pub fn new(a: Position, b: Position) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub const fn collapsed(at: Position) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub const fn len(&self) -> usize {
        self.end.0.saturating_sub(self.start.0)
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Selection as reported by the editor: anchor is where the drag started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub anchor: Position,
    pub head: Position,
}

impl SelectionState {
    pub const fn new(anchor: Position, head: Position) -> Self {
        Self { anchor, head }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    pub fn range(&self) -> TextRange {
        TextRange::new(self.anchor, self.head)
    }
}

/// Monotonic counter bumped by every content change.
pub type DocumentVersion = u64;

/// Which side an insertion exactly at a mapped position lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// The position stays in front of text inserted at it
    Before,
    /// The position moves past text inserted at it
    After,
}

/// Transient, non-content styling applied over text being rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecorationStyle {
    StrikeThrough,
    Highlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DecorationHandle(pub u64);

/// Feedback shown while an action is rewriting its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualFeedback {
    None,
    #[default]
    StrikeThrough,
    Highlight,
}

impl VisualFeedback {
    pub const fn decoration(self) -> Option<DecorationStyle> {
        match self {
            Self::None => None,
            Self::StrikeThrough => Some(DecorationStyle::StrikeThrough),
            Self::Highlight => Some(DecorationStyle::Highlight),
        }
    }
}
