use serde::Serialize;

use super::document::{DocumentVersion, Position, TextRange};

/// The span of the document an action targets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    /// The whole document
    #[default]
    Document,
    /// A user-highlighted range, remembered as of the version it was captured in
    Selection(CapturedSelection),
}

impl Scope {
    pub const fn is_document(&self) -> bool {
        matches!(self, Self::Document)
    }
}

/// A selection plus what is needed to find it again after edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapturedSelection {
    pub anchor: Position,
    pub head: Position,
    /// Document version the positions belong to
    pub version: DocumentVersion,
    /// Text the selection covered at capture time
    pub snapshot: String,
}

impl CapturedSelection {
    pub fn range(&self) -> TextRange {
        TextRange::new(self.anchor, self.head)
    }
}

/// A scope translated into positions valid for the current document version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedRange {
    pub range: TextRange,
    pub version: DocumentVersion,
    pub whole_document: bool,
}
