use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::errors::DocumentError;
use crate::domain::models::document::{
    Bias, DecorationHandle, DecorationStyle, DocumentVersion, Position, SelectionState, TextRange,
};

/// Editing surface the composer reads from and writes into.
///
/// Implementations keep a version counter and enough history to map old
/// positions forward; that is what lets a scope captured earlier be found
/// again after the user kept typing.
pub trait Document: Send {
    /// Current selection, `None` when the editor has no focus
    fn selection(&self) -> Option<SelectionState>;

    fn version(&self) -> DocumentVersion;

    /// Range spanning the whole content
    fn full_range(&self) -> TextRange;

    /// Plain text of `range`, block boundaries rendered as `\n`
    fn text(&self, range: TextRange) -> Result<String, DocumentError>;

    /// Replace `range` with `text`; returns the position right after the inserted text.
    fn replace_range(&mut self, range: TextRange, text: &str) -> Result<Position, DocumentError>;

    fn decorate(
        &mut self,
        range: TextRange,
        style: DecorationStyle,
    ) -> Result<DecorationHandle, DocumentError>;

    /// Returns false if the handle was unknown
    fn remove_decoration(&mut self, handle: DecorationHandle) -> bool;

    /// Map a position from `since` to the current version.
    ///
    /// Returns `None` if the content around the position was deleted in the
    /// meantime (or `since` is not a version of this document).
    fn map_position(&self, position: Position, since: DocumentVersion, bias: Bias)
        -> Option<Position>;
}

/// Document shared between the host (user edits) and the active session.
pub type SharedDocument<D> = Arc<Mutex<D>>;
