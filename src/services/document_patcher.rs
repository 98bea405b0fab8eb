//! Incremental application of streamed chunks into the live document.
//!
//! The patcher keeps one running cursor per edit. The first chunk replaces the
//! original target range; every following chunk is inserted at the cursor,
//! which then advances past it. Edits the user makes elsewhere between two
//! chunks are absorbed by mapping the cursor (or, before the first chunk, the
//! untouched target range) through the document's change log. Edits inside
//! the range being rewritten are not reconciled.

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::errors::ComposerError;
use crate::domain::models::document::{
    Bias, DecorationHandle, DocumentVersion, Position, TextRange, VisualFeedback,
};
use crate::domain::models::scope::ResolvedRange;
use crate::domain::models::session::Chunk;
use crate::domain::ports::Document;

/// State of one in-progress rewrite.
#[derive(Debug)]
pub struct EditSession {
    start: Position,
    original_end: Position,
    cursor: Position,
    synced_version: DocumentVersion,
    decoration: Option<DecorationHandle>,
    replaced: bool,
    chunks_applied: usize,
}

impl EditSession {
    pub const fn chunks_applied(&self) -> usize {
        self.chunks_applied
    }

    /// Whether the original text has been replaced yet
    pub const fn has_replaced(&self) -> bool {
        self.replaced
    }

    pub const fn cursor(&self) -> Position {
        self.cursor
    }

    pub const fn decoration(&self) -> Option<DecorationHandle> {
        self.decoration
    }

    /// Range currently holding the rewrite (or the untouched original)
    pub fn range(&self) -> TextRange {
        if self.replaced {
            TextRange::new(self.start, self.cursor)
        } else {
            TextRange::new(self.start, self.original_end)
        }
    }

    /// Catch up with edits made by anyone else since our last write.
    fn sync<D: Document + ?Sized>(&mut self, document: &D) -> Result<(), ComposerError> {
        let version = document.version();
        if version == self.synced_version {
            return Ok(());
        }

        let since = self.synced_version;
        if self.replaced {
            let start = document.map_position(self.start, since, Bias::After);
            let cursor = document.map_position(self.cursor, since, Bias::Before);
            let (Some(start), Some(cursor)) = (start, cursor) else {
                return Err(ComposerError::PatchTargetLost);
            };
            self.start = start;
            self.cursor = cursor.max(start);
        } else {
            let start = document.map_position(self.start, since, Bias::After);
            let end = document.map_position(self.original_end, since, Bias::Before);
            let (Some(start), Some(end)) = (start, end) else {
                return Err(ComposerError::PatchTargetLost);
            };
            self.start = start;
            self.original_end = end.max(start);
            self.cursor = start;
        }

        debug!(since, version, start = %self.start, cursor = %self.cursor, "Mapped edit through foreign changes");
        self.synced_version = version;
        Ok(())
    }
}

/// Outcome of a finished or aborted edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatchSummary {
    /// Where the rewritten (or untouched) text now lives
    pub range: TextRange,
    pub chunks_applied: usize,
    /// False when no chunk arrived and the original text was kept
    pub replaced_original: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentPatcher;

impl DocumentPatcher {
    pub const fn new() -> Self {
        Self
    }

    /// Start rewriting `target`, marking it with `feedback` if any.
    pub fn begin_edit<D: Document + ?Sized>(
        &self,
        document: &mut D,
        target: &ResolvedRange,
        feedback: VisualFeedback,
    ) -> Result<EditSession, ComposerError> {
        let mut session = EditSession {
            start: target.range.start,
            original_end: target.range.end,
            cursor: target.range.start,
            synced_version: target.version,
            decoration: None,
            replaced: false,
            chunks_applied: 0,
        };
        session.sync(document)?;

        if let Some(style) = feedback.decoration() {
            session.decoration = Some(document.decorate(session.range(), style)?);
        }

        debug!(range = %session.range(), ?feedback, "Edit started");
        Ok(session)
    }

    /// Write `chunk` into the document.
    ///
    /// Empty chunks are skipped; they neither replace the original text nor
    /// count as applied.
    ///
    /// # Errors
    /// [`ComposerError::PatchTargetLost`] if a foreign edit removed the text
    /// around the cursor since the previous chunk.
    pub fn apply_chunk<D: Document + ?Sized>(
        &self,
        session: &mut EditSession,
        document: &mut D,
        chunk: &Chunk,
    ) -> Result<(), ComposerError> {
        if chunk.is_empty() {
            return Ok(());
        }

        session.sync(document)?;

        let target = if session.replaced {
            TextRange::collapsed(session.cursor)
        } else {
            TextRange::new(session.start, session.original_end)
        };
        session.cursor = document.replace_range(target, &chunk.text)?;
        session.replaced = true;
        session.chunks_applied += 1;
        session.synced_version = document.version();
        Ok(())
    }

    /// Remove the visual marker and leave the rewritten text as plain content.
    pub fn finalize<D: Document + ?Sized>(
        &self,
        session: EditSession,
        document: &mut D,
    ) -> PatchSummary {
        let summary = self.release(session, document);
        debug!(range = %summary.range, chunks = summary.chunks_applied, "Edit finalized");
        summary
    }

    /// Stop the edit, keeping whatever was written so far.
    pub fn abort<D: Document + ?Sized>(&self, session: EditSession, document: &mut D) -> PatchSummary {
        let summary = self.release(session, document);
        debug!(range = %summary.range, chunks = summary.chunks_applied, "Edit aborted, partial text kept");
        summary
    }

    fn release<D: Document + ?Sized>(&self, mut session: EditSession, document: &mut D) -> PatchSummary {
        if let Err(err) = session.sync(document) {
            warn!(error = %err, "Edit range could not be mapped to the current document");
        }
        if let Some(handle) = session.decoration.take() {
            if !document.remove_decoration(handle) {
                warn!(?handle, "Decoration was already gone");
            }
        }
        PatchSummary {
            range: session.range(),
            chunks_applied: session.chunks_applied,
            replaced_original: session.replaced,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::document::DecorationStyle;
    use crate::infrastructure::document::MemoryDocument;
    use crate::services::scope_tracker::ScopeTracker;

    fn start_edit(doc: &mut MemoryDocument, needle: &str) -> EditSession {
        doc.select_text(needle).unwrap();
        let scope = ScopeTracker::new().capture(&*doc);
        let resolved = ScopeTracker::resolve(&scope, &*doc).unwrap();
        DocumentPatcher::new()
            .begin_edit(doc, &resolved, VisualFeedback::StrikeThrough)
            .unwrap()
    }

    #[test]
    fn test_chunks_replace_then_append() {
        let mut doc = MemoryDocument::new("Intro. He go to school yesterday. Outro.");
        let mut edit = start_edit(&mut doc, "He go to school yesterday.");
        let patcher = DocumentPatcher::new();

        for chunk in ["He ", "went ", "to school yesterday."] {
            patcher.apply_chunk(&mut edit, &mut doc, &chunk.into()).unwrap();
        }
        let summary = patcher.finalize(edit, &mut doc);

        assert_eq!(doc.content(), "Intro. He went to school yesterday. Outro.");
        assert_eq!(doc.text(summary.range).unwrap(), "He went to school yesterday.");
        assert_eq!(summary.chunks_applied, 3);
        assert_eq!(doc.decorations().count(), 0);
    }

    #[test]
    fn test_begin_edit_decorates_target() {
        let mut doc = MemoryDocument::new("Keep this. Rewrite this.");
        let edit = start_edit(&mut doc, "Rewrite this.");

        let handle = edit.decoration().unwrap();
        let decoration = doc.decoration(handle).unwrap();
        assert_eq!(decoration.style, DecorationStyle::StrikeThrough);
        assert_eq!(doc.text(decoration.range).unwrap(), "Rewrite this.");
    }

    #[test]
    fn test_no_feedback_means_no_decoration() {
        let mut doc = MemoryDocument::new("Some text.");
        let resolved = ScopeTracker::resolve(&Default::default(), &doc).unwrap();
        let edit = DocumentPatcher::new()
            .begin_edit(&mut doc, &resolved, VisualFeedback::None)
            .unwrap();
        assert!(edit.decoration().is_none());
        assert_eq!(doc.decorations().count(), 0);
    }

    #[test]
    fn test_abort_keeps_partial_text() {
        let mut doc = MemoryDocument::new("A. Old sentence here. B.");
        let mut edit = start_edit(&mut doc, "Old sentence here.");
        let patcher = DocumentPatcher::new();

        patcher.apply_chunk(&mut edit, &mut doc, &"New ".into()).unwrap();
        patcher.apply_chunk(&mut edit, &mut doc, &"sent".into()).unwrap();
        let summary = patcher.abort(edit, &mut doc);

        assert_eq!(doc.content(), "A. New sent B.");
        assert_eq!(summary.chunks_applied, 2);
        assert_eq!(doc.decorations().count(), 0);
    }

    #[test]
    fn test_zero_chunks_keep_original() {
        let mut doc = MemoryDocument::new("Untouched text.");
        let edit = start_edit(&mut doc, "text");
        let summary = DocumentPatcher::new().finalize(edit, &mut doc);

        assert_eq!(doc.content(), "Untouched text.");
        assert!(!summary.replaced_original);
        assert_eq!(doc.decorations().count(), 0);
    }

    #[test]
    fn test_empty_chunk_is_skipped() {
        let mut doc = MemoryDocument::new("Old.");
        let mut edit = start_edit(&mut doc, "Old.");
        let patcher = DocumentPatcher::new();

        patcher.apply_chunk(&mut edit, &mut doc, &"".into()).unwrap();
        assert!(!edit.has_replaced());
        assert_eq!(doc.content(), "Old.");

        patcher.apply_chunk(&mut edit, &mut doc, &"New.".into()).unwrap();
        assert_eq!(doc.content(), "New.");
        assert_eq!(edit.chunks_applied(), 1);
    }

    #[test]
    fn test_foreign_edits_outside_range_are_absorbed() {
        let mut doc = MemoryDocument::new("Head. Old words. Tail.");
        let mut edit = start_edit(&mut doc, "Old words.");
        let patcher = DocumentPatcher::new();

        // before first chunk: user types in front of the target
        doc.insert(Position(0), ">> ").unwrap();
        patcher.apply_chunk(&mut edit, &mut doc, &"New ".into()).unwrap();

        // mid-stream: user types before and after the rewrite
        doc.insert(Position(0), "# ").unwrap();
        let len = doc.len();
        doc.insert(Position(len), " <<").unwrap();
        patcher.apply_chunk(&mut edit, &mut doc, &"words.".into()).unwrap();

        let summary = patcher.finalize(edit, &mut doc);
        assert_eq!(doc.content(), "# >> Head. New words. Tail. <<");
        assert_eq!(doc.text(summary.range).unwrap(), "New words.");
    }

    #[test]
    fn test_collapsed_target_inserts_at_position() {
        let mut doc = MemoryDocument::new("Head. Old. Tail.");
        let mut edit = start_edit(&mut doc, "Old.");
        let patcher = DocumentPatcher::new();

        // the whole target disappears before the first chunk
        doc.delete(TextRange::new(Position(6), Position(10))).unwrap();
        patcher.apply_chunk(&mut edit, &mut doc, &"New.".into()).unwrap();

        assert_eq!(doc.content(), "Head. New. Tail.");
    }

    #[test]
    fn test_deleted_cursor_is_target_lost() {
        let mut doc = MemoryDocument::new("Head. Old. Tail.");
        let mut edit = start_edit(&mut doc, "Old.");
        let patcher = DocumentPatcher::new();

        patcher.apply_chunk(&mut edit, &mut doc, &"New".into()).unwrap();
        // "Head. New Tail." with the cursor at 9; remove text around it
        doc.delete(TextRange::new(Position(4), Position(12))).unwrap();

        assert_eq!(
            patcher.apply_chunk(&mut edit, &mut doc, &" text.".into()),
            Err(ComposerError::PatchTargetLost)
        );
    }
}
