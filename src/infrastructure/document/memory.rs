//! In-memory document backend.
//!
//! Content is plain text with paragraphs separated by `\n`; a position is a
//! character offset. Every replacement is appended to a change log so that
//! positions taken at an older version can be mapped to the current one.
//! The log keeps the most recent [`DEFAULT_CHANGE_LOG_LIMIT`] changes by
//! default; positions older than that no longer map.

use std::collections::{BTreeMap, VecDeque};

use crate::domain::errors::DocumentError;
use crate::domain::models::document::{
    Bias, DecorationHandle, DecorationStyle, DocumentVersion, Position, SelectionState, TextRange,
};
use crate::domain::ports::Document;

/// One `replace_range` call: `deleted` chars at `at` replaced by `inserted` chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Change {
    at: usize,
    deleted: usize,
    inserted: usize,
}

impl Change {
    /// Map `pos` through this change. `None` when `pos` sat strictly inside deleted text.
    fn map(self, pos: usize, bias: Bias) -> Option<usize> {
        let deleted_end = self.at + self.deleted;
        if pos < self.at {
            return Some(pos);
        }
        if pos > deleted_end {
            return Some(pos - self.deleted + self.inserted);
        }
        if self.deleted == 0 {
            // pure insertion exactly at pos
            return Some(match bias {
                Bias::Before => pos,
                Bias::After => pos + self.inserted,
            });
        }
        if pos == self.at {
            Some(self.at)
        } else if pos == deleted_end {
            Some(self.at + self.inserted)
        } else {
            None
        }
    }

    /// Like [`Change::map`] but clamps positions inside deleted text to the edges.
    fn map_clamped(self, pos: usize, bias: Bias) -> usize {
        self.map(pos, bias).unwrap_or(match bias {
            Bias::Before => self.at,
            Bias::After => self.at + self.inserted,
        })
    }
}

/// A decoration currently applied to the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoration {
    pub range: TextRange,
    pub style: DecorationStyle,
}

/// Number of changes kept for position mapping unless configured otherwise
pub const DEFAULT_CHANGE_LOG_LIMIT: usize = 4_096;

#[derive(Debug, Clone)]
pub struct MemoryDocument {
    text: String,
    char_len: usize,
    selection: Option<SelectionState>,
    /// Version of the oldest change still in `changes`
    base_version: DocumentVersion,
    changes: VecDeque<Change>,
    change_log_limit: usize,
    decorations: BTreeMap<DecorationHandle, Decoration>,
    next_decoration: u64,
}

impl MemoryDocument {
    pub fn new(text: impl Into<String>) -> Self {
        let text = normalize_newlines(&text.into());
        let char_len = text.chars().count();
        Self {
            text,
            char_len,
            selection: None,
            base_version: 0,
            changes: VecDeque::new(),
            change_log_limit: DEFAULT_CHANGE_LOG_LIMIT,
            decorations: BTreeMap::new(),
            next_decoration: 0,
        }
    }

    /// Keep at most `limit` changes (at least one) for position mapping
    #[must_use]
    pub fn with_change_log_limit(mut self, limit: usize) -> Self {
        self.change_log_limit = limit.max(1);
        self.trim_change_log();
        self
    }

    fn trim_change_log(&mut self) {
        while self.changes.len() > self.change_log_limit {
            self.changes.pop_front();
            self.base_version += 1;
        }
    }

    /// Build a document from paragraphs joined by `\n`
    pub fn from_paragraphs<I, S>(paragraphs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = paragraphs
            .into_iter()
            .map(|p| p.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        Self::new(joined)
    }

    pub fn content(&self) -> &str {
        &self.text
    }

    pub const fn len(&self) -> usize {
        self.char_len
    }

    pub const fn is_empty(&self) -> bool {
        self.char_len == 0
    }

    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }

    pub fn set_selection(&mut self, anchor: Position, head: Position) -> Result<(), DocumentError> {
        self.check_position(anchor)?;
        self.check_position(head)?;
        self.selection = Some(SelectionState::new(anchor, head));
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Select the first occurrence of `needle`; returns its range
    pub fn select_text(&mut self, needle: &str) -> Option<TextRange> {
        let byte = self.text.find(needle)?;
        let start = self.text[..byte].chars().count();
        let range = TextRange::new(
            Position(start),
            Position(start + needle.chars().count()),
        );
        self.selection = Some(SelectionState::new(range.start, range.end));
        Some(range)
    }

    /// Insert text as if typed by the user
    pub fn insert(&mut self, at: Position, text: &str) -> Result<Position, DocumentError> {
        self.replace_range(TextRange::collapsed(at), text)
    }

    /// Delete text as if removed by the user
    pub fn delete(&mut self, range: TextRange) -> Result<(), DocumentError> {
        self.replace_range(range, "").map(|_| ())
    }

    pub fn decorations(&self) -> impl Iterator<Item = (DecorationHandle, &Decoration)> {
        self.decorations.iter().map(|(handle, deco)| (*handle, deco))
    }

    pub fn decoration(&self, handle: DecorationHandle) -> Option<&Decoration> {
        self.decorations.get(&handle)
    }

    fn check_position(&self, position: Position) -> Result<(), DocumentError> {
        if position.0 > self.char_len {
            return Err(DocumentError::OutOfBounds {
                position,
                len: self.char_len,
            });
        }
        Ok(())
    }

    fn check_range(&self, range: TextRange) -> Result<(), DocumentError> {
        if range.start > range.end {
            return Err(DocumentError::InvalidRange {
                start: range.start,
                end: range.end,
            });
        }
        self.check_position(range.end)
    }

    fn byte_offset(&self, position: Position) -> usize {
        self.text
            .char_indices()
            .nth(position.0)
            .map_or(self.text.len(), |(byte, _)| byte)
    }

    fn apply_to_annotations(&mut self, change: Change) {
        if let Some(selection) = self.selection.as_mut() {
            selection.anchor = Position(change.map_clamped(selection.anchor.0, Bias::After));
            selection.head = Position(change.map_clamped(selection.head.0, Bias::After));
        }
        for decoration in self.decorations.values_mut() {
            let start = change.map_clamped(decoration.range.start.0, Bias::After);
            let end = change.map_clamped(decoration.range.end.0, Bias::After);
            decoration.range = TextRange::new(Position(start), Position(end.max(start)));
        }
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new("")
    }
}

impl Document for MemoryDocument {
    fn selection(&self) -> Option<SelectionState> {
        self.selection
    }

    fn version(&self) -> DocumentVersion {
        self.base_version + self.changes.len() as DocumentVersion
    }

    fn full_range(&self) -> TextRange {
        TextRange::new(Position(0), Position(self.char_len))
    }

    fn text(&self, range: TextRange) -> Result<String, DocumentError> {
        self.check_range(range)?;
        Ok(self
            .text
            .chars()
            .skip(range.start.0)
            .take(range.len())
            .collect())
    }

    fn replace_range(&mut self, range: TextRange, text: &str) -> Result<Position, DocumentError> {
        self.check_range(range)?;
        let text = normalize_newlines(text);

        let start_byte = self.byte_offset(range.start);
        let end_byte = self.byte_offset(range.end);
        self.text.replace_range(start_byte..end_byte, &text);

        let inserted = text.chars().count();
        let change = Change {
            at: range.start.0,
            deleted: range.len(),
            inserted,
        };
        self.char_len = self.char_len - change.deleted + inserted;
        self.changes.push_back(change);
        self.trim_change_log();
        self.apply_to_annotations(change);

        Ok(Position(range.start.0 + inserted))
    }

    fn decorate(
        &mut self,
        range: TextRange,
        style: DecorationStyle,
    ) -> Result<DecorationHandle, DocumentError> {
        self.check_range(range)?;
        self.next_decoration += 1;
        let handle = DecorationHandle(self.next_decoration);
        self.decorations.insert(handle, Decoration { range, style });
        Ok(handle)
    }

    fn remove_decoration(&mut self, handle: DecorationHandle) -> bool {
        self.decorations.remove(&handle).is_some()
    }

    fn map_position(
        &self,
        position: Position,
        since: DocumentVersion,
        bias: Bias,
    ) -> Option<Position> {
        let skip = usize::try_from(since.checked_sub(self.base_version)?).ok()?;
        if skip > self.changes.len() {
            return None;
        }
        self.changes
            .range(skip..)
            .try_fold(position.0, |pos, change| change.map(pos, bias))
            .map(Position)
    }
}

fn normalize_newlines(text: &str) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text.to_string()
    }
}
