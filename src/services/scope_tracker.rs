//! Scope capture and re-resolution.
//!
//! A selection is captured together with the document version it belongs to
//! and the text it covered. Resolving maps both endpoints through every edit
//! made since, then checks that the re-addressed text is still the captured
//! text. Anything else is a stale scope: the action must not write to a range
//! that no longer holds what the user selected.

use tracing::{debug, warn};

use crate::domain::errors::ComposerError;
use crate::domain::models::document::{Bias, TextRange};
use crate::domain::models::scope::{CapturedSelection, ResolvedRange, Scope};
use crate::domain::ports::Document;

/// Holds the scope the next action will target.
#[derive(Debug, Default)]
pub struct ScopeTracker {
    current: Scope,
}

impl ScopeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the document's current selection as the active scope.
    ///
    /// A missing or collapsed selection targets the whole document.
    pub fn capture<D: Document + ?Sized>(&mut self, document: &D) -> Scope {
        let scope = match document.selection() {
            Some(selection) if !selection.is_collapsed() => {
                match document.text(selection.range()) {
                    Ok(snapshot) => Scope::Selection(CapturedSelection {
                        anchor: selection.anchor,
                        head: selection.head,
                        version: document.version(),
                        snapshot,
                    }),
                    Err(err) => {
                        warn!(error = %err, "Selection is not readable, falling back to whole document");
                        Scope::Document
                    }
                }
            }
            _ => Scope::Document,
        };

        debug!(?scope, "Captured scope");
        self.current = scope.clone();
        scope
    }

    pub const fn current(&self) -> &Scope {
        &self.current
    }

    /// Clear back to the whole-document scope. Safe to call repeatedly.
    pub fn reset(&mut self) -> Scope {
        self.current = Scope::Document;
        Scope::Document
    }

    /// Translate `scope` into positions valid for the document's current version.
    ///
    /// # Errors
    /// [`ComposerError::StaleScope`] when a selection's endpoints were deleted
    /// or the text between them changed since capture.
    pub fn resolve<D: Document + ?Sized>(
        scope: &Scope,
        document: &D,
    ) -> Result<ResolvedRange, ComposerError> {
        let version = document.version();
        let selection = match scope {
            Scope::Document => {
                return Ok(ResolvedRange {
                    range: document.full_range(),
                    version,
                    whole_document: true,
                });
            }
            Scope::Selection(selection) => selection,
        };

        let captured = selection.range();
        // Endpoints hug the captured content: text typed right at either edge stays outside.
        let start = document.map_position(captured.start, selection.version, Bias::After);
        let end = document.map_position(captured.end, selection.version, Bias::Before);

        let (Some(start), Some(end)) = (start, end) else {
            debug!(%captured, "Selection endpoints were deleted");
            return Err(ComposerError::StaleScope);
        };
        if start > end {
            return Err(ComposerError::StaleScope);
        }

        let range = TextRange { start, end };
        let current_text = document.text(range).map_err(|_| ComposerError::StaleScope)?;
        if current_text != selection.snapshot {
            debug!(%captured, %range, "Selected text changed since capture");
            return Err(ComposerError::StaleScope);
        }

        Ok(ResolvedRange {
            range,
            version,
            whole_document: false,
        })
    }
}
