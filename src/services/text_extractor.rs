use serde::Serialize;

use crate::domain::errors::ComposerError;
use crate::domain::models::scope::{ResolvedRange, Scope};
use crate::domain::ports::Document;
use crate::services::scope_tracker::ScopeTracker;

/// Text addressed by a scope, together with where it currently lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedText {
    pub resolved: ResolvedRange,
    pub text: String,
}

/// Reads the plain text a scope points at.
///
/// Paragraph boundaries come through as `\n`; inline formatting is not
/// carried over.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl TextExtractor {
    pub const fn new() -> Self {
        Self
    }

    /// Resolve `scope` against `document` and read its text.
    ///
    /// # Errors
    /// - [`ComposerError::StaleScope`] if the scope cannot be resolved
    /// - [`ComposerError::EmptyInput`] if the text is empty or whitespace only
    pub fn extract<D: Document + ?Sized>(
        &self,
        scope: &Scope,
        document: &D,
    ) -> Result<ExtractedText, ComposerError> {
        let resolved = ScopeTracker::resolve(scope, document)?;
        self.extract_resolved(resolved, document)
    }

    pub fn extract_resolved<D: Document + ?Sized>(
        &self,
        resolved: ResolvedRange,
        document: &D,
    ) -> Result<ExtractedText, ComposerError> {
        let text = document.text(resolved.range)?;
        if text.trim().is_empty() {
            return Err(ComposerError::EmptyInput);
        }
        Ok(ExtractedText { resolved, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::document::MemoryDocument;

    #[test]
    fn test_extract_whole_document_keeps_paragraphs() {
        let doc = MemoryDocument::from_paragraphs(["First paragraph.", "Second one."]);
        let extracted = TextExtractor::new().extract(&Scope::Document, &doc).unwrap();
        assert_eq!(extracted.text, "First paragraph.\nSecond one.");
        assert!(extracted.resolved.whole_document);
    }

    #[test]
    fn test_extract_selection() {
        let mut doc = MemoryDocument::new("He go to school yesterday. It rained.");
        doc.select_text("He go to school yesterday.").unwrap();
        let scope = ScopeTracker::new().capture(&doc);

        let extracted = TextExtractor::new().extract(&scope, &doc).unwrap();
        assert_eq!(extracted.text, "He go to school yesterday.");
        assert!(!extracted.resolved.whole_document);
    }

    #[test]
    fn test_extract_whitespace_is_empty_input() {
        let doc = MemoryDocument::new(" \n\t ");
        assert_eq!(
            TextExtractor::new().extract(&Scope::Document, &doc),
            Err(ComposerError::EmptyInput)
        );

        let empty = MemoryDocument::new("");
        assert_eq!(
            TextExtractor::new().extract(&Scope::Document, &empty),
            Err(ComposerError::EmptyInput)
        );
    }
}
