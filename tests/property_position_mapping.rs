use composer::domain::models::{Bias, Position, TextRange};
use composer::domain::ports::Document;
use composer::infrastructure::document::MemoryDocument;
use proptest::prelude::*;

/// A document plus one valid replacement inside it
fn doc_and_edit() -> impl Strategy<Value = (String, usize, usize, String)> {
    "[a-z ]{1,40}".prop_flat_map(|text| {
        let len = text.chars().count();
        (Just(text), 0..=len, 0..=len, "[A-Z]{0,8}").prop_map(|(text, a, b, inserted)| {
            (text, a.min(b), a.max(b), inserted)
        })
    })
}

proptest! {
    /// Property: mapping at the current version is the identity
    #[test]
    fn prop_current_version_is_identity(text in "[a-z ]{0,40}", offset in 0usize..40) {
        let doc = MemoryDocument::new(text.clone());
        let position = Position(offset.min(doc.len()));

        prop_assert_eq!(doc.map_position(position, doc.version(), Bias::Before), Some(position));
        prop_assert_eq!(doc.map_position(position, doc.version(), Bias::After), Some(position));
    }

    /// Property: positions outside a replaced range survive it
    ///
    /// Anything before the edit keeps its offset; anything after shifts by
    /// the length difference.
    #[test]
    fn prop_positions_outside_edit_shift_by_delta((text, start, end, inserted) in doc_and_edit()) {
        let mut doc = MemoryDocument::new(text.clone());
        let len = doc.len();
        let before = doc.version();
        doc.replace_range(TextRange::new(Position(start), Position(end)), &inserted).unwrap();

        let delta = inserted.chars().count() as isize - (end - start) as isize;
        for offset in 0..=len {
            let mapped = doc.map_position(Position(offset), before, Bias::Before);
            if offset < start {
                prop_assert_eq!(mapped, Some(Position(offset)));
            } else if offset > end {
                prop_assert_eq!(mapped, Some(Position((offset as isize + delta) as usize)));
            } else if offset > start && offset < end {
                prop_assert_eq!(mapped, None);
            }
        }
    }

    /// Property: text untouched by an edit is still found at its mapped range
    #[test]
    fn prop_untouched_text_follows_edits(
        text in "[a-z]{5,30}",
        prefix in "[A-Z]{0,6}",
        suffix in "[A-Z]{0,6}",
    ) {
        let mut doc = MemoryDocument::new(text.clone());
        let range = TextRange::new(Position(1), Position(doc.len() - 1));
        let original = doc.text(range).unwrap();
        let before = doc.version();

        doc.replace_range(TextRange::new(Position(0), Position(1)), &prefix).unwrap();
        let end = doc.len();
        doc.replace_range(TextRange::collapsed(Position(end)), &suffix).unwrap();

        let start = doc.map_position(range.start, before, Bias::After).unwrap();
        let end = doc.map_position(range.end, before, Bias::Before).unwrap();
        prop_assert_eq!(doc.text(TextRange::new(start, end)).unwrap(), original);
    }

    /// Property: insertion bias decides which side of inserted text a position lands on
    #[test]
    fn prop_insertion_bias((text, at, _, inserted) in doc_and_edit()) {
        let mut doc = MemoryDocument::new(text);
        let before = doc.version();
        doc.replace_range(TextRange::collapsed(Position(at)), &inserted).unwrap();

        let inserted_len = inserted.chars().count();
        prop_assert_eq!(
            doc.map_position(Position(at), before, Bias::Before),
            Some(Position(at))
        );
        prop_assert_eq!(
            doc.map_position(Position(at), before, Bias::After),
            Some(Position(at + inserted_len))
        );
    }

    /// Property: edit boundaries never map to None
    #[test]
    fn prop_edit_edges_survive((text, start, end, inserted) in doc_and_edit()) {
        let mut doc = MemoryDocument::new(text);
        let before = doc.version();
        doc.replace_range(TextRange::new(Position(start), Position(end)), &inserted).unwrap();

        for bias in [Bias::Before, Bias::After] {
            prop_assert!(doc.map_position(Position(start), before, bias).is_some());
            prop_assert!(doc.map_position(Position(end), before, bias).is_some());
        }
    }
}
