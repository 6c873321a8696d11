//! Property-based laws for payload chunking and style selection.

use core_producer::{chunk_payload, select_stylesheet};
use core_story::{HeadlineStyle, StyleList};
use proptest::prelude::*;

proptest! {
    // Rejoining the chunks with the separator reproduces the payload
    // (empty lines excluded: empty chunks are never emitted as headlines).
    #[test]
    fn chunks_reassemble_to_the_payload(
        lines in prop::collection::vec("[a-z ]{1,12}", 1..40),
        limit in 1usize..8,
    ) {
        let payload = lines.join("\n");
        let chunks = chunk_payload(&payload, limit);
        prop_assert_eq!(chunks.join("\n"), payload);
    }

    // No chunk carries more than `limit` lines.
    #[test]
    fn chunks_respect_the_line_limit(
        lines in prop::collection::vec("[a-z]{1,8}", 1..40),
        limit in 1usize..8,
    ) {
        let payload = lines.join("\n");
        for chunk in chunk_payload(&payload, limit) {
            prop_assert!(chunk.split('\n').count() <= limit);
        }
    }

    // The br separator is preserved verbatim.
    #[test]
    fn br_payloads_reassemble(
        lines in prop::collection::vec("[a-z]{1,8}", 1..20),
        limit in 1usize..5,
    ) {
        let payload = lines.join("<br>");
        let chunks = chunk_payload(&payload, limit);
        prop_assert_eq!(chunks.join("<br>"), payload);
    }

    // Style selection is a pure function of (payload, style list).
    #[test]
    fn style_selection_is_deterministic(payload in ".{0,64}") {
        let mut styles = StyleList::new("default");
        styles.upsert(HeadlineStyle {
            name: "Alert".into(),
            triggers: vec!["error".into()],
            stylesheet: "alert".into(),
        });
        let first = select_stylesheet(&styles, &payload);
        let second = select_stylesheet(&styles, &payload);
        prop_assert_eq!(first.clone(), second);
        let expected = payload.to_lowercase().contains("error");
        prop_assert_eq!(first == "alert", expected);
    }
}
