// Text reconciliation: re-renders the input with every placeholder
// occurrence either replaced by its mapping or flagged as unresolved.
//
// Pure and synchronous. The session re-runs this after every mapping store
// mutation and after every input edit; idempotence for a fixed (text, store)
// pair is what makes that safe.

use crate::core::types::{DecodedSpan, DecodedText, MappingStore, PlaceholderRange, SpanKind};

/// Render `text` against `store`: non-placeholder runs become Literal spans,
/// each placeholder occurrence becomes one Resolved span (mapped value) or
/// one Unresolved span (raw placeholder kept in place).
pub fn render_output(text: &str, store: &MappingStore, range: PlaceholderRange) -> DecodedText {
    let mut spans = Vec::new();
    let mut literal = String::new();

    for ch in text.chars() {
        if !range.contains(ch) {
            literal.push(ch);
            continue;
        }

        if !literal.is_empty() {
            spans.push(DecodedSpan {
                text: std::mem::take(&mut literal),
                kind: SpanKind::Literal,
            });
        }

        match store.get(ch) {
            Some(entry) => spans.push(DecodedSpan {
                text: entry.value.clone(),
                kind: SpanKind::Resolved { source: ch },
            }),
            None => spans.push(DecodedSpan {
                text: ch.to_string(),
                kind: SpanKind::Unresolved { source: ch },
            }),
        }
    }

    if !literal.is_empty() {
        spans.push(DecodedSpan {
            text: literal,
            kind: SpanKind::Literal,
        });
    }

    DecodedText { spans }
}
