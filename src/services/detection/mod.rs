// Placeholder detection: scans normalized text for code points inside the
// configured Private Use Area block and builds the occurrence index.
//
// Stateless by design - every scan fully replaces the previous index, so an
// input edit never leaves stale counts behind.

use crate::core::types::{OccurrenceIndex, PlaceholderRange};
use tracing::debug;

/// Scan `text` for placeholder characters, returning distinct characters in
/// first-seen order with per-character occurrence counts. Empty input yields
/// an empty index.
pub fn scan(text: &str, range: PlaceholderRange) -> OccurrenceIndex {
    let mut index = OccurrenceIndex::new();
    for ch in text.chars() {
        if range.contains(ch) {
            index.record(ch);
        }
    }

    debug!(
        distinct = index.len(),
        total = index.total_occurrences(),
        "placeholder scan complete"
    );
    index
}
