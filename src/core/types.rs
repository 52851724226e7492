// Shared types for the placeholder decode workflow

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::notices::Notice;

/// Inclusive code point range treated as placeholder characters.
///
/// Defaults to the BMP Private Use Area (U+E000..=U+F8FF), the block the
/// obfuscating fonts draw their substitution glyphs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderRange {
    pub start: u32,
    pub end: u32,
}

impl PlaceholderRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ch: char) -> bool {
        let cp = ch as u32;
        cp >= self.start && cp <= self.end
    }
}

impl Default for PlaceholderRange {
    fn default() -> Self {
        Self {
            start: 0xE000,
            end: 0xF8FF,
        }
    }
}

/// One distinct placeholder character with its occurrence count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OccurrenceEntry {
    pub ch: char,
    pub count: usize,
}

/// Distinct placeholder characters in first-seen order with per-character
/// occurrence counts. Rebuilt in full on every input change; keyed by raw
/// code point, never by rendered form.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceIndex {
    entries: Vec<OccurrenceEntry>,
    positions: HashMap<char, usize>,
}

impl OccurrenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `ch`, preserving first-seen order
    pub fn record(&mut self, ch: char) {
        match self.positions.get(&ch) {
            Some(&pos) => self.entries[pos].count += 1,
            None => {
                self.positions.insert(ch, self.entries.len());
                self.entries.push(OccurrenceEntry { ch, count: 1 });
            }
        }
    }

    pub fn count(&self, ch: char) -> usize {
        self.positions
            .get(&ch)
            .map(|&pos| self.entries[pos].count)
            .unwrap_or(0)
    }

    /// Distinct characters in first-seen order
    pub fn chars(&self) -> Vec<char> {
        self.entries.iter().map(|e| e.ch).collect()
    }

    pub fn entries(&self) -> &[OccurrenceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all occurrence counts
    pub fn total_occurrences(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }
}

/// An ordered batch of placeholder characters rendered into one canvas and
/// recognized by one engine call. Identity is the index in the run's group
/// list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderGroup {
    pub index: usize,
    pub chars: Vec<char>,
}

impl RenderGroup {
    pub fn new(index: usize, chars: Vec<char>) -> Self {
        Self { index, chars }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// The group's characters as one string (for logs and status rows)
    pub fn as_string(&self) -> String {
        self.chars.iter().collect()
    }
}

/// How a mapping entry was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Ocr,
    Manual,
}

/// Replacement string for one placeholder character plus its provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    pub value: String,
    pub provenance: Provenance,
}

/// Single source of truth mapping placeholder characters to replacements.
/// Entries are overwritten or cleared in full, never removed individually;
/// `clear` runs at the start of every OCR run and wipes manual entries along
/// with machine ones.
#[derive(Debug, Clone, Default)]
pub struct MappingStore {
    entries: HashMap<char, MappingEntry>,
}

impl MappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditional overwrite (last write wins, regardless of provenance)
    pub fn set(&mut self, ch: char, value: impl Into<String>, provenance: Provenance) {
        self.entries.insert(
            ch,
            MappingEntry {
                value: value.into(),
                provenance,
            },
        );
    }

    pub fn get(&self, ch: char) -> Option<&MappingEntry> {
        self.entries.get(&ch)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-group recognition result, consumed by the session to update the
/// mapping store and status rows. Transient; not retained after application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionOutcome {
    /// Recognized character count matched the group size; pairs are the
    /// positional (placeholder, recognized character) zip
    Success(Vec<(char, String)>),
    /// Recognized count fell short of the group size; `partial` is whatever
    /// the engine produced after whitespace stripping and truncation
    Mismatch { partial: String },
    /// The engine call itself failed
    Failed { error: String },
}

/// Settlement state of one render group within a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GroupState {
    Pending,
    Recognized { text: String },
    Mismatch { partial: String },
    Failed { error: String },
}

/// Status row for one render group, retained after dispatch for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupStatus {
    pub index: usize,
    pub chars: String,
    #[serde(flatten)]
    pub state: GroupState,
}

/// Styling tag for one span of reconciled output text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpanKind {
    /// Ordinary text copied through unchanged
    Literal,
    /// A placeholder occurrence replaced by its mapping
    Resolved { source: char },
    /// A placeholder occurrence with no mapping yet
    Unresolved { source: char },
}

/// One run of output text with its styling tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedSpan {
    pub text: String,
    #[serde(flatten)]
    pub kind: SpanKind,
}

/// Reconciled output: the input text with every placeholder occurrence
/// replaced or flagged, as tagged spans for the display layer
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DecodedText {
    pub spans: Vec<DecodedSpan>,
}

impl DecodedText {
    /// Plain-text projection for copy/export: styling dropped, unresolved
    /// placeholders passed through raw, invisible artifacts removed
    pub fn plain_text(&self) -> String {
        let joined: String = self.spans.iter().map(|s| s.text.as_str()).collect();
        crate::utils::text_ops::strip_invisible(&joined)
    }

    /// Number of unresolved placeholder occurrences still in the output
    pub fn unresolved_count(&self) -> usize {
        self.spans
            .iter()
            .filter(|s| matches!(s.kind, SpanKind::Unresolved { .. }))
            .count()
    }
}

/// One row of the glyph grid: a distinct placeholder with its count and the
/// current mapping, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlyphStatus {
    pub ch: char,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

/// Aggregate counters for one OCR run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunAnalytics {
    pub groups_total: usize,
    pub groups_succeeded: usize,
    pub groups_mismatched: usize,
    pub groups_failed: usize,
    pub glyphs_total: usize,
    pub glyphs_resolved: usize,
    pub glyphs_unresolved: usize,
    pub elapsed_ms: u64,
}

/// Result of one full OCR run over the current input
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: u64,
    /// True when the input held no placeholders and nothing was dispatched
    pub noop: bool,
    pub groups: Vec<GroupStatus>,
    pub notices: Vec<Notice>,
    pub analytics: RunAnalytics,
}

impl RunReport {
    /// Report for an input with no placeholder characters
    pub fn noop(run_id: u64) -> Self {
        Self {
            run_id,
            noop: true,
            groups: Vec::new(),
            notices: Vec::new(),
            analytics: RunAnalytics::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_range_bounds() {
        let range = PlaceholderRange::default();
        assert!(range.contains('\u{E000}'));
        assert!(range.contains('\u{F8FF}'));
        assert!(range.contains('\u{E123}'));
        assert!(!range.contains('A'));
        assert!(!range.contains('好'));
        assert!(!range.contains('\u{D7FF}')); // below the block
        assert!(!range.contains('\u{F900}')); // above the block
    }

    #[test]
    fn test_occurrence_index_first_seen_order() {
        let mut index = OccurrenceIndex::new();
        for ch in ['\u{E002}', '\u{E001}', '\u{E002}', '\u{E003}', '\u{E002}'] {
            index.record(ch);
        }

        assert_eq!(index.chars(), vec!['\u{E002}', '\u{E001}', '\u{E003}']);
        assert_eq!(index.count('\u{E002}'), 3);
        assert_eq!(index.count('\u{E001}'), 1);
        assert_eq!(index.count('\u{E999}'), 0);
        assert_eq!(index.total_occurrences(), 5);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_mapping_store_last_write_wins() {
        let mut store = MappingStore::new();
        store.set('\u{E001}', "好", Provenance::Ocr);
        assert_eq!(store.get('\u{E001}').unwrap().value, "好");
        assert_eq!(store.get('\u{E001}').unwrap().provenance, Provenance::Ocr);

        store.set('\u{E001}', "你", Provenance::Manual);
        assert_eq!(store.get('\u{E001}').unwrap().value, "你");
        assert_eq!(
            store.get('\u{E001}').unwrap().provenance,
            Provenance::Manual
        );

        // A later machine write overwrites the manual one too
        store.set('\u{E001}', "妈", Provenance::Ocr);
        assert_eq!(store.get('\u{E001}').unwrap().value, "妈");
        assert_eq!(store.get('\u{E001}').unwrap().provenance, Provenance::Ocr);
    }

    #[test]
    fn test_mapping_store_clear_removes_all_provenances() {
        let mut store = MappingStore::new();
        store.set('\u{E001}', "好", Provenance::Ocr);
        store.set('\u{E002}', "你", Provenance::Manual);
        store.clear();

        assert!(store.is_empty());
        assert!(store.get('\u{E001}').is_none());
        assert!(store.get('\u{E002}').is_none());
    }

    #[test]
    fn test_decoded_text_unresolved_count() {
        let text = DecodedText {
            spans: vec![
                DecodedSpan {
                    text: "A".into(),
                    kind: SpanKind::Literal,
                },
                DecodedSpan {
                    text: "\u{E123}".into(),
                    kind: SpanKind::Unresolved { source: '\u{E123}' },
                },
                DecodedSpan {
                    text: "好".into(),
                    kind: SpanKind::Resolved { source: '\u{E124}' },
                },
            ],
        };
        assert_eq!(text.unresolved_count(), 1);
    }
}
