// Decode session: the explicit context object threaded through the pipeline.
//
// Holds the input text, occurrence index, mapping store, and per-run group
// statuses behind one lock, so components never touch ambient globals and
// multiple sessions can run side by side. Every dispatched run carries a
// monotonic run id; outcomes from an abandoned run are discarded instead of
// corrupting the store the newer run just cleared.

use crate::core::errors::RunError;
use crate::core::types::{
    DecodedText, GlyphStatus, GroupState, GroupStatus, MappingStore, OccurrenceIndex,
    PlaceholderRange, Provenance, RecognitionOutcome, RenderGroup,
};
use crate::services::{detection, substitution};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct DecodeSession {
    inner: Arc<RwLock<SessionInner>>,
}

struct SessionInner {
    input_text: String,
    font_key: Option<String>,
    language: Option<String>,
    range: PlaceholderRange,
    index: OccurrenceIndex,
    store: MappingStore,
    /// Monotonic run counter; outcomes tagged with an older value are stale
    active_run: u64,
    groups: Vec<GroupStatus>,
    output: DecodedText,
    disposed: bool,
}

impl SessionInner {
    /// Re-render the output from the current input and store.
    /// Callers mutate the store first, then reconcile, within one lock hold.
    fn reconcile(&mut self) {
        self.output = substitution::render_output(&self.input_text, &self.store, self.range);
    }
}

impl DecodeSession {
    pub fn new(range: PlaceholderRange) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionInner {
                input_text: String::new(),
                font_key: None,
                language: None,
                range,
                index: OccurrenceIndex::new(),
                store: MappingStore::new(),
                active_run: 0,
                groups: Vec::new(),
                output: DecodedText::default(),
                disposed: false,
            })),
        }
    }

    /// Replace the input text. Rebuilds the occurrence index in full and
    /// re-renders the output against the existing store. Callers normalize
    /// line breaks before this point.
    pub fn set_input(&self, text: &str) {
        let mut inner = self.inner.write();
        if inner.disposed {
            debug!("set_input ignored: session disposed");
            return;
        }
        inner.input_text = text.to_string();
        inner.index = detection::scan(text, inner.range);
        inner.reconcile();
    }

    pub fn set_font_key(&self, key: Option<String>) {
        let mut inner = self.inner.write();
        if inner.disposed {
            return;
        }
        inner.font_key = key;
    }

    pub fn font_key(&self) -> Option<String> {
        self.inner.read().font_key.clone()
    }

    /// Per-document recognition language hint; None falls back to the
    /// configured default
    pub fn set_language(&self, language: Option<String>) {
        let mut inner = self.inner.write();
        if inner.disposed {
            return;
        }
        inner.language = language;
    }

    pub fn language(&self) -> Option<String> {
        self.inner.read().language.clone()
    }

    pub fn input_text(&self) -> String {
        self.inner.read().input_text.clone()
    }

    pub fn range(&self) -> PlaceholderRange {
        self.inner.read().range
    }

    /// Distinct placeholder characters in first-seen order
    pub fn placeholder_chars(&self) -> Vec<char> {
        self.inner.read().index.chars()
    }

    /// Occurrence-grid rows: every distinct placeholder with its count and
    /// current mapping state
    pub fn glyph_grid(&self) -> Vec<GlyphStatus> {
        let inner = self.inner.read();
        inner
            .index
            .entries()
            .iter()
            .map(|entry| {
                let mapped = inner.store.get(entry.ch);
                GlyphStatus {
                    ch: entry.ch,
                    count: entry.count,
                    mapping: mapped.map(|m| m.value.clone()),
                    provenance: mapped.map(|m| m.provenance),
                }
            })
            .collect()
    }

    /// Start a new OCR run over `groups`: bumps the run id (invalidating any
    /// in-flight outcomes), clears the mapping store in full (manual entries
    /// included), and resets group statuses to pending. Returns the run id
    /// that dispatched tasks must carry.
    pub fn begin_run(&self, groups: &[RenderGroup]) -> Result<u64, RunError> {
        let mut inner = self.inner.write();
        if inner.disposed {
            return Err(RunError::SessionDisposed);
        }

        inner.active_run += 1;
        inner.store.clear();
        inner.groups = groups
            .iter()
            .map(|group| GroupStatus {
                index: group.index,
                chars: group.as_string(),
                state: GroupState::Pending,
            })
            .collect();
        inner.reconcile();

        debug!(run_id = inner.active_run, groups = groups.len(), "run started");
        Ok(inner.active_run)
    }

    /// Apply one group's recognition outcome. Returns false (and changes
    /// nothing) when `run_id` is not the active run - a late completion from
    /// an abandoned run must never touch the store a newer run cleared.
    pub fn apply_group_outcome(
        &self,
        run_id: u64,
        group_index: usize,
        outcome: RecognitionOutcome,
    ) -> bool {
        let mut inner = self.inner.write();
        if inner.disposed || run_id != inner.active_run {
            warn!(
                run_id,
                active_run = inner.active_run,
                group_index,
                "discarding stale group outcome"
            );
            return false;
        }

        let state = match outcome {
            RecognitionOutcome::Success(pairs) => {
                let text: String = pairs.iter().map(|(_, s)| s.as_str()).collect();
                for (ch, value) in pairs {
                    inner.store.set(ch, value, Provenance::Ocr);
                }
                inner.reconcile();
                GroupState::Recognized { text }
            }
            RecognitionOutcome::Mismatch { partial } => GroupState::Mismatch { partial },
            RecognitionOutcome::Failed { error } => GroupState::Failed { error },
        };

        if let Some(status) = inner.groups.iter_mut().find(|g| g.index == group_index) {
            status.state = state;
        }
        true
    }

    /// Manual correction for one glyph. Rejects values that trim to empty
    /// (returns false, no-op); otherwise stores the value as given - not
    /// trimmed - and re-renders. Wins over machine results until the next
    /// full run clears the store.
    pub fn override_glyph(&self, ch: char, value: &str) -> bool {
        let mut inner = self.inner.write();
        if inner.disposed || value.trim().is_empty() {
            return false;
        }
        inner.store.set(ch, value, Provenance::Manual);
        inner.reconcile();
        true
    }

    pub fn output(&self) -> DecodedText {
        self.inner.read().output.clone()
    }

    pub fn plain_output(&self) -> String {
        self.inner.read().output.plain_text()
    }

    pub fn group_statuses(&self) -> Vec<GroupStatus> {
        self.inner.read().groups.clone()
    }

    pub fn active_run(&self) -> u64 {
        self.inner.read().active_run
    }

    /// Reset input-derived state and the store. The placeholder range and
    /// font key survive; the run id still advances so in-flight outcomes
    /// from before the clear are discarded.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        if inner.disposed {
            return;
        }
        inner.active_run += 1;
        inner.input_text.clear();
        inner.index = OccurrenceIndex::new();
        inner.store.clear();
        inner.groups.clear();
        inner.output = DecodedText::default();
    }

    /// Permanently retire the session. All further mutations are rejected.
    pub fn dispose(&self) {
        let mut inner = self.inner.write();
        inner.disposed = true;
        inner.active_run += 1;
        inner.input_text.clear();
        inner.index = OccurrenceIndex::new();
        inner.store.clear();
        inner.groups.clear();
        inner.output = DecodedText::default();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.read().disposed
    }
}
