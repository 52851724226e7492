// User-facing notices emitted by the decode pipeline
//
// The display layer (toast widget, CLI printer) is an external collaborator;
// this module only carries the data it consumes: message, severity, and how
// long the notice should stay visible.

use serde::Serialize;
use std::collections::HashSet;

/// Display duration for run-completion notices, in milliseconds
pub const COMPLETION_DURATION_MS: u64 = 3000;

const MIN_AUTO_DURATION_MS: u64 = 1000;
const MAX_AUTO_DURATION_MS: u64 = 10000;
const AUTO_DURATION_PER_CHAR_MS: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Info,
    Warning,
    Completion,
}

/// One user-facing notice with its display duration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
    pub duration_ms: u64,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        let message = message.into();
        let duration_ms = auto_duration_ms(&message);
        Self {
            kind: NoticeKind::Info,
            message,
            duration_ms,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        let message = message.into();
        let duration_ms = auto_duration_ms(&message);
        Self {
            kind: NoticeKind::Warning,
            message,
            duration_ms,
        }
    }

    /// Completion notices use a fixed duration rather than the length rule
    pub fn completion(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Completion,
            message: message.into(),
            duration_ms: COMPLETION_DURATION_MS,
        }
    }
}

/// Display duration derived from message length: 100ms per character,
/// clamped to [1s, 10s]
pub fn auto_duration_ms(message: &str) -> u64 {
    let per_char = message.chars().count() as u64 * AUTO_DURATION_PER_CHAR_MS;
    per_char.clamp(MIN_AUTO_DURATION_MS, MAX_AUTO_DURATION_MS)
}

/// Per-run notice accumulator. Repeated messages are suppressed so a run
/// with many failing groups does not flood the display with identical rows.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    notices: Vec<Notice>,
    seen: HashSet<String>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a notice unless an identical message is already present.
    /// Returns false when the notice was suppressed as a duplicate.
    pub fn push(&mut self, notice: Notice) -> bool {
        if self.seen.contains(&notice.message) {
            return false;
        }
        self.seen.insert(notice.message.clone());
        self.notices.push(notice);
        true
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn into_notices(self) -> Vec<Notice> {
        self.notices
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }
}
