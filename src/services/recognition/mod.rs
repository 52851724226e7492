// Recognition engine boundary.
//
// The engine is a black box: given a rendered glyph canvas and a language
// hint it asynchronously returns recognized text or fails. Everything the
// pipeline needs beyond that - whitespace stripping, truncation, the
// count-match rule - lives here in `reconcile_outcome`, so every engine
// (remote service, test mock) gets identical reconciliation semantics.

pub mod remote;

use crate::core::errors::EngineResult;
use crate::core::types::{RecognitionOutcome, RenderGroup};
use crate::utils::text_ops;
use async_trait::async_trait;

/// Raw text produced by a recognition engine for one canvas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizedText {
    pub text: String,
}

/// Capability interface for OCR engines. Implementations must be cheap to
/// share across concurrent group tasks.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image_png: &[u8], language: &str) -> EngineResult<RecognizedText>;

    fn name(&self) -> &'static str;
}

/// Turn a raw engine result into the group's outcome:
/// - engine error -> Failed;
/// - otherwise strip whitespace and truncate to the group size;
/// - exact count match -> Success with the positional (placeholder, char)
///   zip; anything shorter -> Mismatch carrying the partial text.
///
/// Truncation means extra recognized content is silently dropped; only a
/// SHORT result is a mismatch.
pub fn reconcile_outcome(
    group: &RenderGroup,
    result: EngineResult<RecognizedText>,
) -> RecognitionOutcome {
    let recognized = match result {
        Ok(r) => r,
        Err(e) => {
            return RecognitionOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    let normalized = text_ops::normalize_recognition(&recognized.text, group.len());
    if normalized.chars().count() == group.len() {
        let pairs = group
            .chars
            .iter()
            .copied()
            .zip(normalized.chars().map(|c| c.to_string()))
            .collect();
        RecognitionOutcome::Success(pairs)
    } else {
        RecognitionOutcome::Mismatch { partial: normalized }
    }
}
