// Library exports for the glyph deobfuscation workflow

// Core modules
pub mod core;
pub mod orchestration;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use crate::core::{
    config::Config,
    errors::{ConfigError, EngineError, FontError, RenderError, RunError},
    notices::{Notice, NoticeBoard, NoticeKind},
    session::DecodeSession,
    types::{
        DecodedText, GlyphStatus, GroupState, GroupStatus, MappingStore, OccurrenceIndex,
        PlaceholderRange, Provenance, RecognitionOutcome, RenderGroup, RunReport,
    },
};

pub use crate::orchestration::decode_orchestrator::DecodeOrchestrator;

pub use crate::services::{FontManager, GlyphRenderer, OcrEngine, RecognizedText};

pub use crate::utils::Metrics;
