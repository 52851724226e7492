pub mod config;
pub mod errors;
pub mod notices;
pub mod session;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{ConfigError, EngineError, FontError, RenderError, RunError};
pub use notices::{Notice, NoticeBoard, NoticeKind};
pub use session::DecodeSession;
pub use types::{
    DecodedSpan, DecodedText, GlyphStatus, GroupState, GroupStatus, MappingEntry, MappingStore,
    OccurrenceIndex, PlaceholderRange, Provenance, RecognitionOutcome, RenderGroup, RunAnalytics,
    RunReport, SpanKind,
};
