pub mod detection;
pub mod font_manager;
pub mod grouping;
pub mod recognition;
pub mod rendering;
pub mod substitution;

// Re-export commonly used services
pub use font_manager::FontManager;
pub use recognition::{OcrEngine, RecognizedText};
pub use rendering::GlyphRenderer;
