pub mod image_ops;
pub mod metrics;
pub mod text_ops;

// Re-export commonly used items
pub use image_ops::encode_png;
pub use metrics::{Metrics, MetricsSnapshot};
pub use text_ops::{normalize_line_breaks, normalize_recognition, strip_invisible};
