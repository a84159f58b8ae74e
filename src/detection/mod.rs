// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// Detection
///
/// - Detector: preprocess, forward pass, decode, NMS, drawing
/// - Catalog:  class names and per-class colors
/// - Observer: per-detection hook
pub mod catalog;
pub mod detector;
pub mod observer;
pub mod types;

pub use catalog::{ClassCatalog, ColorPalette};
pub use detector::Detector;
pub use observer::{format_detection, DetectionObserver, LogObserver};
pub use types::{Bbox, Detection, DetectionSet, Frame};
