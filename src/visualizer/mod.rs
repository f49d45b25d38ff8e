// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Colors, skeleton layout and the optional preview window.

/// Color definitions.
pub mod color;

/// COCO skeleton layout.
pub mod skeleton;

#[cfg(feature = "visualize")]
pub mod viewer;

pub use color::Color;
pub use skeleton::{COCO_PAIRS, KEYPOINT_NAMES};

#[cfg(feature = "visualize")]
pub use viewer::{PreviewSink, Viewer};
