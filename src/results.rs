// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-frame pose results as produced by the model collaborator.
//!
//! A pose model run over a clip yields one [`FrameResult`] per decoded frame,
//! lazily and exactly once. The keypoint CSV writer only ever consumes this
//! shape; it never calls into detection code itself.

use ndarray::{Array3, ArrayView2, Axis};

/// Pose keypoints for every person detected in one frame.
#[derive(Debug, Clone)]
pub struct Keypoints {
    /// Raw keypoint data with shape (persons, keypoints, 3): x, y, confidence.
    pub data: Array3<f32>,
    /// Original image shape (height, width).
    pub orig_shape: (u32, u32),
}

impl Keypoints {
    /// Create a new `Keypoints` instance.
    ///
    /// # Arguments
    ///
    /// * `data` - Keypoint data shaped (persons, keypoints, 3).
    /// * `orig_shape` - Original image shape.
    #[must_use]
    pub const fn new(data: Array3<f32>, orig_shape: (u32, u32)) -> Self {
        Self { data, orig_shape }
    }

    /// Keypoints with no persons at all.
    #[must_use]
    pub fn empty(orig_shape: (u32, u32)) -> Self {
        Self::new(Array3::zeros((0, 0, 3)), orig_shape)
    }

    /// Number of persons.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.shape()[0]
    }

    /// Whether the tensor holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Total number of stored values (persons × keypoints × 3).
    #[must_use]
    pub fn num_values(&self) -> usize {
        self.data.len()
    }

    /// One person's (keypoints, 3) view.
    #[must_use]
    pub fn person(&self, index: usize) -> ArrayView2<'_, f32> {
        self.data.index_axis(Axis(0), index)
    }
}

/// One frame of model output.
#[derive(Debug, Clone, Default)]
pub struct FrameResult {
    /// Source video path or identifier.
    pub path: String,
    /// Original image shape (height, width).
    pub orig_shape: (u32, u32),
    /// `None` when the result carries no keypoints attribute (a contract violation);
    /// empty when nothing was detected.
    pub keypoints: Option<Keypoints>,
}

impl FrameResult {
    /// Result carrying keypoints.
    #[must_use]
    pub fn with_keypoints(keypoints: Keypoints) -> Self {
        Self {
            path: String::new(),
            orig_shape: keypoints.orig_shape,
            keypoints: Some(keypoints),
        }
    }

    /// Result with an empty detection set.
    #[must_use]
    pub fn no_detections(orig_shape: (u32, u32)) -> Self {
        Self::with_keypoints(Keypoints::empty(orig_shape))
    }

    /// Result missing its keypoints attribute.
    #[must_use]
    pub fn missing_keypoints() -> Self {
        Self::default()
    }
}
