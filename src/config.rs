// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Configuration for rendering and batch runs.
//!
//! [`AnnotateConfig`] controls how overlays are drawn and is built in code.
//! [`ProjectConfig`] describes where a project's videos, CSVs and class folders
//! live and is loaded once from a TOML file at process start.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{AnnotateError, Result};
use crate::overlay::PairCheck;
use crate::visualizer::{COCO_PAIRS, Color};

/// Environment variable selecting the [`RunMode`].
pub const MODE_ENV_VAR: &str = "AUTOLABELING_MODE";

/// Overlay drawing parameters.
///
/// # Example
///
/// ```rust
/// use pose_annotate::{AnnotateConfig, PairCheck};
///
/// let config = AnnotateConfig::new()
///     .with_pairs(vec![(5, 6), (11, 12)])
///     .with_pair_check(PairCheck::KeypointIndex)
///     .with_box_threshold(0.6);
/// assert_eq!(config.pairs.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct AnnotateConfig {
    /// Keypoint index pairs joined by a line.
    pub pairs: Vec<(usize, usize)>,
    /// How a pair's endpoints are looked up in a person.
    pub pair_check: PairCheck,
    /// Joint marker radius in pixels.
    pub marker_radius: i32,
    /// Joint marker color.
    pub marker_color: Color,
    /// Bone line thickness in pixels.
    pub line_thickness: u32,
    /// Bone line color.
    pub line_color: Color,
    /// Boxes with a score strictly above this are drawn.
    pub box_threshold: f32,
    /// Box outline thickness in pixels.
    pub box_thickness: u32,
    /// Box outline color.
    pub box_color: Color,
    /// Score label color.
    pub label_color: Color,
    /// Score label height in pixels.
    pub label_scale: f32,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            pairs: COCO_PAIRS.to_vec(),
            pair_check: PairCheck::Position,
            marker_radius: 3,
            marker_color: Color::RED,
            line_thickness: 2,
            line_color: Color::GREEN,
            box_threshold: 0.5,
            box_thickness: 2,
            box_color: Color::GREEN,
            label_color: Color::BLUE,
            label_scale: 16.0,
        }
    }
}

impl AnnotateConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the skeleton pairs.
    #[must_use]
    pub fn with_pairs(mut self, pairs: Vec<(usize, usize)>) -> Self {
        self.pairs = pairs;
        self
    }

    /// Set the pair lookup mode.
    #[must_use]
    pub const fn with_pair_check(mut self, pair_check: PairCheck) -> Self {
        self.pair_check = pair_check;
        self
    }

    /// Set the joint marker radius.
    #[must_use]
    pub const fn with_marker_radius(mut self, radius: i32) -> Self {
        self.marker_radius = radius;
        self
    }

    /// Set the bone line thickness.
    #[must_use]
    pub const fn with_line_thickness(mut self, thickness: u32) -> Self {
        self.line_thickness = thickness;
        self
    }

    /// Set the box score threshold.
    #[must_use]
    pub const fn with_box_threshold(mut self, threshold: f32) -> Self {
        self.box_threshold = threshold;
        self
    }

    /// Set the box outline thickness.
    #[must_use]
    pub const fn with_box_thickness(mut self, thickness: u32) -> Self {
        self.box_thickness = thickness;
        self
    }
}

/// Where a run reads its videos from and whether storage transfer happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Local folders only.
    #[default]
    Local,
    /// Download inputs from and upload outputs to the object store.
    Cloud,
    /// Local folders, reduced debug video set.
    Debug,
}

impl RunMode {
    /// Parse a mode name case-insensitively; anything unrecognised is [`RunMode::Local`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "AWS" | "CLOUD" => Self::Cloud,
            "DEBUG" => Self::Debug,
            _ => Self::Local,
        }
    }

    /// Read the mode from [`MODE_ENV_VAR`], defaulting to [`RunMode::Local`].
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var(MODE_ENV_VAR)
            .map(|v| Self::from_name(&v))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelsConfig {
    /// Pose model path, passed through to the estimator.
    #[serde(default)]
    pub pose: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// Root all other data folders are relative to.
    pub root: PathBuf,
    /// Class-foldered source videos.
    #[serde(default = "default_actions")]
    pub actions: PathBuf,
    /// Smaller video set used in debug mode.
    #[serde(default = "default_debug_actions")]
    pub debug_actions: PathBuf,
    /// Class-foldered CSVs and rendered videos.
    #[serde(default = "default_auto_labeling")]
    pub auto_labeling: PathBuf,
    /// Pose dumps from the model run, one `<stem>.jsonl` per video.
    #[serde(default = "default_detections")]
    pub detections: PathBuf,
}

fn default_actions() -> PathBuf {
    PathBuf::from("raw/actions")
}
fn default_debug_actions() -> PathBuf {
    PathBuf::from("raw/debug_actions")
}
fn default_auto_labeling() -> PathBuf {
    PathBuf::from("processed/auto_labeling")
}
fn default_detections() -> PathBuf {
    PathBuf::from("processed/detections")
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeypointsConfig {
    /// Skeleton pairs as `[i, j]` arrays.
    #[serde(default = "default_pairs")]
    pub coco_pairs: Vec<[usize; 2]>,
}

fn default_pairs() -> Vec<[usize; 2]> {
    COCO_PAIRS.iter().map(|&(i, j)| [i, j]).collect()
}

impl Default for KeypointsConfig {
    fn default() -> Self {
        Self {
            coco_pairs: default_pairs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding one sub-directory per bucket.
    pub root: PathBuf,
    /// Bucket name.
    pub bucket: String,
    /// Prefix the source videos are downloaded from.
    pub download_prefix: String,
    /// Prefix the CSVs are uploaded to.
    pub upload_prefix: String,
}

/// Project layout loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default = "default_models")]
    pub models: ModelsConfig,
    pub data: DataConfig,
    /// Class label → sub-folder name.
    pub classes: BTreeMap<String, String>,
    #[serde(default)]
    pub keypoints: KeypointsConfig,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

fn default_models() -> ModelsConfig {
    ModelsConfig { pose: None }
}

impl ProjectConfig {
    /// Load a project configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotateError::NotFound`] if the file is missing and
    /// [`AnnotateError::Config`] if it cannot be parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AnnotateError::NotFound(format!("Configuration file {} not found", path.display()))
            } else {
                AnnotateError::Io(e)
            }
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a project configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotateError::Config`] if the text is not a valid configuration.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        if config.classes.is_empty() {
            return Err(AnnotateError::Config("at least one class is required".into()));
        }
        Ok(config)
    }

    /// Source video folder for a run mode.
    #[must_use]
    pub fn video_folder(&self, mode: RunMode) -> PathBuf {
        match mode {
            RunMode::Debug => self.data.root.join(&self.data.debug_actions),
            RunMode::Local | RunMode::Cloud => self.data.root.join(&self.data.actions),
        }
    }

    /// Folder receiving CSVs and rendered videos.
    #[must_use]
    pub fn csv_folder(&self) -> PathBuf {
        self.data.root.join(&self.data.auto_labeling)
    }

    /// Folder holding pose dumps.
    #[must_use]
    pub fn detections_folder(&self) -> PathBuf {
        self.data.root.join(&self.data.detections)
    }

    /// Skeleton pairs as tuples.
    #[must_use]
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        self.keypoints
            .coco_pairs
            .iter()
            .map(|&[i, j]| (i, j))
            .collect()
    }

    /// Overlay configuration using this project's skeleton pairs.
    #[must_use]
    pub fn annotate_config(&self) -> AnnotateConfig {
        AnnotateConfig::new().with_pairs(self.pairs())
    }

    /// Class sub-folder names in label order.
    #[must_use]
    pub fn class_folders(&self) -> Vec<String> {
        self.classes.values().cloned().collect()
    }
}
