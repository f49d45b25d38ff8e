// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose results persisted by the model run.
//!
//! A pose dump is a JSON-lines file with one object per decoded frame:
//!
//! ```text
//! {"poses": [{"keypoints": [{"x": 100.4, "y": 200.9, "confidence": 0.91}, ...]}, ...]}
//! ```
//!
//! `"poses": []` is a frame without detections; a missing or `null` `poses`
//! field is a frame whose result carries no keypoints at all.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use ndarray::Array3;
use serde::Deserialize;

use crate::error::{AnnotateError, Result};
use crate::results::{FrameResult, Keypoints};

/// Stream of per-frame results for one video.
pub type ResultStream = Box<dyn Iterator<Item = Result<FrameResult>>>;

/// Source of pose results for a video.
pub trait PoseEstimator {
    /// Lazily produce one result per decoded frame of `video`.
    ///
    /// # Errors
    ///
    /// Returns an error if no results can be produced for this video.
    fn estimate(&self, video: &Path) -> Result<ResultStream>;
}

#[derive(Debug, Deserialize)]
struct DumpKeypoint {
    x: f32,
    y: f32,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct DumpPose {
    keypoints: Vec<DumpKeypoint>,
}

#[derive(Debug, Deserialize)]
struct DumpFrame {
    #[serde(default)]
    poses: Option<Vec<DumpPose>>,
    /// (height, width)
    #[serde(default)]
    orig_shape: Option<(u32, u32)>,
}

/// Parse one dump line into a frame result.
///
/// # Errors
///
/// Returns [`AnnotateError::MalformedData`] naming the line if it is not a
/// frame object or if its persons have differing keypoint counts.
pub fn parse_dump_line(line: &str, line_no: usize) -> Result<FrameResult> {
    let frame: DumpFrame = serde_json::from_str(line)
        .map_err(|e| AnnotateError::MalformedData(format!("pose dump line {line_no}: {e}")))?;
    let orig_shape = frame.orig_shape.unwrap_or_default();

    let Some(poses) = frame.poses else {
        return Ok(FrameResult {
            orig_shape,
            ..FrameResult::missing_keypoints()
        });
    };

    let per_person = poses.first().map_or(0, |pose| pose.keypoints.len());
    if let Some(pose) = poses.iter().find(|p| p.keypoints.len() != per_person) {
        return Err(AnnotateError::MalformedData(format!(
            "pose dump line {line_no}: persons have {per_person} and {} keypoints",
            pose.keypoints.len()
        )));
    }

    let values: Vec<f32> = poses
        .iter()
        .flat_map(|pose| &pose.keypoints)
        .flat_map(|kp| [kp.x, kp.y, kp.confidence])
        .collect();
    let data = Array3::from_shape_vec((poses.len(), per_person, 3), values)
        .map_err(|e| AnnotateError::MalformedData(format!("pose dump line {line_no}: {e}")))?;

    let mut result = FrameResult::with_keypoints(Keypoints::new(data, orig_shape));
    result.orig_shape = orig_shape;
    Ok(result)
}

/// Lazy, single-pass reader over a pose dump.
pub struct PoseDump<R> {
    lines: Lines<R>,
    line_no: usize,
    path: String,
    done: bool,
}

impl PoseDump<BufReader<File>> {
    /// Open a dump file.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotateError::NotFound`] if the file does not exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AnnotateError::NotFound(format!("Pose dump {} not found", path.display()))
            } else {
                AnnotateError::Io(e)
            }
        })?;
        Ok(Self::from_reader(BufReader::new(file), path.display().to_string()))
    }
}

impl<R: BufRead> PoseDump<R> {
    /// Read a dump from any buffered reader. `path` is attached to each result.
    pub fn from_reader(reader: R, path: impl Into<String>) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            path: path.into(),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for PoseDump<R> {
    type Item = Result<FrameResult>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.line_no += 1;
            let line = match self.lines.next() {
                None => {
                    self.done = true;
                    return None;
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
                Some(Ok(line)) => line,
            };
            if line.trim().is_empty() {
                continue;
            }

            let result = parse_dump_line(&line, self.line_no).map(|mut frame| {
                frame.path.clone_from(&self.path);
                frame
            });
            if result.is_err() {
                self.done = true;
            }
            return Some(result);
        }
    }
}

/// Reads `<dir>/<video stem>.jsonl` dumps written by the model run.
#[derive(Debug, Clone)]
pub struct DumpEstimator {
    dir: PathBuf,
}

impl DumpEstimator {
    /// Use dumps stored under `dir`.
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    /// Dump file for a video.
    #[must_use]
    pub fn dump_path(&self, video: &Path) -> PathBuf {
        let stem = video.file_stem().unwrap_or_default().to_string_lossy();
        self.dir.join(format!("{stem}.jsonl"))
    }
}

impl PoseEstimator for DumpEstimator {
    fn estimate(&self, video: &Path) -> Result<ResultStream> {
        Ok(Box::new(PoseDump::open(self.dump_path(video))?))
    }
}
