// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Batch drivers over class-foldered video and CSV trees.
//!
//! Videos live in `<video_root>/<class>/<stem>.{mp4,avi}`; keypoint CSVs and
//! rendered videos are written to `<csv_root>/<class>/<stem>.{csv,avi}`.
//! Videos are processed one at a time and a failure on one video is logged
//! and counted without stopping the batch.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::AnnotateConfig;
use crate::detections::PoseEstimator;
use crate::error::{AnnotateError, Result};
use crate::keypoint_csv::KeypointCsvWriter;
use crate::logging::LogSink;
use crate::overlay::FramePolicy;
use crate::pipeline::KeypointVideoWriter;

/// Supported source video extensions, in lookup order.
pub const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "avi"];

/// Per-batch counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Videos that completed.
    pub succeeded: usize,
    /// Videos that failed; details are in the log.
    pub failed: usize,
}

impl BatchSummary {
    /// Total videos attempted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// Files in `dir` with one of `extensions`, sorted. A missing folder yields none.
///
/// # Errors
///
/// Returns an I/O error if an existing folder cannot be read.
pub fn list_files(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| AnnotateError::Io(e.into()))?;
        let path = entry.into_path();
        if path.is_file() && has_extension(&path, extensions) {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Source video for a CSV stem: `<stem>.mp4`, else `<stem>.avi`.
#[must_use]
pub fn find_source_video(video_dir: &Path, stem: &str) -> Option<PathBuf> {
    VIDEO_EXTENSIONS
        .iter()
        .map(|ext| video_dir.join(format!("{stem}.{ext}")))
        .find(|path| path.exists())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Extract keypoints for every video of every class into CSVs.
///
/// # Errors
///
/// Returns an I/O error only if a class folder exists but cannot be listed.
pub fn extract_batch(
    estimator: &dyn PoseEstimator,
    video_root: &Path,
    csv_root: &Path,
    classes: &[String],
    log: &dyn LogSink,
) -> Result<BatchSummary> {
    let writer = KeypointCsvWriter::new(log);
    let mut summary = BatchSummary::default();

    for class in classes {
        let videos = list_files(&video_root.join(class), &VIDEO_EXTENSIONS)?;
        if videos.is_empty() {
            log.warn(&format!("No videos found for class '{class}'"));
        }
        for video in videos {
            let csv_out = csv_root.join(class).join(format!("{}.csv", file_stem(&video)));
            let outcome = estimator
                .estimate(&video)
                .and_then(|results| writer.write_keypoints_to_csv(results, &csv_out));
            match outcome {
                Ok(table) => {
                    log.info(&format!(
                        "Wrote {} keypoints for {} to {}",
                        table.keypoint_count(),
                        video.display(),
                        csv_out.display()
                    ));
                    summary.succeeded += 1;
                }
                Err(e) => {
                    log.error(&format!(
                        "Failed to extract keypoints from {}: {e}",
                        video.display()
                    ));
                    summary.failed += 1;
                }
            }
        }
    }
    Ok(summary)
}

fn render_one<P: FramePolicy>(
    writer: &KeypointVideoWriter<'_, P>,
    video_in: &Path,
    video_out: &Path,
    csv_in: &Path,
    log: &dyn LogSink,
) -> bool {
    match writer.write_video_with_keypoints(video_in, video_out, csv_in) {
        Ok(report) => report.is_success(),
        Err(e) => {
            log.error(&format!("Error processing video {}: {e}", video_in.display()));
            false
        }
    }
}

/// Render an overlay video next to every keypoint CSV.
///
/// With `auto_labeling`, only frames that have detections are kept.
///
/// # Errors
///
/// Returns an I/O error only if a class folder exists but cannot be listed.
pub fn render_batch(
    video_root: &Path,
    csv_root: &Path,
    classes: &[String],
    config: &AnnotateConfig,
    auto_labeling: bool,
    log: &dyn LogSink,
) -> Result<BatchSummary> {
    let all_frames = KeypointVideoWriter::all_frames(config, log);
    let detected_only = KeypointVideoWriter::detected_only(config, log);
    let mut summary = BatchSummary::default();

    for class in classes {
        let csv_dir = csv_root.join(class);
        for csv_in in list_files(&csv_dir, &["csv"])? {
            let stem = file_stem(&csv_in);
            let Some(video_in) = find_source_video(&video_root.join(class), &stem) else {
                log.error(&format!(
                    "No source video for {} in {}",
                    csv_in.display(),
                    video_root.join(class).display()
                ));
                summary.failed += 1;
                continue;
            };
            let video_out = csv_dir.join(format!("{stem}.avi"));

            let ok = if auto_labeling {
                render_one(&detected_only, &video_in, &video_out, &csv_in, log)
            } else {
                render_one(&all_frames, &video_in, &video_out, &csv_in, log)
            };
            if ok {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}
