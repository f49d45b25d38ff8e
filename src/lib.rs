// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Pose Annotate
//!
//! Keypoint extraction and overlay rendering for sports-action video clips.
//!
//! A pose model runs over each clip and yields per-frame, per-person skeletal
//! keypoints. This crate persists those keypoints to CSV and re-renders
//! annotated videos from them: skeleton overlays from keypoint CSVs and
//! scored bounding boxes from box files.
//!
//! ## Features
//!
//! - **Keypoint CSV** - `Frame,Person,Keypoint,X,Y,Prob` rows, written and read back losslessly
//! - **Skeleton overlays** - COCO pairs by default, any pair list via [`AnnotateConfig`]
//! - **Frame policies** - write every frame, or only frames with detections
//! - **Bounding boxes** - `Frame n` blocks with score labels above a threshold
//! - **OpenCV video I/O** - decode MP4, AVI and anything else `VideoCapture` reads; write motion-JPEG
//! - **Batch drivers** - class-foldered trees, one failing clip never stops a batch
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use pose_annotate::{AnnotateConfig, ConsoleSink, KeypointVideoWriter, read_keypoints_csv};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let table = read_keypoints_csv("csv/shot/clip_01.csv")?;
//!     println!("{} keypoints over {} frames", table.keypoint_count(), table.len());
//!
//!     let config = AnnotateConfig::new();
//!     let log = ConsoleSink::new(true);
//!     let writer = KeypointVideoWriter::all_frames(&config, &log);
//!     let report = writer.write_video_with_keypoints(
//!         "videos/shot/clip_01.avi",
//!         "csv/shot/clip_01.avi",
//!         "csv/shot/clip_01.csv",
//!     )?;
//!     println!("{} of {} frames written", report.frames_written, report.frames_read);
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Pose dump -> keypoint CSV
//! pose-annotate extract --dump detections/clip.jsonl --output csv/clip.csv
//!
//! # Skeleton overlay, review clip with empty frames dropped
//! pose-annotate render -v clip.mp4 -c csv/clip.csv -o clip_pose.avi --detected-only
//!
//! # Bounding boxes with score labels
//! pose-annotate boxes -v clip.mp4 -b clip_boxes.txt -o clip_boxes.avi --threshold 0.6
//!
//! # Whole project, mode taken from AUTOLABELING_MODE (local, cloud, debug)
//! pose-annotate batch-extract --config project.toml
//! pose-annotate batch-render --config project.toml --auto-labeling
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`keypoints`] | In-memory keypoint table ([`KeypointTable`], [`FrameEntry`], [`Person`]) |
//! | [`keypoint_csv`] | CSV writer ([`KeypointCsvWriter`]) and reader ([`read_keypoints_csv`]) |
//! | [`overlay`] | Skeleton drawing ([`OverlayRenderer`]) and frame policies |
//! | [`pipeline`] | Video overlay pass ([`KeypointVideoWriter`], [`RenderReport`]) |
//! | [`bbox`] | Box file parsing and [`BoxOverlayProcessor`] |
//! | [`io`] | Frame sources and sinks over `OpenCV` `VideoCapture` / `VideoWriter` |
//! | [`detections`] | Pose dumps and the [`PoseEstimator`] seam |
//! | [`batch`] | Class-foldered batch drivers |
//! | [`transfer`] | Object store download and upload |
//! | [`config`] | [`AnnotateConfig`], [`ProjectConfig`], [`RunMode`] |
//! | [`logging`] | [`LogSink`] and its console, file and memory sinks |
//! | [`error`] | Error types ([`AnnotateError`], [`Result`]) |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `visualize` | Preview window for `render --show` |
//!
//! ## License
//!
//! This project is licensed under [AGPL-3.0](https://ultralytics.com/license).

// Modules
pub mod batch;
pub mod bbox;
pub mod cli;
pub mod config;
pub mod detections;
pub mod error;
pub mod font;
pub mod io;
pub mod keypoint_csv;
pub mod keypoints;
pub mod logging;
pub mod overlay;
pub mod pipeline;
pub mod results;
pub mod transfer;
pub mod visualizer;

// Re-export main types for convenience
pub use batch::{BatchSummary, extract_batch, render_batch};
pub use bbox::{BoundingBox, BoxOverlayProcessor, BoxTable, read_bbox_file};
pub use config::{AnnotateConfig, ProjectConfig, RunMode};
pub use detections::{DumpEstimator, PoseDump, PoseEstimator};
pub use error::{AnnotateError, Result};
pub use io::{FrameSink, FrameSource, VideoParams, open_video, read_video_params};
pub use keypoint_csv::{KeypointCsvWriter, read_keypoints_csv};
pub use keypoints::{FrameEntry, Keypoint, KeypointTable, Person};
pub use logging::{ConsoleSink, FileSink, Level, LogSink, MemorySink, Tee};
pub use overlay::{DetectedOnly, FramePolicy, OverlayRenderer, PairCheck, WriteAll};
pub use pipeline::{KeypointVideoWriter, KeypointsOnlyVideoWriter, RenderReport};
pub use results::{FrameResult, Keypoints};
pub use transfer::{DirectoryStore, ObjectStore, TransferStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
