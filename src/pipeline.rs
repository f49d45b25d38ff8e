// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Re-rendering source videos with keypoint overlays from a CSV.
//!
//! Parse and open failures are returned to the caller. Anything that goes
//! wrong while frames are being decoded, drawn or encoded is logged with the
//! source video path and recorded in the [`RenderReport`] instead, so a batch
//! run can move on to the next clip.

use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::config::AnnotateConfig;
use crate::error::Result;
use crate::io::{FrameSink, FrameSource, VideoFileWriter, create_video_writer, open_video};
use crate::keypoint_csv::read_keypoints_csv;
use crate::keypoints::KeypointTable;
use crate::logging::LogSink;
use crate::overlay::{DetectedOnly, FramePolicy, OverlayRenderer, WriteAll};

/// Outcome of one render pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderReport {
    /// Source video.
    pub video_in: PathBuf,
    /// Rendered output video.
    pub video_out: PathBuf,
    /// Frames decoded from the source.
    pub frames_read: usize,
    /// Frames written to the output.
    pub frames_written: usize,
    /// Message of the error that stopped rendering, if any.
    pub failed: Option<String>,
}

impl RenderReport {
    /// Whether the pass ran to the end of the source without error.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed.is_none()
    }
}

#[derive(Default)]
struct Progress {
    read: usize,
    written: usize,
}

/// Writes a copy of a video with each frame's keypoints drawn on it.
///
/// Which frames reach the output is decided by the policy `P`.
pub struct KeypointVideoWriter<'a, P: FramePolicy = WriteAll> {
    config: &'a AnnotateConfig,
    policy: P,
    log: &'a dyn LogSink,
}

/// Writer that keeps only frames with at least one detected keypoint.
pub type KeypointsOnlyVideoWriter<'a> = KeypointVideoWriter<'a, DetectedOnly>;

impl<'a> KeypointVideoWriter<'a, WriteAll> {
    /// Writer that keeps every frame.
    #[must_use]
    pub fn all_frames(config: &'a AnnotateConfig, log: &'a dyn LogSink) -> Self {
        Self::new(config, WriteAll, log)
    }
}

impl<'a> KeypointVideoWriter<'a, DetectedOnly> {
    /// Writer that keeps only frames with detections.
    #[must_use]
    pub fn detected_only(config: &'a AnnotateConfig, log: &'a dyn LogSink) -> Self {
        Self::new(config, DetectedOnly, log)
    }
}

impl<'a, P: FramePolicy> KeypointVideoWriter<'a, P> {
    /// Create a writer with an explicit frame policy.
    #[must_use]
    pub const fn new(config: &'a AnnotateConfig, policy: P, log: &'a dyn LogSink) -> Self {
        Self {
            config,
            policy,
            log,
        }
    }

    /// Render `video_in` with the keypoints from `csv_in` into `video_out`.
    ///
    /// The output keeps the source frame rate and dimensions and is written
    /// as motion-JPEG.
    ///
    /// # Errors
    ///
    /// Returns an error if the CSV cannot be read or parsed, or if the source
    /// video cannot be opened. Failures after that point are logged and
    /// reported through [`RenderReport::failed`].
    pub fn write_video_with_keypoints<P1, P2, P3>(
        &self,
        video_in: P1,
        video_out: P2,
        csv_in: P3,
    ) -> Result<RenderReport>
    where
        P1: AsRef<Path>,
        P2: AsRef<Path>,
        P3: AsRef<Path>,
    {
        self.write_video_through(video_in, video_out, csv_in, |writer| writer)
    }

    /// Like [`Self::write_video_with_keypoints`], but kept frames go through
    /// the sink that `wrap` builds around the video writer.
    ///
    /// # Errors
    ///
    /// Same as [`Self::write_video_with_keypoints`].
    pub fn write_video_through<P1, P2, P3, W, S>(
        &self,
        video_in: P1,
        video_out: P2,
        csv_in: P3,
        wrap: W,
    ) -> Result<RenderReport>
    where
        P1: AsRef<Path>,
        P2: AsRef<Path>,
        P3: AsRef<Path>,
        W: FnOnce(VideoFileWriter) -> S,
        S: FrameSink,
    {
        let table = read_keypoints_csv(csv_in)?;
        let renderer = OverlayRenderer::new(self.config, self.log);
        render_file(video_in.as_ref(), video_out.as_ref(), self.log, wrap, |index, image| {
            self.annotate(&renderer, &table, index, image)
        })
    }

    /// Drive one render pass from `source` into `sink`.
    ///
    /// The sink is always finished, even after a failure. `video_out` is the
    /// file the sink writes and is only used for the post-run size check.
    pub fn render_into<S: FrameSink + ?Sized>(
        &self,
        video_in: &Path,
        video_out: &Path,
        table: &KeypointTable,
        source: &mut dyn FrameSource,
        sink: &mut S,
    ) -> RenderReport {
        let renderer = OverlayRenderer::new(self.config, self.log);
        run_pass(video_in, video_out, source, sink, self.log, |index, image| {
            self.annotate(&renderer, table, index, image)
        })
    }

    fn annotate(
        &self,
        renderer: &OverlayRenderer<'_>,
        table: &KeypointTable,
        index: usize,
        image: &mut RgbImage,
    ) -> bool {
        let entry = table.frame_or_empty(index);
        let keep = self.policy.should_write(entry);
        if keep {
            renderer.draw_frame(image, entry);
        }
        keep
    }
}

/// Open `video_in`, create the video writer for `video_out` and run one pass.
///
/// A writer that cannot be created is logged and reported, not returned.
pub(crate) fn render_file<W, S, F>(
    video_in: &Path,
    video_out: &Path,
    log: &dyn LogSink,
    wrap: W,
    annotate: F,
) -> Result<RenderReport>
where
    W: FnOnce(VideoFileWriter) -> S,
    S: FrameSink,
    F: FnMut(usize, &mut RgbImage) -> bool,
{
    let mut source = open_video(video_in)?;
    match create_video_writer(video_out, source.params()) {
        Ok(writer) => {
            let mut sink = wrap(writer);
            Ok(run_pass(video_in, video_out, &mut *source, &mut sink, log, annotate))
        }
        Err(e) => {
            log.error(&format!("Error processing video {}: {e}", video_in.display()));
            let report = RenderReport {
                video_in: video_in.to_path_buf(),
                video_out: video_out.to_path_buf(),
                failed: Some(e.to_string()),
                ..RenderReport::default()
            };
            check_output(&report, log);
            Ok(report)
        }
    }
}

/// Decode `source` frame by frame; `annotate` draws on each frame and says
/// whether it is kept. The first error stops the pass.
pub(crate) fn run_pass<S, F>(
    video_in: &Path,
    video_out: &Path,
    source: &mut dyn FrameSource,
    sink: &mut S,
    log: &dyn LogSink,
    mut annotate: F,
) -> RenderReport
where
    S: FrameSink + ?Sized,
    F: FnMut(usize, &mut RgbImage) -> bool,
{
    let mut progress = Progress::default();
    let mut failed = drain(source, sink, &mut progress, &mut annotate).err();
    if let Err(e) = sink.finish() {
        failed.get_or_insert(e);
    }

    let failed = failed.map(|e| {
        log.error(&format!("Error processing video {}: {e}", video_in.display()));
        e.to_string()
    });
    let report = RenderReport {
        video_in: video_in.to_path_buf(),
        video_out: video_out.to_path_buf(),
        frames_read: progress.read,
        frames_written: progress.written,
        failed,
    };
    check_output(&report, log);
    report
}

fn drain<S, F>(
    source: &mut dyn FrameSource,
    sink: &mut S,
    progress: &mut Progress,
    annotate: &mut F,
) -> Result<()>
where
    S: FrameSink + ?Sized,
    F: FnMut(usize, &mut RgbImage) -> bool,
{
    for (index, frame) in source.enumerate() {
        let mut image = frame?;
        progress.read += 1;
        if annotate(index, &mut image) {
            sink.write_frame(&image)?;
            progress.written += 1;
        }
    }
    Ok(())
}

fn check_output(report: &RenderReport, log: &dyn LogSink) {
    let out = report.video_out.display();
    let size = std::fs::metadata(&report.video_out).map_or(0, |m| m.len());
    if size == 0 {
        log.error(&format!("The output video file {out} is empty"));
    } else if report.failed.is_some() {
        log.warn(&format!(
            "The output video file {out} is incomplete ({} frames written)",
            report.frames_written
        ));
    } else if report.frames_written == 0 {
        log.warn(&format!("No frames were written to the output video file {out}"));
    } else {
        log.success(&format!("Success for the video {out}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AnnotateError;
    use crate::io::VideoParams;
    use crate::keypoints::{FrameEntry, Keypoint};
    use crate::logging::{Level, MemorySink};
    use image::Rgb;

    struct VecSource {
        params: VideoParams,
        frames: std::vec::IntoIter<Result<RgbImage>>,
    }

    impl VecSource {
        fn new(frames: Vec<Result<RgbImage>>) -> Self {
            Self {
                params: VideoParams::new(25.0, 64, 48),
                frames: frames.into_iter(),
            }
        }

        fn blank(count: usize) -> Self {
            Self::new((0..count).map(|_| Ok(RgbImage::new(64, 48))).collect())
        }
    }

    impl Iterator for VecSource {
        type Item = Result<RgbImage>;
        fn next(&mut self) -> Option<Self::Item> {
            self.frames.next()
        }
    }

    impl FrameSource for VecSource {
        fn params(&self) -> &VideoParams {
            &self.params
        }
    }

    #[derive(Default)]
    struct VecSink {
        frames: Vec<RgbImage>,
        fail_at: Option<usize>,
        finished: bool,
    }

    impl FrameSink for VecSink {
        fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
            if self.fail_at == Some(self.frames.len()) {
                return Err(AnnotateError::Video("encoder rejected frame".to_string()));
            }
            self.frames.push(frame.clone());
            Ok(())
        }
        fn frames_written(&self) -> usize {
            self.frames.len()
        }
        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn table_with_frame(frame: usize) -> KeypointTable {
        let mut table = KeypointTable::new();
        table.insert(frame, 0, Keypoint::new(5, 10, 10, 0.9));
        table.insert(frame, 0, Keypoint::new(6, 30, 10, 0.9));
        table
    }

    #[test]
    fn test_all_frames_written() {
        let log = MemorySink::new();
        let config = AnnotateConfig::new();
        let writer = KeypointVideoWriter::all_frames(&config, &log);
        let mut sink = VecSink::default();
        let report = writer.render_into(
            Path::new("in.mp4"),
            Path::new("/nonexistent/out.avi"),
            &table_with_frame(1),
            &mut VecSource::blank(3),
            &mut sink,
        );

        assert!(report.is_success());
        assert_eq!(report.frames_read, 3);
        assert_eq!(report.frames_written, 3);
        assert!(sink.finished);
        assert_eq!(*sink.frames[0].get_pixel(10, 10), Rgb([0, 0, 0]));
        assert_eq!(*sink.frames[1].get_pixel(10, 8), Rgb([255, 0, 0]));
    }

    #[test]
    fn test_detected_only_skips_empty_frames() {
        let log = MemorySink::new();
        let config = AnnotateConfig::new();
        let writer = KeypointVideoWriter::detected_only(&config, &log);
        let mut sink = VecSink::default();
        let report = writer.render_into(
            Path::new("in.mp4"),
            Path::new("/nonexistent/out.avi"),
            &table_with_frame(2),
            &mut VecSource::blank(4),
            &mut sink,
        );

        assert_eq!(report.frames_read, 4);
        assert_eq!(report.frames_written, 1);
        assert_eq!(sink.frames.len(), 1);
    }

    #[test]
    fn test_closure_policy() {
        let log = MemorySink::new();
        let config = AnnotateConfig::new();
        let keep_all = |_: &FrameEntry| true;
        let writer = KeypointVideoWriter::new(&config, keep_all, &log);
        let mut sink = VecSink::default();
        let report = writer.render_into(
            Path::new("in.mp4"),
            Path::new("out.avi"),
            &KeypointTable::new(),
            &mut VecSource::blank(2),
            &mut sink,
        );
        assert_eq!(report.frames_written, 2);
    }

    #[test]
    fn test_write_failure_is_logged_not_raised() {
        let log = MemorySink::new();
        let config = AnnotateConfig::new();
        let writer = KeypointVideoWriter::all_frames(&config, &log);
        let mut sink = VecSink {
            fail_at: Some(1),
            ..VecSink::default()
        };
        let report = writer.render_into(
            Path::new("clips/shot_01.mp4"),
            Path::new("/nonexistent/out.avi"),
            &KeypointTable::new(),
            &mut VecSource::blank(5),
            &mut sink,
        );

        assert!(!report.is_success());
        assert_eq!(report.frames_read, 2);
        assert_eq!(report.frames_written, 1);
        assert!(sink.finished);
        assert!(log.contains(Level::Error, "Error processing video clips/shot_01.mp4"));
        assert!(log.contains(Level::Error, "encoder rejected frame"));
        assert!(log.contains(Level::Error, "is empty"));
    }

    #[test]
    fn test_decode_failure_stops_pass() {
        let log = MemorySink::new();
        let config = AnnotateConfig::new();
        let writer = KeypointVideoWriter::all_frames(&config, &log);
        let mut source = VecSource::new(vec![
            Ok(RgbImage::new(64, 48)),
            Err(AnnotateError::Video("corrupt packet".to_string())),
            Ok(RgbImage::new(64, 48)),
        ]);
        let mut sink = VecSink::default();
        let report = writer.render_into(
            Path::new("in.mp4"),
            Path::new("out.avi"),
            &KeypointTable::new(),
            &mut source,
            &mut sink,
        );

        assert_eq!(report.frames_written, 1);
        assert_eq!(report.failed.as_deref(), Some("Video error: corrupt packet"));
    }

    #[test]
    fn test_missing_csv_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let log = MemorySink::new();
        let config = AnnotateConfig::new();
        let writer = KeypointVideoWriter::all_frames(&config, &log);
        let err = writer
            .write_video_with_keypoints(
                dir.path().join("in.avi"),
                dir.path().join("out.avi"),
                dir.path().join("missing.csv"),
            )
            .unwrap_err();
        assert!(matches!(err, AnnotateError::NotFound(_)));
    }
}
