// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Video input and output.
//!
//! Frames are read through [`FrameSource`] and written through [`FrameSink`].
//! Decoding goes through `OpenCV`'s `VideoCapture`, so any container its
//! backends understand (MP4, AVI, ...) can be annotated. Rendered output is
//! always motion-JPEG.

use std::path::Path;

use image::RgbImage;
use opencv::core::{self, AlgorithmHint, Mat};
use opencv::prelude::*;
use opencv::{imgproc, videoio};

use crate::error::{AnnotateError, Result};

/// Frame rate and pixel dimensions of a video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoParams {
    /// Frames per second.
    pub fps: f64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

impl VideoParams {
    /// Create video parameters.
    #[must_use]
    pub const fn new(fps: f64, width: u32, height: u32) -> Self {
        Self { fps, width, height }
    }
}

/// A single-pass stream of decoded RGB frames.
///
/// Exhaustion ends the stream; an `Err` item is a decode failure.
pub trait FrameSource: Iterator<Item = Result<RgbImage>> {
    /// Frame rate and dimensions of the stream.
    fn params(&self) -> &VideoParams;
}

/// Destination for rendered frames.
pub trait FrameSink {
    /// Append one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be encoded or written.
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;

    /// Number of frames written so far.
    fn frames_written(&self) -> usize;

    /// Flush and close the output. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be released.
    fn finish(&mut self) -> Result<()>;
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| AnnotateError::Video(format!("Path {} is not valid UTF-8", path.display())))
}

fn to_dim(value: u32) -> Result<i32> {
    i32::try_from(value)
        .map_err(|_| AnnotateError::Video(format!("Frame dimension {value} exceeds i32::MAX")))
}

fn from_dim(value: i32) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| AnnotateError::Video(format!("Negative frame dimension {value}")))
}

/// Open a video for decoding.
///
/// # Errors
///
/// Returns [`AnnotateError::NotFound`] if the path does not exist and
/// [`AnnotateError::Video`] if no backend can decode the file.
pub fn open_video<P: AsRef<Path>>(path: P) -> Result<Box<dyn FrameSource>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AnnotateError::NotFound(format!(
            "Video file {} not found",
            path.display()
        )));
    }
    Ok(Box::new(VideoReader::open(path)?))
}

/// Read the frame rate and dimensions of a video.
///
/// # Errors
///
/// Same as [`open_video`].
pub fn read_video_params<P: AsRef<Path>>(path: P) -> Result<VideoParams> {
    let source = open_video(path)?;
    Ok(*source.params())
}

/// Create the motion-JPEG writer used for every rendered output.
///
/// # Errors
///
/// Returns [`AnnotateError::IoWrite`] if the file cannot be created.
pub fn create_video_writer<P: AsRef<Path>>(
    path: P,
    params: &VideoParams,
) -> Result<VideoFileWriter> {
    VideoFileWriter::create(path, params)
}

/// `VideoCapture` backed decoder yielding RGB frames.
pub struct VideoReader {
    capture: videoio::VideoCapture,
    params: VideoParams,
    done: bool,
}

impl VideoReader {
    /// Open a video file.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotateError::Video`] if the capture cannot be opened or
    /// reports no frame size.
    pub fn open(path: &Path) -> Result<Self> {
        let capture = videoio::VideoCapture::from_file(path_str(path)?, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(AnnotateError::Video(format!(
                "Failed to open video {}",
                path.display()
            )));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS)?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (width, height) = (
            capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32,
            capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32,
        );
        if width == 0 || height == 0 {
            return Err(AnnotateError::Video(format!(
                "Video {} reports an empty frame size",
                path.display()
            )));
        }

        Ok(Self {
            capture,
            params: VideoParams::new(fps, width, height),
            done: false,
        })
    }

    fn read_frame(&mut self) -> Result<Option<RgbImage>> {
        let mut bgr = Mat::default();
        if !self.capture.read(&mut bgr)? || bgr.empty() {
            return Ok(None);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(
            &bgr,
            &mut rgb,
            imgproc::COLOR_BGR2RGB,
            0,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;
        let width = from_dim(rgb.cols())?;
        let height = from_dim(rgb.rows())?;
        let data = rgb.data_bytes()?.to_vec();
        RgbImage::from_raw(width, height, data)
            .map(Some)
            .ok_or_else(|| AnnotateError::Image("Failed to create image from video frame".to_string()))
    }
}

impl Iterator for VideoReader {
    type Item = Result<RgbImage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl FrameSource for VideoReader {
    fn params(&self) -> &VideoParams {
        &self.params
    }
}

/// Motion-JPEG `VideoWriter` fed with RGB frames.
///
/// Every frame must match the dimensions the writer was created with.
pub struct VideoFileWriter {
    writer: videoio::VideoWriter,
    params: VideoParams,
    frames: usize,
    finished: bool,
}

impl VideoFileWriter {
    /// Create the output file, and its parent directory if missing.
    ///
    /// # Errors
    ///
    /// Returns [`AnnotateError::IoWrite`] if the directory or the writer
    /// cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, params: &VideoParams) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                AnnotateError::IoWrite(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let fourcc = videoio::VideoWriter::fourcc('M', 'J', 'P', 'G')?;
        let size = core::Size::new(to_dim(params.width)?, to_dim(params.height)?);
        let writer = videoio::VideoWriter::new(path_str(path)?, fourcc, params.fps, size, true)?;
        if !writer.is_opened()? {
            return Err(AnnotateError::IoWrite(format!(
                "Failed to open video writer for {}",
                path.display()
            )));
        }

        Ok(Self {
            writer,
            params: *params,
            frames: 0,
            finished: false,
        })
    }

    /// Parameters the output was created with.
    #[must_use]
    pub const fn params(&self) -> &VideoParams {
        &self.params
    }
}

impl FrameSink for VideoFileWriter {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if self.finished {
            return Err(AnnotateError::Video("Writer is already finished".to_string()));
        }
        if frame.dimensions() != (self.params.width, self.params.height) {
            return Err(AnnotateError::Video(format!(
                "Frame is {}x{}, writer expects {}x{}",
                frame.width(),
                frame.height(),
                self.params.width,
                self.params.height
            )));
        }

        // RGB buffer viewed as a 3-channel Mat, OpenCV wants BGR
        let rgb = Mat::from_slice(frame.as_raw())?;
        let rgb = rgb.reshape(3, to_dim(frame.height())?)?;
        let mut bgr = Mat::default();
        imgproc::cvt_color(
            &rgb,
            &mut bgr,
            imgproc::COLOR_RGB2BGR,
            0,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;
        self.writer.write(&bgr)?;
        self.frames += 1;
        Ok(())
    }

    fn frames_written(&self) -> usize {
        self.frames
    }

    fn finish(&mut self) -> Result<()> {
        if !self.finished {
            self.finished = true;
            self.writer.release()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_clip(path: &Path, params: &VideoParams, frames: usize) {
        let mut writer = create_video_writer(path, params).unwrap();
        for i in 0..frames {
            #[allow(clippy::cast_possible_truncation)]
            let shade = (i * 40) as u8;
            writer
                .write_frame(&RgbImage::from_pixel(params.width, params.height, image::Rgb([shade; 3])))
                .unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_read_video_params() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.avi");
        let params = VideoParams::new(24.0, 64, 48);
        write_clip(&path, &params, 2);

        let read = read_video_params(&path).unwrap();
        assert_eq!((read.width, read.height), (64, 48));
        assert!((read.fps - 24.0).abs() < 0.01);
        assert_eq!(open_video(&path).unwrap().count(), 2);
    }

    #[test]
    fn test_writer_creates_parent_and_counts_frames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.avi");
        let params = VideoParams::new(10.0, 32, 32);
        let mut writer = create_video_writer(&path, &params).unwrap();
        writer.write_frame(&RgbImage::new(32, 32)).unwrap();
        assert_eq!(writer.frames_written(), 1);

        let wrong = writer.write_frame(&RgbImage::new(16, 32));
        assert!(matches!(wrong, Err(AnnotateError::Video(_))));
        assert_eq!(writer.frames_written(), 1);

        writer.finish().unwrap();
        writer.finish().unwrap();
        assert!(writer.write_frame(&RgbImage::new(32, 32)).is_err());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_decodes_frame_colors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colors.avi");
        let params = VideoParams::new(25.0, 48, 32);
        let mut writer = create_video_writer(&path, &params).unwrap();
        writer
            .write_frame(&RgbImage::from_pixel(48, 32, image::Rgb([220, 20, 20])))
            .unwrap();
        writer.finish().unwrap();

        let frames: Vec<RgbImage> = open_video(&path)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(frames.len(), 1);
        let pixel = frames[0].get_pixel(24, 16);
        // Channel order survives the BGR round trip.
        assert!(pixel[0] > 150 && pixel[1] < 100 && pixel[2] < 100);
    }

    #[test]
    fn test_missing_video_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            open_video(dir.path().join("nope.mp4")),
            Err(AnnotateError::NotFound(_))
        ));
    }

    #[test]
    fn test_undecodable_file_is_video_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.avi");
        std::fs::write(&path, b"this is not a video container").unwrap();
        assert!(matches!(open_video(&path), Err(AnnotateError::Video(_))));
    }
}
