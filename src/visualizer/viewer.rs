// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Preview window for rendered frames.

use image::RgbImage;
use minifb::{Key, Window, WindowOptions};

use crate::error::{AnnotateError, Result};
use crate::io::FrameSink;

/// A simple frame viewer using minifb.
pub struct Viewer {
    window: Window,
    pub width: usize,
    pub height: usize,
    buffer: Vec<u32>,
}

impl Viewer {
    /// Create a new viewer window.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| AnnotateError::Video(format!("Failed to create window: {e}")))?;

        window.limit_update_rate(Some(std::time::Duration::from_micros(16600)));

        Ok(Self {
            window,
            width,
            height,
            buffer: Vec::new(),
        })
    }

    /// Show a frame. Returns `false` once the window is closed or Esc/Q is pressed.
    pub fn update(&mut self, frame: &RgbImage) -> Result<bool> {
        if !self.window.is_open()
            || self.window.is_key_down(Key::Escape)
            || self.window.is_key_down(Key::Q)
        {
            return Ok(false);
        }

        let (width, height) = (frame.width() as usize, frame.height() as usize);
        self.buffer.clear();
        // minifb expects 0x00RRGGBB per pixel
        self.buffer.extend(frame.pixels().map(|p| {
            (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])
        }));
        self.width = width;
        self.height = height;

        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| AnnotateError::Video(format!("Failed to update window: {e}")))?;

        Ok(true)
    }
}

/// Frame sink that shows each frame in a [`Viewer`] before passing it on.
///
/// Closing the window stops the preview; frames keep flowing to the inner sink.
pub struct PreviewSink<S> {
    inner: S,
    viewer: Option<Viewer>,
    title: String,
    closed: bool,
}

impl<S: FrameSink> PreviewSink<S> {
    /// Wrap `inner`. The window opens on the first frame.
    pub fn new(inner: S, title: &str) -> Self {
        Self {
            inner,
            viewer: None,
            title: title.to_string(),
            closed: false,
        }
    }

    /// The wrapped sink.
    pub fn into_inner(self) -> S {
        self.inner
    }

    fn show(&mut self, frame: &RgbImage) -> Result<()> {
        if self.viewer.is_none() {
            let viewer = Viewer::new(&self.title, frame.width() as usize, frame.height() as usize)?;
            self.viewer = Some(viewer);
        }
        if let Some(viewer) = self.viewer.as_mut()
            && !viewer.update(frame)?
        {
            self.closed = true;
            self.viewer = None;
        }
        Ok(())
    }
}

impl<S: FrameSink> FrameSink for PreviewSink<S> {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        if !self.closed {
            self.show(frame)?;
        }
        self.inner.write_frame(frame)
    }

    fn frames_written(&self) -> usize {
        self.inner.frames_written()
    }

    fn finish(&mut self) -> Result<()> {
        self.viewer = None;
        self.inner.finish()
    }
}
