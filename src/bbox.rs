// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Bounding-box overlays from `Frame <n>` block files.
//!
//! The box file is not a CSV: it is a sequence of blocks, each opened by a
//! `Frame <n>` header line and followed by `x1,y1,x2,y2,score` rows.
//!
//! ```text
//! Frame 10
//! 10,20,30,40,0.6
//! 12.5,22,80,90,0.4
//! Frame 11
//! ```
//!
//! Frame numbers count decoded frames from 1.

use std::collections::BTreeMap;
use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::config::AnnotateConfig;
use crate::error::{AnnotateError, Result};
use crate::logging::LogSink;
use crate::pipeline::{RenderReport, render_file};

/// One detection rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Detection confidence.
    pub score: f32,
}

impl BoundingBox {
    /// Create a box.
    #[must_use]
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            score,
        }
    }

    /// Whether the score is strictly above `threshold`.
    #[must_use]
    pub fn passes(&self, threshold: f32) -> bool {
        self.score > threshold
    }

    /// Corners truncated toward zero, ordered so that `x1 <= x2` and `y1 <= y2`.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn pixel_corners(&self) -> (i32, i32, i32, i32) {
        let (x1, x2) = (self.x1 as i32, self.x2 as i32);
        let (y1, y2) = (self.y1 as i32, self.y2 as i32);
        (x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2))
    }
}

/// Sparse mapping from frame number to that frame's boxes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxTable {
    frames: BTreeMap<usize, Vec<BoundingBox>>,
}

impl BoxTable {
    /// Create an empty table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames: BTreeMap::new(),
        }
    }

    /// Number of frames with a block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the table has no blocks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Boxes for a frame; empty when the frame has no block.
    #[must_use]
    pub fn boxes(&self, frame: usize) -> &[BoundingBox] {
        self.frames.get(&frame).map(Vec::as_slice).unwrap_or_default()
    }

    /// Whether a block exists for `frame`.
    #[must_use]
    pub fn contains(&self, frame: usize) -> bool {
        self.frames.contains_key(&frame)
    }

    /// Frames in ascending order.
    pub fn frames(&self) -> impl Iterator<Item = (usize, &[BoundingBox])> {
        self.frames.iter().map(|(idx, boxes)| (*idx, boxes.as_slice()))
    }

    /// Start a block for `frame`, replacing any earlier block with that number.
    pub fn start_frame(&mut self, frame: usize) -> &mut Vec<BoundingBox> {
        let boxes = self.frames.entry(frame).or_default();
        boxes.clear();
        boxes
    }
}

enum ParseState<'t> {
    ExpectFrameHeader,
    ExpectDataRowOrNextHeader(&'t mut Vec<BoundingBox>),
}

fn parse_header(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("Frame")?;
    rest.starts_with(char::is_whitespace).then(|| rest.trim())
}

fn parse_row(line: &str, line_no: usize) -> Result<BoundingBox> {
    let values = line
        .split(',')
        .map(|field| field.trim().parse::<f32>().ok().filter(|v| v.is_finite()))
        .collect::<Option<Vec<f32>>>()
        .ok_or_else(|| {
            AnnotateError::MalformedData(format!("line {line_no}: invalid box row '{line}'"))
        })?;

    match values.as_slice() {
        &[x1, y1, x2, y2, score] => Ok(BoundingBox::new(x1, y1, x2, y2, score)),
        _ => Err(AnnotateError::MalformedData(format!(
            "line {line_no}: expected 5 values x1,y1,x2,y2,score, found {} in '{line}'",
            values.len()
        ))),
    }
}

/// Parse box blocks from text.
///
/// Blank lines are ignored. A row before the first header, a header whose
/// number is not a non-negative integer, or a row that is not five numbers is
/// a [`AnnotateError::MalformedData`] naming the line.
///
/// # Errors
///
/// Returns [`AnnotateError::MalformedData`] as described above.
pub fn parse_bbox_blocks(text: &str) -> Result<BoxTable> {
    let mut table = BoxTable::new();
    let mut state = ParseState::ExpectFrameHeader;

    for (line_no, raw) in text.lines().enumerate().map(|(i, l)| (i + 1, l)) {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(number) = parse_header(line) {
            let frame = number.parse::<usize>().map_err(|_| {
                AnnotateError::MalformedData(format!(
                    "line {line_no}: invalid frame number in '{line}'"
                ))
            })?;
            state = ParseState::ExpectDataRowOrNextHeader(table.start_frame(frame));
            continue;
        }

        match &mut state {
            ParseState::ExpectFrameHeader => {
                return Err(AnnotateError::MalformedData(format!(
                    "line {line_no}: box row before any 'Frame <n>' header: '{line}'"
                )));
            }
            ParseState::ExpectDataRowOrNextHeader(boxes) => boxes.push(parse_row(line, line_no)?),
        }
    }
    Ok(table)
}

/// Read and parse a box file.
///
/// # Errors
///
/// Returns [`AnnotateError::NotFound`] if the file does not exist and
/// [`AnnotateError::MalformedData`] if it cannot be parsed.
pub fn read_bbox_file<P: AsRef<Path>>(path: P) -> Result<BoxTable> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AnnotateError::NotFound(format!("The specified box file {} was not found.", path.display()))
        } else {
            AnnotateError::Io(e)
        }
    })?;
    parse_bbox_blocks(&text)
}

/// Draws confident boxes and their score labels onto video frames.
pub struct BoxOverlayProcessor<'a> {
    config: &'a AnnotateConfig,
    font: Option<&'a FontVec>,
    log: &'a dyn LogSink,
}

impl<'a> BoxOverlayProcessor<'a> {
    /// Create a processor. Without a font, rectangles are drawn but labels are not.
    #[must_use]
    pub const fn new(
        config: &'a AnnotateConfig,
        font: Option<&'a FontVec>,
        log: &'a dyn LogSink,
    ) -> Self {
        Self { config, font, log }
    }

    /// Draw every box scoring above the threshold. Returns the number drawn.
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn draw_boxes(&self, image: &mut RgbImage, boxes: &[BoundingBox]) -> usize {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return 0;
        }
        let box_color: Rgb<u8> = self.config.box_color.into();
        let label_color: Rgb<u8> = self.config.label_color.into();
        let mut drawn = 0;

        for bbox in boxes.iter().filter(|b| b.passes(self.config.box_threshold)) {
            let (x1, y1, x2, y2) = bbox.pixel_corners();

            // Clamp to image bounds
            let x1 = x1.clamp(0, width as i32 - 1);
            let y1 = y1.clamp(0, height as i32 - 1);
            let x2 = x2.clamp(0, width as i32 - 1);
            let y2 = y2.clamp(0, height as i32 - 1);
            if x2 <= x1 || y2 <= y1 {
                continue;
            }

            for t in 0..self.config.box_thickness as i32 {
                let tx1 = (x1 + t).min(x2);
                let ty1 = (y1 + t).min(y2);
                let tx2 = (x2 - t).max(tx1);
                let ty2 = (y2 - t).max(ty1);
                if tx2 > tx1 && ty2 > ty1 {
                    let rect = Rect::at(tx1, ty1).of_size((tx2 - tx1) as u32, (ty2 - ty1) as u32);
                    draw_hollow_rect_mut(image, rect, box_color);
                }
            }
            drawn += 1;

            if let Some(font) = self.font {
                let label = format!("{:.2}", bbox.score);
                // Position text above box if there's room, otherwise below
                let text_y = if y1 > 20 { y1 - 20 } else { y2 + 5 };
                if text_y < height as i32 {
                    let scale = PxScale::from(self.config.label_scale);
                    draw_text_mut(image, label_color, x1, text_y, scale, font, &label);
                }
            }
        }
        drawn
    }

    /// Render `video_in` with the boxes from `boxes_in` into `video_out`.
    ///
    /// Every decoded frame is written; frames without a block or without a
    /// confident box are written unannotated.
    ///
    /// # Errors
    ///
    /// Returns an error if the box file cannot be read or parsed, or if the
    /// source video cannot be opened. Later failures are logged and reported.
    pub fn process_video<P1, P2, P3>(
        &self,
        video_in: P1,
        boxes_in: P2,
        video_out: P3,
    ) -> Result<RenderReport>
    where
        P1: AsRef<Path>,
        P2: AsRef<Path>,
        P3: AsRef<Path>,
    {
        let table = read_bbox_file(boxes_in)?;
        if self.font.is_none() {
            self.log.warn("No label font loaded, box scores will not be drawn");
        }
        render_file(
            video_in.as_ref(),
            video_out.as_ref(),
            self.log,
            |writer| writer,
            |index, image| {
                self.draw_boxes(image, table.boxes(index + 1));
                true
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemorySink;

    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    #[test]
    fn test_parse_scenario_block() {
        let table = parse_bbox_blocks("Frame 10\n10,20,30,40,0.6\n").unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.boxes(10), &[BoundingBox::new(10.0, 20.0, 30.0, 40.0, 0.6)]);
        assert!(table.boxes(9).is_empty());
    }

    #[test]
    fn test_parse_multiple_blocks() {
        let text = "Frame 1\n1,2,3,4,0.9\n 5, 6, 7, 8, 0.1 \n\nFrame 3\nFrame 2\n9,9,19,19,0.7\n";
        let table = parse_bbox_blocks(text).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.boxes(1).len(), 2);
        assert!(table.contains(3));
        assert!(table.boxes(3).is_empty());
        let order: Vec<usize> = table.frames().map(|(f, _)| f).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_block_replaces_earlier() {
        let table = parse_bbox_blocks("Frame 4\n1,1,2,2,0.9\nFrame 4\n3,3,4,4,0.8\n").unwrap();
        assert_eq!(table.boxes(4), &[BoundingBox::new(3.0, 3.0, 4.0, 4.0, 0.8)]);
    }

    #[test]
    fn test_malformed_inputs() {
        let cases = [
            ("10,20,30,40,0.6\n", "line 1"),
            ("Frame ten\n", "line 1"),
            ("Frame 1\n10,20,30,0.6\n", "line 2"),
            ("Frame 1\n\n10,20,x,40,0.6\n", "line 3"),
            ("Frame -1\n", "line 1"),
        ];
        for (text, needle) in cases {
            let err = parse_bbox_blocks(text).unwrap_err();
            assert!(err.is_malformed(), "{text:?}");
            assert!(err.to_string().contains(needle), "{err}");
        }
    }

    #[test]
    fn test_header_needs_separator() {
        assert!(parse_bbox_blocks("Frame10\n").is_err());
        assert!(parse_bbox_blocks("Frame\t7\n").unwrap().contains(7));
    }

    #[test]
    fn test_read_missing_file() {
        assert!(matches!(
            read_bbox_file("/nonexistent/boxes.txt"),
            Err(AnnotateError::NotFound(_))
        ));
    }

    #[test]
    fn test_threshold_decides_drawing() {
        let table =
            parse_bbox_blocks("Frame 10\n10,20,30,40,0.6\n50,20,70,40,0.4\n").unwrap();
        let log = MemorySink::new();
        let config = AnnotateConfig::new();
        let processor = BoxOverlayProcessor::new(&config, None, &log);
        let mut image = RgbImage::new(100, 60);

        assert_eq!(processor.draw_boxes(&mut image, table.boxes(10)), 1);
        assert_eq!(*image.get_pixel(10, 20), GREEN);
        assert_eq!(*image.get_pixel(11, 21), GREEN);
        assert_eq!(*image.get_pixel(20, 30), BLACK);
        assert_eq!(*image.get_pixel(50, 20), BLACK);
        assert_eq!(*image.get_pixel(60, 40), BLACK);
    }

    #[test]
    fn test_exact_threshold_is_not_drawn() {
        let log = MemorySink::new();
        let config = AnnotateConfig::new();
        let processor = BoxOverlayProcessor::new(&config, None, &log);
        let mut image = RgbImage::new(50, 50);
        let boxes = [BoundingBox::new(5.0, 5.0, 20.0, 20.0, 0.5)];
        assert_eq!(processor.draw_boxes(&mut image, &boxes), 0);
    }

    #[test]
    fn test_reversed_and_overflowing_corners() {
        let log = MemorySink::new();
        let config = AnnotateConfig::new();
        let processor = BoxOverlayProcessor::new(&config, None, &log);
        let mut image = RgbImage::new(40, 40);
        let boxes = [BoundingBox::new(30.7, 35.2, -5.0, 5.9, 0.9)];
        assert_eq!(processor.draw_boxes(&mut image, &boxes), 1);
        assert_eq!(*image.get_pixel(0, 5), GREEN);
        assert_eq!(*image.get_pixel(29, 34), GREEN);
    }
}
