// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton overlay drawing and frame selection.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::config::AnnotateConfig;
use crate::keypoints::{FrameEntry, Keypoint, Person};
use crate::logging::LogSink;

/// How the endpoints of a skeleton pair `(i, j)` are found in a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairCheck {
    /// `i` and `j` are positions in the person's stored sequence.
    ///
    /// A person with gaps in its keypoints will have the wrong joints joined.
    #[default]
    Position,
    /// `i` and `j` are COCO keypoint indices looked up in the person.
    KeypointIndex,
}

/// Decides whether a decoded frame goes to the output video.
pub trait FramePolicy {
    /// `frame` is the frame's entry, empty when the table has none.
    fn should_write(&self, frame: &FrameEntry) -> bool;
}

/// Writes every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteAll;

impl FramePolicy for WriteAll {
    fn should_write(&self, _frame: &FrameEntry) -> bool {
        true
    }
}

/// Writes only frames where some person has at least one keypoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetectedOnly;

impl FramePolicy for DetectedOnly {
    fn should_write(&self, frame: &FrameEntry) -> bool {
        frame.has_detections()
    }
}

impl<F: Fn(&FrameEntry) -> bool> FramePolicy for F {
    fn should_write(&self, frame: &FrameEntry) -> bool {
        self(frame)
    }
}

/// Counts of what one call to [`OverlayRenderer::draw_frame`] drew.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Joint markers drawn. Markers entirely off the image are not counted.
    pub markers: usize,
    /// Bone lines drawn.
    pub lines: usize,
    /// Pairs skipped because an endpoint was missing.
    pub skipped_pairs: usize,
}

/// Draws joints and bones for every person in a frame.
pub struct OverlayRenderer<'a> {
    config: &'a AnnotateConfig,
    log: &'a dyn LogSink,
}

impl<'a> OverlayRenderer<'a> {
    /// Create a renderer.
    #[must_use]
    pub fn new(config: &'a AnnotateConfig, log: &'a dyn LogSink) -> Self {
        Self { config, log }
    }

    /// Overlay `frame`'s keypoints onto `image`.
    ///
    /// Every keypoint gets a filled marker. Every configured pair whose two
    /// endpoints are present gets a line; a pair with a missing endpoint is
    /// logged and skipped without affecting the rest of the frame.
    pub fn draw_frame(&self, image: &mut RgbImage, frame: &FrameEntry) -> DrawStats {
        let mut stats = DrawStats::default();
        let marker: Rgb<u8> = self.config.marker_color.into();
        let line: Rgb<u8> = self.config.line_color.into();

        for (_, person) in frame.persons() {
            for kp in person.keypoints() {
                if draw_marker(image, kp, self.config.marker_radius, marker) {
                    stats.markers += 1;
                }
            }

            for &(i, j) in &self.config.pairs {
                match (self.endpoint(person, i), self.endpoint(person, j)) {
                    (Some(a), Some(b)) => {
                        draw_thick_line(image, a, b, self.config.line_thickness, line);
                        stats.lines += 1;
                    }
                    _ => {
                        self.log
                            .error(&format!("Skipping line for out-of-bounds indices: {i}, {j}"));
                        stats.skipped_pairs += 1;
                    }
                }
            }
        }
        stats
    }

    fn endpoint<'p>(&self, person: &'p Person, index: usize) -> Option<&'p Keypoint> {
        match self.config.pair_check {
            PairCheck::Position => person.get(index),
            PairCheck::KeypointIndex => person.find(index),
        }
    }
}

/// Draw a filled marker unless it lies wholly outside the image.
fn draw_marker(image: &mut RgbImage, kp: &Keypoint, radius: i32, color: Rgb<u8>) -> bool {
    let radius = radius.max(0);
    let (x, y, r) = (i64::from(kp.x), i64::from(kp.y), i64::from(radius));
    let off_image = x + r < 0
        || y + r < 0
        || x - r >= i64::from(image.width())
        || y - r >= i64::from(image.height());
    if off_image {
        return false;
    }
    draw_filled_circle_mut(image, (kp.x, kp.y), radius, color);
    true
}

type Segment = ((f64, f64), (f64, f64));

/// Clip a segment to the box `[lo, hi_x] x [lo, hi_y]` (Liang-Barsky).
fn clip_segment(a: (f64, f64), b: (f64, f64), lo: f64, hi_x: f64, hi_y: f64) -> Option<Segment> {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [(-dx, a.0 - lo), (dx, hi_x - a.0), (-dy, a.1 - lo), (dy, hi_y - a.1)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some((
        (a.0 + t0 * dx, a.1 + t0 * dy),
        (a.0 + t1 * dx, a.1 + t1 * dy),
    ))
}

/// Draw a line `thickness` pixels wide as parallel one-pixel segments
/// stacked along the line's minor axis.
///
/// The segment is first clipped to the image grown by the line width, so
/// keypoints anywhere in the `i32` range draw only their visible part.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn draw_thick_line(image: &mut RgbImage, a: &Keypoint, b: &Keypoint, thickness: u32, color: Rgb<u8>) {
    let (ax, ay) = (f64::from(a.x), f64::from(a.y));
    let (bx, by) = (f64::from(b.x), f64::from(b.y));
    let steep = (by - ay).abs() > (bx - ax).abs();
    let thickness = thickness.clamp(1, 1024) as i32;
    let margin = f64::from(thickness);
    let Some(((ax, ay), (bx, by))) = clip_segment(
        (ax, ay),
        (bx, by),
        -margin,
        f64::from(image.width()) + margin,
        f64::from(image.height()) + margin,
    ) else {
        return;
    };

    let first = -(thickness - 1) / 2;
    for offset in first..first + thickness {
        let (dx, dy) = if steep {
            (f64::from(offset), 0.0)
        } else {
            (0.0, f64::from(offset))
        };
        draw_line_segment_mut(
            image,
            ((ax + dx) as f32, (ay + dy) as f32),
            ((bx + dx) as f32, (by + dy) as f32),
            color,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypoints::KeypointTable;
    use crate::logging::{Level, MemorySink};

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

    fn full_person(frame: &mut FrameEntry, index: usize, offset: i32) {
        #[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
        let person: Person = (0..17)
            .map(|k| Keypoint::new(k, offset + 10 * k as i32, offset + 5 * k as i32, 0.9))
            .collect();
        frame.set_person(index, person);
    }

    #[test]
    fn test_scenario_two_markers_and_line() {
        let mut table = KeypointTable::new();
        table.insert(3, 0, Keypoint::new(5, 100, 200, 0.9));
        table.insert(3, 0, Keypoint::new(6, 150, 200, 0.8));
        let frame = table.frame(3).unwrap();

        let log = MemorySink::new();
        let config = AnnotateConfig::new()
            .with_pairs(vec![(5, 6)])
            .with_pair_check(PairCheck::KeypointIndex);
        let renderer = OverlayRenderer::new(&config, &log);
        let mut image = RgbImage::new(320, 240);
        let stats = renderer.draw_frame(&mut image, frame);

        assert_eq!(stats, DrawStats { markers: 2, lines: 1, skipped_pairs: 0 });
        // markers sit under the line ends, so probe just above them
        assert_eq!(*image.get_pixel(100, 198), RED);
        assert_eq!(*image.get_pixel(150, 198), RED);
        assert_eq!(*image.get_pixel(125, 200), GREEN);
        assert_eq!(*image.get_pixel(125, 201), GREEN);
        assert!(log.records().is_empty());
    }

    #[test]
    fn test_position_check_treats_sparse_person_as_short() {
        let mut table = KeypointTable::new();
        table.insert(3, 0, Keypoint::new(5, 100, 200, 0.9));
        table.insert(3, 0, Keypoint::new(6, 150, 200, 0.8));

        let log = MemorySink::new();
        let config = AnnotateConfig::new().with_pairs(vec![(5, 6)]);
        let renderer = OverlayRenderer::new(&config, &log);
        let mut image = RgbImage::new(320, 240);
        let stats = renderer.draw_frame(&mut image, table.frame(3).unwrap());

        assert_eq!(stats.markers, 2);
        assert_eq!(stats.lines, 0);
        assert_eq!(*image.get_pixel(125, 200), Rgb([0, 0, 0]));
        assert!(log.contains(Level::Error, "out-of-bounds indices: 5, 6"));
    }

    #[test]
    fn test_out_of_bounds_pair_skips_only_that_segment() {
        let mut frame = FrameEntry::new();
        full_person(&mut frame, 0, 20);

        let log = MemorySink::new();
        let mut pairs = crate::visualizer::COCO_PAIRS.to_vec();
        pairs.insert(3, (5, 20));
        let config = AnnotateConfig::new().with_pairs(pairs);
        let renderer = OverlayRenderer::new(&config, &log);
        let mut image = RgbImage::new(320, 240);
        let stats = renderer.draw_frame(&mut image, &frame);

        assert_eq!(stats.markers, 17);
        assert_eq!(stats.lines, 12);
        assert_eq!(stats.skipped_pairs, 1);
        assert_eq!(log.messages(Level::Error).len(), 1);
        assert!(log.contains(Level::Error, "5, 20"));
        // the nose is in no pair but is still marked
        assert_eq!(*image.get_pixel(20, 20), RED);
    }

    #[test]
    fn test_render_is_deterministic() {
        let mut frame = FrameEntry::new();
        full_person(&mut frame, 0, 5);
        full_person(&mut frame, 1, 40);

        let log = MemorySink::new();
        let config = AnnotateConfig::new();
        let renderer = OverlayRenderer::new(&config, &log);
        let base = RgbImage::from_pixel(256, 160, Rgb([12, 34, 56]));

        let mut first = base.clone();
        let mut second = base.clone();
        renderer.draw_frame(&mut first, &frame);
        renderer.draw_frame(&mut second, &frame);
        assert_eq!(first, second);
        assert_ne!(first, base);
    }

    #[test]
    fn test_keypoints_outside_image_are_clipped() {
        let mut frame = FrameEntry::new();
        frame.set_person(
            0,
            [Keypoint::new(0, -50, -50, 0.9), Keypoint::new(1, 500, 500, 0.9)]
                .into_iter()
                .collect(),
        );
        let log = MemorySink::new();
        let config = AnnotateConfig::new().with_pairs(vec![(0, 1)]);
        let renderer = OverlayRenderer::new(&config, &log);
        let mut image = RgbImage::new(64, 64);
        let stats = renderer.draw_frame(&mut image, &frame);
        assert_eq!(stats.lines, 1);
        assert_eq!(*image.get_pixel(32, 32), GREEN);
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let csv = "Frame,Person,Keypoint,X,Y,Prob\n0,0,0,2147483647,10,0.9\n0,0,1,10,10,0.9\n";
        let table = crate::keypoint_csv::parse_keypoints_csv(csv.as_bytes()).unwrap();

        let log = MemorySink::new();
        let config = AnnotateConfig::new()
            .with_pairs(vec![(0, 1)])
            .with_marker_radius(10)
            .with_line_thickness(6);
        let renderer = OverlayRenderer::new(&config, &log);
        let mut image = RgbImage::new(64, 32);
        let stats = renderer.draw_frame(&mut image, table.frame(0).unwrap());

        assert_eq!(stats, DrawStats { markers: 1, lines: 1, skipped_pairs: 0 });
        // the visible run of the line reaches the right edge
        assert_eq!(*image.get_pixel(63, 10), GREEN);
        assert_eq!(*image.get_pixel(10, 3), RED);
    }

    #[test]
    fn test_extreme_coordinates_both_ends_off_image() {
        let mut frame = FrameEntry::new();
        frame.set_person(
            0,
            [
                Keypoint::new(0, i32::MIN, i32::MIN, 0.9),
                Keypoint::new(1, i32::MAX, i32::MAX, 0.9),
                Keypoint::new(2, i32::MAX, i32::MIN, 0.9),
            ]
            .into_iter()
            .collect(),
        );
        let log = MemorySink::new();
        let config = AnnotateConfig::new().with_pairs(vec![(0, 1), (1, 2)]);
        let renderer = OverlayRenderer::new(&config, &log);
        let mut image = RgbImage::new(32, 32);
        let stats = renderer.draw_frame(&mut image, &frame);

        assert_eq!(stats.markers, 0);
        assert_eq!(stats.lines, 2);
        // the diagonal crosses the image, the right-hand vertical misses it
        assert_eq!(*image.get_pixel(16, 16), GREEN);
        assert_eq!(*image.get_pixel(31, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_detected_only_policy() {
        let empty = FrameEntry::new();
        assert!(!DetectedOnly.should_write(&empty));
        assert!(WriteAll.should_write(&empty));

        let mut hollow = FrameEntry::new();
        hollow.set_person(0, Person::new());
        assert!(!DetectedOnly.should_write(&hollow));

        let mut one = FrameEntry::new();
        one.person_mut(2).insert(Keypoint::new(0, 1, 1, 0.1));
        assert!(DetectedOnly.should_write(&one));
    }

    #[test]
    fn test_closure_policy() {
        let at_least_two = |frame: &FrameEntry| frame.len() >= 2;
        let mut frame = FrameEntry::new();
        full_person(&mut frame, 0, 0);
        assert!(!at_least_two.should_write(&frame));
        full_person(&mut frame, 1, 0);
        assert!(at_least_two.should_write(&frame));
    }
}
