// THEORY:
// The `pipeline` module is the top-level synchronous API of the vision engine.
// `MotionDetector` owns the only state the algorithm needs between frames (the
// smoothed comparison frame and the recent motion history) and runs the full
// per-frame stack:
//
//     smooth -> difference -> mask -> boxes -> filter -> crossing -> direction
//
// It is deliberately single-threaded. Every step depends on the baseline and
// history left by the previous step, so frames of one camera must be processed
// strictly in order. The asynchronous handoff lives in `processing_channel`.

use crate::core_modules::direction_resolver::DirectionResolver;
use crate::core_modules::frame::Frame;
use crate::core_modules::motion_history::MotionHistory;
use crate::core_modules::region_extractor::region_extractor;
use crate::core_modules::utils::image_helper;
use crate::error::{Result, VisionError};
use image::GrayImage;
use log::{debug, info};

// Re-export key data structures for the public API.
pub use crate::core_modules::direction_resolver::Direction;
pub use crate::core_modules::motion_box::MotionBox;

/// Configuration for the MotionDetector. The defaults are tuned for 320 px wide
/// gate footage with the crossing line in the middle.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// The column a subject must straddle to count as crossing.
    pub center_column: u32,
    /// Regions whose top edge lies below this row are ignored.
    pub ground_level: u32,
    /// Gaussian sigma applied before differencing (2.3 matches a 13x13 kernel).
    pub blur_sigma: f32,
    /// Per-pixel difference that counts as change.
    pub diff_threshold: u8,
    /// Dilation radius of the change mask, in pixels.
    pub dilate_radius: u8,
    pub min_box_area: u32,
    pub max_box_area: u32,
    /// Plausible width and height bounds for a subject during direction resolution.
    pub min_box_side: u32,
    pub max_box_side: u32,
    /// Smallest acceptable `min(area) / max(area)` between chained boxes.
    pub min_size_ratio: f64,
    /// A chained box starting left of this column is at the image edge.
    pub left_edge_margin: u32,
    /// A chained box ending right of this column is at the image edge.
    pub right_edge_limit: u32,
    /// Maximum number of earlier frames the direction resolver inspects.
    pub lookback_budget: usize,
    /// Crossings are only resolved on frames numbered above this.
    pub min_frame_number: u64,
    /// Number of frames kept in the motion history ring.
    pub history_capacity: usize,
    /// Cooldown armed by a reported crossing. The counter decays before each
    /// frame, so a value of N suppresses the next N - 1 frames.
    pub cooldown_frames: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            center_column: 160,
            ground_level: 400,
            blur_sigma: 2.3,
            diff_threshold: 2,
            dilate_radius: 3,
            min_box_area: 15,
            max_box_area: 10_000,
            min_box_side: 5,
            max_box_side: 100,
            min_size_ratio: 0.3,
            left_edge_margin: 20,
            right_edge_limit: 300,
            lookback_budget: 10,
            min_frame_number: 4,
            history_capacity: 16,
            cooldown_frames: 90 * 6,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_box_area > self.max_box_area {
            return Err(VisionError::config("min_box_area exceeds max_box_area"));
        }
        if self.min_box_side > self.max_box_side {
            return Err(VisionError::config("min_box_side exceeds max_box_side"));
        }
        if !(self.min_size_ratio > 0.0 && self.min_size_ratio <= 1.0) {
            return Err(VisionError::config("min_size_ratio must be in (0, 1]"));
        }
        if !(self.blur_sigma > 0.0) {
            return Err(VisionError::config("blur_sigma must be positive"));
        }
        if self.history_capacity <= self.lookback_budget {
            return Err(VisionError::config(format!(
                "history_capacity ({}) must exceed lookback_budget ({})",
                self.history_capacity, self.lookback_budget
            )));
        }
        if self.cooldown_frames == 0 {
            return Err(VisionError::config("cooldown_frames must be at least 1"));
        }
        Ok(())
    }
}

/// A crossing with a resolved direction, as reported for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossingEvent {
    pub frame_number: u64,
    pub timestamp: i64,
    pub direction: Direction,
}

/// The output of the detector for a single frame.
#[derive(Debug, Clone)]
pub struct DetectionResult {
    pub frame_number: u64,
    pub timestamp: i64,
    /// A crossing with a resolved direction was found.
    pub motion_found: bool,
    pub direction: Direction,
    /// Some filtered box straddled the center column, resolved or not.
    pub crossing_seen: bool,
    /// The boxes that survived filtering, in extraction order.
    pub boxes: Vec<MotionBox>,
    /// The input frame with a marker drawn around every filtered box.
    pub annotated: GrayImage,
}

impl DetectionResult {
    /// The crossing event of this frame, if one was reported.
    pub fn event(&self) -> Option<CrossingEvent> {
        self.motion_found.then_some(CrossingEvent {
            frame_number: self.frame_number,
            timestamp: self.timestamp,
            direction: self.direction,
        })
    }
}

/// The stateful line-crossing engine for one camera.
pub struct MotionDetector {
    config: DetectorConfig,
    baseline: Option<GrayImage>,
    history: MotionHistory,
}

impl MotionDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        let history = MotionHistory::with_capacity(config.history_capacity);
        Ok(Self {
            config,
            baseline: None,
            history,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn history(&self) -> &MotionHistory {
        &self.history
    }

    /// Forgets the comparison frame and all motion history.
    pub fn reset(&mut self) {
        self.baseline = None;
        self.history.clear();
    }

    /// Runs the full detection stack on `frame`. While `cooldown_active` is set
    /// crossings are still marked but never resolved or reported.
    pub fn process(&mut self, frame: Frame, cooldown_active: bool) -> Result<DetectionResult> {
        let Frame {
            frame_number,
            timestamp,
            image,
        } = frame;

        // Stage 1: Smoothing
        let smoothed = region_extractor::smooth(&image, self.config.blur_sigma);

        let mut result = DetectionResult {
            frame_number,
            timestamp,
            motion_found: false,
            direction: Direction::Neutral,
            crossing_seen: false,
            boxes: Vec::new(),
            annotated: image,
        };

        // Stage 2: Baseline
        let Some(baseline) = self.baseline.take() else {
            debug!("Frame {} becomes the first comparison frame", frame_number);
            self.baseline = Some(smoothed);
            return Ok(result);
        };
        if baseline.dimensions() != smoothed.dimensions() {
            let expected = baseline.dimensions();
            self.baseline = Some(baseline);
            return Err(VisionError::DimensionMismatch {
                expected,
                actual: smoothed.dimensions(),
            });
        }

        // Stage 3: Region Extraction
        let mask = region_extractor::motion_mask(
            &baseline,
            &smoothed,
            self.config.diff_threshold,
            self.config.dilate_radius,
        );
        let candidates = region_extractor::extract_boxes(&mask, frame_number);
        self.history.insert(frame_number, candidates.clone());

        // Stage 4: Filtering
        result.boxes = candidates
            .into_iter()
            .filter(|b| self.is_reportable(b))
            .collect();
        debug!("Frame {}: {} motion boxes after filtering", frame_number, result.boxes.len());

        // Stage 5: Crossing and Direction
        let can_resolve = !cooldown_active && frame_number > self.config.min_frame_number;
        let resolver = DirectionResolver::new(&self.history, &self.config);
        for motion_box in result.boxes.iter().filter(|b| b.straddles_column(self.config.center_column)) {
            result.crossing_seen = true;
            if !can_resolve {
                continue;
            }
            let direction = resolver.resolve(motion_box, frame_number, self.config.lookback_budget);
            if direction.is_resolved() {
                info!("Crossing at frame {} heading {:?}", frame_number, direction);
                result.motion_found = true;
                result.direction = direction;
                break;
            }
        }

        // Stage 6: Annotation and baseline swap
        for motion_box in &result.boxes {
            image_helper::draw_box_marker(&mut result.annotated, motion_box);
        }
        self.baseline = Some(smoothed);

        Ok(result)
    }

    fn is_reportable(&self, motion_box: &MotionBox) -> bool {
        motion_box.y <= self.config.ground_level
            && motion_box.area >= self.config.min_box_area
            && motion_box.area <= self.config.max_box_area
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use image::Luma;

    pub const WIDTH: u32 = 320;
    pub const HEIGHT: u32 = 240;
    pub const BACKGROUND: u8 = 20;
    pub const SUBJECT: u8 = 220;

    /// A static background with an optional bright square subject.
    pub fn scene(subject: Option<(u32, u32, u32)>) -> GrayImage {
        GrayImage::from_fn(WIDTH, HEIGHT, |x, y| match subject {
            Some((sx, sy, side)) if x >= sx && x < sx + side && y >= sy && y < sy + side => Luma([SUBJECT]),
            _ => Luma([BACKGROUND]),
        })
    }

    /// Frames 1..=`count` of a 20 px subject at row 100, placed by `position`.
    pub fn sequence(count: u64, position: impl Fn(u64) -> Option<u32>) -> Vec<Frame> {
        (1..=count)
            .map(|n| Frame::new(n, n as i64 * 40, scene(position(n).map(|x| (x, 100, 20)))))
            .collect()
    }

    /// Subject entering at the left edge and moving 20 px per frame.
    pub fn entering_from_left(n: u64) -> Option<u32> {
        Some(20 * (n as u32 - 1))
    }

    /// Subject appearing at x=100 on frame 5 and moving 20 px per frame.
    pub fn appearing_at_frame_five(n: u64) -> Option<u32> {
        (n >= 5).then(|| 100 + 20 * (n as u32 - 5))
    }
}
