// THEORY:
// A single frame only says *that* something straddles the center line, not
// which way it is going. The `DirectionResolver` answers the second question by
// anchoring the crossing box to its own immediate past.
//
// Starting from the crossing box, it steps back one frame at a time through the
// `MotionHistory`, each time picking the first earlier region that plausibly is
// the same subject (similar size, overlapping the current reference, neither
// noise nor glare). The chain stops when the lookback budget is spent or when
// the chain reaches a region near an image edge, where the subject entered the
// view. Comparing the trailing edge of the crossing box with the trailing edge
// of that last link gives the direction of travel.
//
// The walk is greedy: only the first acceptable region of each
// frame is considered, and a frame with no acceptable region ends the search
// with no direction at all. There is no full object tracking here.

use crate::core_modules::motion_box::MotionBox;
use crate::core_modules::motion_history::MotionHistory;
use crate::pipeline::DetectorConfig;

/// Coarse horizontal direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    /// Moving towards smaller x.
    Negative,
    /// No direction could be established.
    #[default]
    Neutral,
    /// Moving towards larger x.
    Positive,
}

impl Direction {
    /// The direction as `-1`, `0` or `+1`.
    pub fn sign(self) -> i32 {
        match self {
            Direction::Negative => -1,
            Direction::Neutral => 0,
            Direction::Positive => 1,
        }
    }

    pub fn is_resolved(self) -> bool {
        self != Direction::Neutral
    }
}

/// The outcome of a backward search, with how far back it had to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub direction: Direction,
    /// Number of earlier frames whose history was inspected.
    pub frames_inspected: usize,
}

/// Walks back through recent motion history to give a crossing a direction.
pub struct DirectionResolver<'a> {
    history: &'a MotionHistory,
    config: &'a DetectorConfig,
}

impl<'a> DirectionResolver<'a> {
    pub fn new(history: &'a MotionHistory, config: &'a DetectorConfig) -> Self {
        Self { history, config }
    }

    /// Resolves the direction of `origin`, found in `frame_number`, looking back
    /// at most `lookback_budget` frames.
    pub fn resolve(&self, origin: &MotionBox, frame_number: u64, lookback_budget: usize) -> Direction {
        self.trace(origin, frame_number, lookback_budget).direction
    }

    /// Same as [`resolve`](Self::resolve), also reporting the search depth.
    ///
    /// The budget is the most earlier frames inspected, so a budget of 10
    /// looks at frames `frame_number - 1` down to `frame_number - 10`. A budget
    /// of 0 still inspects one frame and behaves like 1.
    pub fn trace(&self, origin: &MotionBox, frame_number: u64, lookback_budget: usize) -> Resolution {
        // A zero budget still needs one earlier frame to compare against.
        let budget = lookback_budget.max(1);
        let mut reference = *origin;

        for depth in 1..=budget {
            let undecided = Resolution {
                direction: Direction::Neutral,
                frames_inspected: depth - 1,
            };
            let Some(frame) = frame_number.checked_sub(depth as u64).filter(|f| *f > 0) else {
                return undecided;
            };
            let Some(candidates) = self.history.get(frame) else {
                return undecided;
            };

            let inspected = Resolution {
                direction: Direction::Neutral,
                frames_inspected: depth,
            };
            let Some(candidate) = candidates.iter().find(|c| self.is_plausible_match(&reference, c)) else {
                return inspected;
            };

            if depth == budget || self.is_near_edge(candidate) {
                let direction = if origin.right() > candidate.right() {
                    Direction::Positive
                } else {
                    Direction::Negative
                };
                log::debug!(
                    "Resolved {:?} for frame {} against frame {} ({} frames back)",
                    direction,
                    frame_number,
                    frame,
                    depth
                );
                return Resolution {
                    direction,
                    frames_inspected: depth,
                };
            }

            reference = *candidate;
        }

        Resolution {
            direction: Direction::Neutral,
            frames_inspected: budget,
        }
    }

    fn is_plausible_match(&self, reference: &MotionBox, candidate: &MotionBox) -> bool {
        let config = self.config;
        if candidate.area < config.min_box_area || candidate.area > config.max_box_area {
            return false;
        }
        // The same rectangle again is not an earlier observation.
        if candidate.same_geometry(reference) {
            return false;
        }
        let side_ok = |side: u32| side >= config.min_box_side && side <= config.max_box_side;
        if !side_ok(candidate.w) || !side_ok(candidate.h) {
            return false;
        }
        if reference.size_ratio(candidate) < config.min_size_ratio {
            return false;
        }
        reference.overlaps(candidate)
    }

    fn is_near_edge(&self, candidate: &MotionBox) -> bool {
        candidate.x < self.config.left_edge_margin || candidate.right() > self.config.right_edge_limit
    }
}
