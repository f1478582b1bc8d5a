// THEORY:
// Once a crossing has been reported, the same subject keeps straddling the
// center line for several more frames. The `Cooldown` suppresses those repeat
// detections.
//
// It is a signed counter. Zero means idle. A reported crossing arms it to
// `sign * frames`, and every processed frame moves it one step back towards
// zero. The sign keeps the direction of the last crossing around for display.
// The playback driver owns it; the detector only ever sees whether it is
// active, and reports crossings back as `CrossingEvent`s.

use crate::core_modules::direction_resolver::Direction;
use crate::pipeline::CrossingEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cooldown {
    remaining: i64,
}

impl Cooldown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.remaining != 0
    }

    /// The signed counter value.
    pub fn remaining(&self) -> i64 {
        self.remaining
    }

    /// The direction of the crossing currently cooling down, if any.
    pub fn direction(&self) -> Direction {
        match self.remaining.signum() {
            -1 => Direction::Negative,
            1 => Direction::Positive,
            _ => Direction::Neutral,
        }
    }

    /// Moves the counter one frame closer to zero.
    pub fn decay(&mut self) {
        self.remaining -= self.remaining.signum();
    }

    /// Starts a cooldown of `frames` frames in the event's direction.
    pub fn arm(&mut self, event: &CrossingEvent, frames: u32) {
        self.remaining = event.direction.sign() as i64 * frames as i64;
    }

    pub fn reset(&mut self) {
        self.remaining = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(direction: Direction) -> CrossingEvent {
        CrossingEvent {
            frame_number: 12,
            timestamp: 0,
            direction,
        }
    }

    #[test]
    fn decays_towards_zero_from_either_side() {
        let mut positive = Cooldown::new();
        positive.arm(&event(Direction::Positive), 3);
        let mut negative = Cooldown::new();
        negative.arm(&event(Direction::Negative), 3);
        assert_eq!((positive.remaining(), negative.remaining()), (3, -3));

        for _ in 0..3 {
            assert!(positive.is_active() && negative.is_active());
            positive.decay();
            negative.decay();
        }
        assert!(!positive.is_active() && !negative.is_active());
        positive.decay();
        assert_eq!(positive.remaining(), 0);
    }

    #[test]
    fn keeps_the_direction_while_active() {
        let mut cooldown = Cooldown::new();
        assert_eq!(cooldown.direction(), Direction::Neutral);
        cooldown.arm(&event(Direction::Negative), 540);
        assert_eq!(cooldown.direction(), Direction::Negative);
        cooldown.reset();
        assert!(!cooldown.is_active());
    }
}
