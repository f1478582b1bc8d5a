// THEORY:
// `MotionHistory` gives the detector a short memory. Every processed frame
// leaves behind the full list of regions extracted from it, and the direction
// resolver walks back through those lists when a crossing appears.
//
// Only the last few frames are ever consulted, so the history is a fixed
// ring of slots indexed by `frame_number % capacity`. Inserting a frame
// overwrites whatever older frame shared its slot. Each slot remembers which
// frame it holds, so after a seek a stale slot is never returned for a frame
// that was not processed.

use crate::core_modules::motion_box::MotionBox;

#[derive(Debug, Clone)]
struct HistoryEntry {
    frame_number: u64,
    boxes: Vec<MotionBox>,
}

/// Bounded per-frame store of extracted motion boxes.
#[derive(Debug, Clone)]
pub struct MotionHistory {
    slots: Vec<Option<HistoryEntry>>,
}

impl MotionHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot_index(&self, frame_number: u64) -> usize {
        (frame_number % self.slots.len() as u64) as usize
    }

    /// Records the boxes of `frame_number`, evicting the frame that previously used the slot.
    pub fn insert(&mut self, frame_number: u64, boxes: Vec<MotionBox>) {
        let index = self.slot_index(frame_number);
        self.slots[index] = Some(HistoryEntry {
            frame_number,
            boxes,
        });
    }

    /// The boxes recorded for `frame_number`, if that frame is still held.
    pub fn get(&self, frame_number: u64) -> Option<&[MotionBox]> {
        match &self.slots[self.slot_index(frame_number)] {
            Some(entry) if entry.frame_number == frame_number => Some(&entry.boxes),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }
}
