// THEORY:
// A `Frame` is one grayscale image of a camera's recording together with its
// position in the sequence and its capture time. Frames are read, handed to
// the detector by value and never modified afterwards.
//
// Where frames come from is not the engine's business. Anything that can
// answer "give me frame N" implements `FrameSource`; a frame that does not
// exist is simply `None`, which the playback driver skips over rather than
// treating as a failure.

use crate::error::Result;
use image::GrayImage;
use std::collections::BTreeMap;

/// One grayscale video frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the camera's sequence, starting at 1.
    pub frame_number: u64,
    /// Capture time in milliseconds.
    pub timestamp: i64,
    pub image: GrayImage,
}

impl Frame {
    pub fn new(frame_number: u64, timestamp: i64, image: GrayImage) -> Self {
        Self {
            frame_number,
            timestamp,
            image,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Supplies frames by number.
pub trait FrameSource {
    /// Reads frame `frame_number`, or `None` when it is not available.
    fn frame(&self, frame_number: u64) -> Result<Option<Frame>>;

    /// The highest frame number this source can supply.
    fn last_frame(&self) -> Option<u64>;

    /// Capture time of `frame_number` in milliseconds, without decoding it.
    fn timestamp(&self, frame_number: u64) -> Option<i64>;

    /// The first frame captured at or after `timestamp`. Falls back to the last
    /// frame when every frame is older.
    fn frame_at_or_after(&self, timestamp: i64) -> Option<u64> {
        let last = self.last_frame()?;
        (1..=last)
            .find(|&n| self.timestamp(n).is_some_and(|t| t >= timestamp))
            .or(Some(last))
    }
}

/// A frame source backed by frames already held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryFrameSource {
    frames: BTreeMap<u64, Frame>,
}

impl MemoryFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numbers `images` from 1 upwards, spacing timestamps by `interval_ms`.
    pub fn from_images<I>(images: I, interval_ms: i64) -> Self
    where
        I: IntoIterator<Item = GrayImage>,
    {
        let frames = images
            .into_iter()
            .enumerate()
            .map(|(i, image)| {
                let frame_number = i as u64 + 1;
                (frame_number, Frame::new(frame_number, i as i64 * interval_ms, image))
            })
            .collect();
        Self { frames }
    }

    pub fn insert(&mut self, frame: Frame) {
        self.frames.insert(frame.frame_number, frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for MemoryFrameSource {
    fn frame(&self, frame_number: u64) -> Result<Option<Frame>> {
        Ok(self.frames.get(&frame_number).cloned())
    }

    fn last_frame(&self) -> Option<u64> {
        self.frames.keys().next_back().copied()
    }

    fn timestamp(&self, frame_number: u64) -> Option<i64> {
        self.frames.get(&frame_number).map(|frame| frame.timestamp)
    }
}
