// THEORY:
// This file is the main entry point for the `gate_vision` library crate.
// It defines the public API that external consumers (like the `gate_tester`
// binary or a player UI) build on.
//
// The layers, from the inside out:
// - `pipeline::MotionDetector` is the synchronous per-frame engine.
// - `processing_channel::ProcessingChannel` runs one detector on its own
//   worker task with at most one frame in flight.
// - `playback::PlaybackDriver` moves through a `FrameSource`, feeds the
//   channel and owns the crossing cooldown.
//
// The algorithms themselves (`core_modules`) stay available for callers that
// want to inspect boxes or history directly.

pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod playback;
pub mod processing_channel;

pub use core_modules::frame::{Frame, FrameSource, MemoryFrameSource};
pub use core_modules::frame_directory::DirectoryFrameSource;
pub use error::{Result, VisionError};
pub use pipeline::{CrossingEvent, DetectionResult, DetectorConfig, Direction, MotionBox, MotionDetector};
pub use playback::{PlaybackDriver, PlaybackMode, format_elapsed, shared_start_timestamp, time_label};
pub use processing_channel::ProcessingChannel;
