// THEORY:
// The `PlaybackDriver` is the consumer of the engine for one camera. It plays
// the role of the player's transport: it keeps the current frame number, moves
// it according to the active mode, pulls frames from a `FrameSource` and feeds
// them through the `ProcessingChannel`.
//
// It also owns the `Cooldown`. Before each processed frame the cooldown decays
// by one, the detector is told whether it is still active, and a reported
// `CrossingEvent` re-arms it. Any explicit user action (seek, step, pause,
// play, find) clears it, since the next crossing is then a new question.
//
// Two cameras of one gate record on their own frame counters but share a
// clock. `sync_sibling` moves the other camera's driver to the first frame
// captured at or after this one, and time labels of both cameras count from
// the later of their two start timestamps.
//
// Only forward playback runs detection. Playing backwards just moves the
// frame number, because the detector's baseline only makes sense in capture
// order.

use crate::core_modules::cooldown::Cooldown;
use crate::core_modules::frame::{Frame, FrameSource};
use crate::error::Result;
use crate::pipeline::{CrossingEvent, DetectionResult, DetectorConfig};
use crate::processing_channel::ProcessingChannel;
use log::{debug, info};

/// What the driver does on the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackMode {
    Paused,
    PlayingForward,
    PlayingBackward,
    /// Playing forward until the first reported crossing.
    Finding,
}

/// The outcome of a single playback tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub frame_number: u64,
    pub event: Option<CrossingEvent>,
}

pub struct PlaybackDriver<S: FrameSource> {
    source: S,
    channel: ProcessingChannel,
    cooldown: Cooldown,
    cooldown_frames: u32,
    current_frame: u64,
    mode: PlaybackMode,
    last_result: Option<DetectionResult>,
}

impl<S: FrameSource> PlaybackDriver<S> {
    /// Creates a paused driver positioned on frame 1. Must be called from within
    /// a tokio runtime.
    pub fn new(source: S, config: DetectorConfig) -> Result<Self> {
        let cooldown_frames = config.cooldown_frames;
        Ok(Self {
            source,
            channel: ProcessingChannel::spawn(config)?,
            cooldown: Cooldown::new(),
            cooldown_frames,
            current_frame: 1,
            mode: PlaybackMode::Paused,
            last_result: None,
        })
    }

    pub fn current_frame_number(&self) -> u64 {
        self.current_frame
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn cooldown(&self) -> Cooldown {
        self.cooldown
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// The most recent detection result, for display.
    pub fn last_result(&self) -> Option<&DetectionResult> {
        self.last_result.as_ref()
    }

    fn last_frame(&self) -> u64 {
        self.source.last_frame().unwrap_or(0).max(1)
    }

    /// Capture time of the current frame.
    pub fn current_timestamp(&self) -> Option<i64> {
        self.source.timestamp(self.current_frame)
    }

    /// Moves to the first frame captured at or after `timestamp`, clearing the
    /// cooldown. The playback mode is kept.
    pub fn sync_to(&mut self, timestamp: i64) -> Result<Option<Frame>> {
        let Some(frame_number) = self.source.frame_at_or_after(timestamp) else {
            return Ok(None);
        };
        debug!("Synced to frame {} for timestamp {}", frame_number, timestamp);
        self.cooldown.reset();
        self.current_frame = frame_number;
        self.source.frame(frame_number)
    }

    /// Moves `sibling` to the moment this driver is showing.
    pub fn sync_sibling<T: FrameSource>(&self, sibling: &mut PlaybackDriver<T>) -> Result<Option<Frame>> {
        match self.current_timestamp() {
            Some(timestamp) => sibling.sync_to(timestamp),
            None => Ok(None),
        }
    }

    /// Back to frame 1 with no detector history.
    pub async fn reset(&mut self) -> Result<()> {
        self.current_frame = 1;
        self.mode = PlaybackMode::Paused;
        self.cooldown.reset();
        self.last_result = None;
        self.channel.reset().await
    }

    /// Jumps to `frame_number` (clamped to the available range) and pauses.
    pub fn seek(&mut self, frame_number: u64) -> Result<Option<Frame>> {
        self.pause();
        self.current_frame = frame_number.clamp(1, self.last_frame());
        self.source.frame(self.current_frame)
    }

    pub fn step_forward(&mut self) -> Result<Option<Frame>> {
        self.pause();
        if self.current_frame < self.last_frame() {
            self.current_frame += 1;
        }
        self.source.frame(self.current_frame)
    }

    pub fn step_backward(&mut self) -> Result<Option<Frame>> {
        self.pause();
        if self.current_frame > 1 {
            self.current_frame -= 1;
        }
        self.source.frame(self.current_frame)
    }

    pub fn pause(&mut self) {
        self.cooldown.reset();
        self.mode = PlaybackMode::Paused;
    }

    pub fn play_forward(&mut self) {
        self.cooldown.reset();
        self.mode = PlaybackMode::PlayingForward;
    }

    pub fn play_backward(&mut self) {
        self.cooldown.reset();
        self.mode = PlaybackMode::PlayingBackward;
    }

    /// Advances one frame in the current mode. Returns `None` when paused or
    /// when the end of the stream stops playback.
    pub async fn tick(&mut self) -> Result<Option<Tick>> {
        let forward = match self.mode {
            PlaybackMode::Paused => return Ok(None),
            PlaybackMode::PlayingBackward => false,
            PlaybackMode::PlayingForward | PlaybackMode::Finding => true,
        };

        if (forward && self.current_frame >= self.last_frame()) || (!forward && self.current_frame <= 1) {
            debug!("Playback reached frame {} and stopped", self.current_frame);
            self.mode = PlaybackMode::Paused;
            return Ok(None);
        }
        if forward {
            self.current_frame += 1;
        } else {
            self.current_frame -= 1;
        }

        let frame_number = self.current_frame;
        let event = match self.source.frame(frame_number)? {
            Some(frame) if forward => self.detect(frame).await?,
            // Missing frames and backward playback are display-only.
            _ => None,
        };

        if event.is_some() && self.mode == PlaybackMode::Finding {
            self.mode = PlaybackMode::Paused;
        }
        Ok(Some(Tick { frame_number, event }))
    }

    /// Plays forward from the current frame until a crossing is reported or
    /// the stream ends.
    pub async fn find(&mut self) -> Result<Option<CrossingEvent>> {
        self.cooldown.reset();
        self.mode = PlaybackMode::Finding;
        while let Some(tick) = self.tick().await? {
            if tick.event.is_some() {
                return Ok(tick.event);
            }
        }
        Ok(None)
    }

    /// Moves to `frame_number` and runs detection on it, keeping the cooldown.
    pub async fn track_frame(&mut self, frame_number: u64) -> Result<Option<CrossingEvent>> {
        self.current_frame = frame_number;
        match self.source.frame(frame_number)? {
            Some(frame) => self.detect(frame).await,
            None => Ok(None),
        }
    }

    /// Tracks every frame in `first..=last` in order and collects the crossings.
    pub async fn scan(&mut self, first: u64, last: u64) -> Result<Vec<CrossingEvent>> {
        let mut events = Vec::new();
        for frame_number in first..=last {
            events.extend(self.track_frame(frame_number).await?);
        }
        Ok(events)
    }

    async fn detect(&mut self, frame: Frame) -> Result<Option<CrossingEvent>> {
        self.cooldown.decay();
        let result = self.channel.process(frame, self.cooldown.is_active()).await?;
        let event = result.event();
        if let Some(event) = &event {
            info!(
                "Crossing {:?} at frame {} ({} ms)",
                event.direction, event.frame_number, event.timestamp
            );
            self.cooldown.arm(event, self.cooldown_frames);
        }
        self.last_result = Some(result);
        Ok(event)
    }
}

/// Formats milliseconds as `MM:SS:mmm`; negative values show as zero.
pub fn format_elapsed(ms: i64) -> String {
    let ms = ms.max(0);
    let seconds = ms / 1000;
    format!("{:02}:{:02}:{:03}", seconds / 60, seconds % 60, ms % 1000)
}

/// `timestamp` relative to `start`, formatted for display.
pub fn time_label(timestamp: i64, start: i64) -> String {
    format_elapsed(timestamp - start)
}

/// The common start time of several cameras: the latest first-frame timestamp.
pub fn shared_start_timestamp<S: FrameSource>(sources: &[S]) -> i64 {
    sources
        .iter()
        .filter_map(|source| source.timestamp(1))
        .max()
        .unwrap_or(0)
}
