// THEORY:
// The `ProcessingChannel` moves the `MotionDetector` onto its own worker task
// and gives the playback side a strict one-frame-at-a-time handoff.
//
// Key architectural principles:
// 1.  **Single Owner**: The worker task owns the detector outright. The caller
//     never touches the comparison frame or the motion history, it only sends
//     messages.
// 2.  **At Most One In Flight**: Every submitted frame carries its own oneshot
//     reply. While that reply is outstanding, `submit` is rejected with `Busy`.
//     A result stays readable until the next submission replaces it.
// 3.  **Block, Don't Poll**: `is_busy` exists for callers that want to poll,
//     but `wait` simply awaits the reply.
// 4.  **Ordered Control**: Resets and shutdown travel through the same queue
//     as frames, so they always apply after the work submitted before them.

use crate::core_modules::frame::Frame;
use crate::error::{Result, VisionError};
use crate::pipeline::{DetectionResult, DetectorConfig, MotionDetector};
use log::{debug, warn};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{mpsc, oneshot};

type Reply = Result<DetectionResult>;

/// Message type for the detector worker
enum WorkerMessage {
    Process {
        frame: Frame,
        cooldown_active: bool,
        reply: oneshot::Sender<Reply>,
    },
    Reset(oneshot::Sender<()>),
    Shutdown,
}

/// Where the single submission slot currently stands.
enum Slot {
    Idle,
    InFlight {
        frame_number: u64,
        reply: oneshot::Receiver<Reply>,
    },
    Ready(DetectionResult),
    Failed(VisionError),
}

/// Caller side of the detector worker for one camera.
pub struct ProcessingChannel {
    sender: mpsc::Sender<WorkerMessage>,
    slot: Slot,
    worker: Option<tokio::task::JoinHandle<()>>,
}

impl ProcessingChannel {
    /// Starts a worker task owning a fresh detector. Must be called from within
    /// a tokio runtime.
    pub fn spawn(config: DetectorConfig) -> Result<Self> {
        let mut detector = MotionDetector::new(config)?;
        let (sender, mut receiver) = mpsc::channel::<WorkerMessage>(1);

        let worker = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                match message {
                    WorkerMessage::Process {
                        frame,
                        cooldown_active,
                        reply,
                    } => {
                        let outcome = detector.process(frame, cooldown_active);
                        let _ = reply.send(outcome);
                    }
                    WorkerMessage::Reset(done) => {
                        detector.reset();
                        let _ = done.send(());
                    }
                    WorkerMessage::Shutdown => break,
                }
            }
            debug!("Motion detector worker stopped");
        });

        Ok(Self {
            sender,
            slot: Slot::Idle,
            worker: Some(worker),
        })
    }

    /// Hands `frame` to the worker without waiting for it.
    pub fn submit(&mut self, frame: Frame, cooldown_active: bool) -> Result<()> {
        if self.is_busy() {
            return Err(VisionError::Busy);
        }

        let frame_number = frame.frame_number;
        let (reply, receiver) = oneshot::channel();
        self.sender
            .try_send(WorkerMessage::Process {
                frame,
                cooldown_active,
                reply,
            })
            .map_err(|err| match err {
                TrySendError::Full(_) => VisionError::Busy,
                TrySendError::Closed(_) => VisionError::WorkerClosed,
            })?;

        self.slot = Slot::InFlight {
            frame_number,
            reply: receiver,
        };
        Ok(())
    }

    /// True while a submitted frame has not been answered yet. Never blocks.
    pub fn is_busy(&mut self) -> bool {
        if let Slot::InFlight { reply, frame_number } = &mut self.slot {
            let settled = match reply.try_recv() {
                Ok(outcome) => Self::settle(outcome),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Closed) => {
                    warn!("Worker dropped frame {} without answering", frame_number);
                    Slot::Failed(VisionError::WorkerClosed)
                }
            };
            self.slot = settled;
        }
        false
    }

    /// The latest finished result, stable until the next `submit`.
    pub fn result(&self) -> Option<&DetectionResult> {
        match &self.slot {
            Slot::Ready(result) => Some(result),
            _ => None,
        }
    }

    /// Moves the latest finished result out of the channel.
    pub fn take_result(&mut self) -> Option<DetectionResult> {
        match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::Ready(result) => Some(result),
            other => {
                self.slot = other;
                None
            }
        }
    }

    /// Waits for the in-flight frame, if any, and returns its result. A worker
    /// error is returned once and then cleared.
    pub async fn wait(&mut self) -> Result<&DetectionResult> {
        if let Slot::InFlight { .. } = self.slot {
            if let Slot::InFlight { reply, .. } = std::mem::replace(&mut self.slot, Slot::Idle) {
                self.slot = match reply.await {
                    Ok(outcome) => Self::settle(outcome),
                    Err(_) => Slot::Failed(VisionError::WorkerClosed),
                };
            }
        }

        if !matches!(self.slot, Slot::Ready(_)) {
            return match std::mem::replace(&mut self.slot, Slot::Idle) {
                Slot::Failed(err) => Err(err),
                _ => Err(VisionError::NotSubmitted),
            };
        }
        self.result().ok_or(VisionError::NotSubmitted)
    }

    /// Submits `frame`, waits for it and takes the result.
    pub async fn process(&mut self, frame: Frame, cooldown_active: bool) -> Result<DetectionResult> {
        self.submit(frame, cooldown_active)?;
        self.wait().await?;
        self.take_result().ok_or(VisionError::NotSubmitted)
    }

    /// Clears the detector's comparison frame and history once queued work is done.
    pub async fn reset(&mut self) -> Result<()> {
        let (done, ack) = oneshot::channel();
        self.sender
            .send(WorkerMessage::Reset(done))
            .await
            .map_err(|_| VisionError::WorkerClosed)?;
        ack.await.map_err(|_| VisionError::WorkerClosed)
    }

    /// Stops the worker after any queued work and waits for it to exit.
    pub async fn shutdown(mut self) {
        let _ = self.sender.send(WorkerMessage::Shutdown).await;
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }

    fn settle(outcome: Reply) -> Slot {
        match outcome {
            Ok(result) => Slot::Ready(result),
            Err(err) => Slot::Failed(err),
        }
    }
}

impl Drop for ProcessingChannel {
    fn drop(&mut self) {
        // Best effort shutdown on drop
        if self.worker.is_some() {
            let _ = self.sender.try_send(WorkerMessage::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::*;

    fn channel() -> ProcessingChannel {
        ProcessingChannel::spawn(DetectorConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn second_submission_is_rejected_while_in_flight() {
        let mut channel = channel();
        let frames = sequence(2, entering_from_left);
        channel.submit(frames[0].clone(), false).unwrap();
        assert!(channel.is_busy());
        assert!(matches!(channel.submit(frames[1].clone(), false), Err(VisionError::Busy)));

        let result = channel.wait().await.unwrap();
        assert_eq!(result.frame_number, 1);
        assert!(!channel.is_busy());
        channel.submit(frames[1].clone(), false).unwrap();
        assert_eq!(channel.wait().await.unwrap().frame_number, 2);
    }

    #[tokio::test]
    async fn polling_until_idle_exposes_a_stable_result() {
        let mut channel = channel();
        channel.submit(sequence(1, entering_from_left).remove(0), false).unwrap();
        while channel.is_busy() {
            tokio::task::yield_now().await;
        }
        assert_eq!(channel.result().map(|r| r.frame_number), Some(1));
        // Reading again does not consume it.
        assert_eq!(channel.result().map(|r| r.frame_number), Some(1));
        assert_eq!(channel.take_result().map(|r| r.frame_number), Some(1));
        assert!(channel.result().is_none());
    }

    #[tokio::test]
    async fn frames_are_processed_in_order_through_the_worker() {
        let mut channel = channel();
        let mut events = Vec::new();
        for frame in sequence(8, entering_from_left) {
            let result = channel.process(frame, false).await.unwrap();
            events.extend(result.event());
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].frame_number, 8);
        assert!(events[0].direction.is_resolved());
    }

    #[tokio::test]
    async fn worker_errors_are_returned_once() {
        let mut channel = channel();
        channel.process(Frame::new(1, 0, scene(None)), false).await.unwrap();
        let err = channel
            .process(Frame::new(2, 0, image::GrayImage::new(8, 8)), false)
            .await
            .unwrap_err();
        assert!(matches!(err, VisionError::DimensionMismatch { .. }));
        assert!(matches!(channel.wait().await, Err(VisionError::NotSubmitted)));
        assert!(channel.process(Frame::new(3, 0, scene(None)), false).await.is_ok());
    }

    #[tokio::test]
    async fn reset_applies_after_queued_work() {
        let mut channel = channel();
        channel.process(Frame::new(1, 0, scene(None)), false).await.unwrap();
        channel.reset().await.unwrap();
        // Without a baseline the moved subject is not seen as motion.
        let result = channel
            .process(Frame::new(2, 0, scene(Some((150, 100, 20)))), false)
            .await
            .unwrap();
        assert!(result.boxes.is_empty());
    }

    #[tokio::test]
    async fn wait_without_submission_is_an_error() {
        let mut channel = channel();
        assert!(matches!(channel.wait().await, Err(VisionError::NotSubmitted)));
        channel.shutdown().await;
    }

    #[tokio::test]
    async fn invalid_config_does_not_start_a_worker() {
        let config = DetectorConfig {
            lookback_budget: 32,
            ..DetectorConfig::default()
        };
        assert!(matches!(ProcessingChannel::spawn(config), Err(VisionError::Config(_))));
    }
}
