// src/pose_bridge.rs - Pose estimation off the frame loop, latest result wins
use crate::pose::Detection;
use crate::video::{Frame, FrameSource};
use anyhow::Result;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Turns a frame into zero or more detected people.
pub trait PoseSource: Send {
    fn estimate(&mut self, frame: &Frame) -> Result<Vec<Detection>>;
}

impl<T: PoseSource + ?Sized> PoseSource for Box<T> {
    fn estimate(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        (**self).estimate(frame)
    }
}

/// Sequence number of the set alongside the set itself.
type Slot = Option<(u64, Vec<Detection>)>;

/// Producer side of the handoff. Publishing overwrites anything unread.
#[derive(Debug)]
pub struct DetectionPublisher {
    tx: watch::Sender<Slot>,
}

/// Consumer side of the handoff, polled once per rendered frame.
#[derive(Debug)]
pub struct LatestDetections {
    rx: watch::Receiver<Slot>,
    seen: u64,
}

pub fn pose_channel() -> (DetectionPublisher, LatestDetections) {
    let (tx, rx) = watch::channel(None);
    (DetectionPublisher { tx }, LatestDetections { rx, seen: 0 })
}

impl DetectionPublisher {
    pub fn publish(&self, detections: Vec<Detection>) {
        self.tx.send_modify(|slot| {
            let seq = slot.as_ref().map_or(1, |(seq, _)| seq + 1);
            *slot = Some((seq, detections));
        });
    }

    /// True once the consumer has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl LatestDetections {
    /// Returns the newest unread detection set. Each set is handed out at most once.
    ///
    /// A set published just before the worker exits is still delivered.
    pub fn take_latest(&mut self) -> Option<Vec<Detection>> {
        let slot = self.rx.borrow_and_update();
        match slot.as_ref() {
            Some((seq, detections)) if *seq != self.seen => {
                self.seen = *seq;
                Some(detections.clone())
            }
            _ => None,
        }
    }

    /// False once the publisher is gone.
    pub fn is_live(&self) -> bool {
        self.rx.has_changed().is_ok()
    }
}

/// Runs capture and estimation on a dedicated thread.
pub struct PoseWorker {
    handle: JoinHandle<u64>,
}

impl PoseWorker {
    /// Starts the worker. It stops when the frame source runs dry or the
    /// [`LatestDetections`] side is dropped. `pose_fps` of zero means
    /// "as fast as estimation allows".
    pub fn spawn<F, P>(mut frames: F, mut pose: P, publisher: DetectionPublisher, pose_fps: f32) -> Self
    where
        F: FrameSource + 'static,
        P: PoseSource + 'static,
    {
        let period = (pose_fps > 0.0).then(|| Duration::from_secs_f32(1.0 / pose_fps));

        let handle = thread::spawn(move || {
            info!(pose_fps, "Pose worker started");
            let mut published = 0u64;

            while !publisher.is_closed() {
                let started = Instant::now();

                let frame = match frames.read() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        debug!("Frame source exhausted");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Frame capture failed");
                        break;
                    }
                };

                match pose.estimate(&frame) {
                    Ok(detections) => {
                        publisher.publish(detections);
                        published += 1;
                    }
                    Err(e) => warn!(error = %e, "Pose estimation failed, frame skipped"),
                }

                if let Some(period) = period {
                    if let Some(rest) = period.checked_sub(started.elapsed()) {
                        thread::sleep(rest);
                    }
                }
            }

            info!(published, "Pose worker stopped");
            published
        });

        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the thread and returns how many detection sets it published.
    pub fn join(self) -> Result<u64> {
        self.handle
            .join()
            .map_err(|_| anyhow::anyhow!("Pose worker panicked"))
    }
}
