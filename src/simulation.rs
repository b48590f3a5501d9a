// src/simulation.rs - Camera-free pose sources and detection recording
use crate::error::GameError;
use crate::pose::{Detection, Keypoint, Landmark};
use crate::pose_bridge::PoseSource;
use crate::video::Frame;
use anyhow::{Context, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};

/// Synthetic players swinging their arms in front of an imaginary camera.
///
/// Positions are computed in normalized image coordinates and scaled to
/// the arena, so the same motion works at any resolution.
pub struct SimulatedPlayers {
    count: usize,
    width: f32,
    height: f32,
    t: f32,
    step: f32,
    frame: u64,
    /// Every n-th frame reports nobody in view.
    blank_every: Option<u64>,
    /// Chance that a single arm goes untracked for a frame.
    arm_dropout: f32,
    rng: ChaCha8Rng,
}

impl SimulatedPlayers {
    pub fn new(count: usize, width: f32, height: f32, pose_fps: f32, seed: u64) -> Self {
        Self {
            count,
            width,
            height,
            t: 0.0,
            step: if pose_fps > 0.0 { 1.0 / pose_fps } else { 1.0 / 30.0 },
            frame: 0,
            blank_every: None,
            arm_dropout: 0.0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn with_blank_every(mut self, frames: u64) -> Self {
        self.blank_every = (frames > 0).then_some(frames);
        self
    }

    pub fn with_arm_dropout(mut self, probability: f32) -> Self {
        self.arm_dropout = probability.clamp(0.0, 1.0);
        self
    }

    /// Detections for the current time without advancing it.
    pub fn current(&mut self) -> Vec<Detection> {
        (0..self.count).map(|i| self.player(i)).collect()
    }

    fn player(&mut self, index: usize) -> Detection {
        let t = self.t;
        let phase = index as f32 * 1.5;
        let cx = (index + 1) as f32 / (self.count + 1) as f32;
        let (w, h) = (self.width, self.height);
        let at = |x: f32, y: f32| (x * w, y * h);

        let (nx, ny) = at(cx, 0.35);
        let mut detection = Detection::empty()
            .with(Landmark::Nose, nx, ny - 0.08 * h, 0.95)
            .with(Landmark::Neck, nx, ny, 0.95);

        // Right arm on the image left, as the camera sees it.
        let arms = [
            (
                -1.0,
                Landmark::RightShoulder,
                Landmark::RightElbow,
                Landmark::RightWrist,
            ),
            (
                1.0,
                Landmark::LeftShoulder,
                Landmark::LeftElbow,
                Landmark::LeftWrist,
            ),
        ];

        for (dir, shoulder, elbow, wrist) in arms {
            let (sx, sy) = at(cx + dir * 0.05, 0.38);
            detection.set(shoulder, Keypoint::new(sx, sy, 0.95));

            if self.arm_dropout > 0.0 && self.rng.gen::<f32>() < self.arm_dropout {
                continue;
            }

            let swing = t + phase + if dir > 0.0 { 1.5 } else { 0.0 };
            let (ex, ey) = at(cx + dir * 0.08, 0.5 + 0.05 * swing.sin());
            let (wx, wy) = at(
                cx + dir * (0.1 + 0.06 * (swing * 0.5).cos()),
                0.6 + 0.12 * swing.sin(),
            );
            detection.set(elbow, Keypoint::new(ex, ey, 0.9));
            detection.set(wrist, Keypoint::new(wx, wy, 0.85));
        }

        detection
    }
}

impl PoseSource for SimulatedPlayers {
    fn estimate(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.frame += 1;
        self.t += self.step;

        if let Some(every) = self.blank_every {
            if self.frame % every == 0 {
                debug!(frame = self.frame, "Simulated players out of view");
                return Ok(Vec::new());
            }
        }
        Ok(self.current())
    }
}

/// Detection sets read back from a JSON-lines file, one set per line.
pub struct ReplayPoses {
    sets: Vec<Vec<Detection>>,
    cursor: usize,
    looping: bool,
}

impl ReplayPoses {
    pub fn open(path: impl AsRef<Path>, looping: bool) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Cannot open replay {}", path.display()))?;
        let sets = Self::parse(BufReader::new(file))?;
        info!(sets = sets.len(), path = %path.display(), "Replay loaded");
        Ok(Self {
            sets,
            cursor: 0,
            looping,
        })
    }

    /// Blank lines are skipped; line numbers in errors are 1-based.
    pub fn parse<R: BufRead>(reader: R) -> Result<Vec<Vec<Detection>>> {
        let mut sets = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let set = serde_json::from_str(&line).map_err(|source| GameError::ReplayParse {
                line: index + 1,
                source,
            })?;
            sets.push(set);
        }
        Ok(sets)
    }

    pub fn from_sets(sets: Vec<Vec<Detection>>, looping: bool) -> Self {
        Self {
            sets,
            cursor: 0,
            looping,
        }
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

impl PoseSource for ReplayPoses {
    fn estimate(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        if self.cursor >= self.sets.len() && self.looping && !self.sets.is_empty() {
            self.cursor = 0;
        }
        let set = self
            .sets
            .get(self.cursor)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Replay exhausted after {} sets", self.sets.len()))?;
        self.cursor += 1;
        Ok(set)
    }
}

/// Writes detection sets in the format [`ReplayPoses`] reads.
pub struct DetectionRecorder<W: Write> {
    writer: W,
    written: usize,
}

impl DetectionRecorder<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)
            .with_context(|| format!("Cannot create recording {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> DetectionRecorder<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn record(&mut self, detections: &[Detection]) -> Result<()> {
        serde_json::to_writer(&mut self.writer, detections)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Wraps a pose source and records everything it produces.
pub struct Recording<P, W: Write> {
    inner: P,
    recorder: DetectionRecorder<W>,
}

impl<P, W: Write> Recording<P, W> {
    pub fn new(inner: P, recorder: DetectionRecorder<W>) -> Self {
        Self { inner, recorder }
    }
}

impl<P: PoseSource, W: Write + Send> PoseSource for Recording<P, W> {
    fn estimate(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let detections = self.inner.estimate(frame)?;
        self.recorder.record(&detections)?;
        self.recorder.writer.flush()?;
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::{BlankFrameSource, FrameSource};

    fn frame() -> Frame {
        BlankFrameSource::new(4, 4).read().unwrap().unwrap()
    }

    #[test]
    fn simulated_players_are_spread_across_the_arena() {
        let mut sim = SimulatedPlayers::new(2, 640.0, 480.0, 30.0, 1);
        let detections = sim.estimate(&frame()).unwrap();
        assert_eq!(detections.len(), 2);

        let left = detections[0].keypoint(Landmark::Neck);
        let right = detections[1].keypoint(Landmark::Neck);
        assert!(left.is_observed() && right.is_observed());
        assert!(right.x - left.x > 100.0);
        for detection in &detections {
            assert!(detection.keypoint(Landmark::RightWrist).is_observed());
            assert!(detection.keypoint(Landmark::LeftElbow).is_observed());
        }
    }

    #[test]
    fn arms_move_between_frames() {
        let mut sim = SimulatedPlayers::new(1, 640.0, 480.0, 10.0, 1);
        let a = sim.estimate(&frame()).unwrap()[0].keypoint(Landmark::LeftWrist);
        let b = sim.estimate(&frame()).unwrap()[0].keypoint(Landmark::LeftWrist);
        assert!((a.position() - b.position()).norm() > 0.1);
    }

    #[test]
    fn blank_frames_and_dropout() {
        let mut sim = SimulatedPlayers::new(1, 640.0, 480.0, 30.0, 1).with_blank_every(3);
        assert_eq!(sim.estimate(&frame()).unwrap().len(), 1);
        assert_eq!(sim.estimate(&frame()).unwrap().len(), 1);
        assert!(sim.estimate(&frame()).unwrap().is_empty());

        let mut sim = SimulatedPlayers::new(1, 640.0, 480.0, 30.0, 1).with_arm_dropout(1.0);
        let detection = &sim.estimate(&frame()).unwrap()[0];
        assert!(detection.keypoint(Landmark::Neck).is_observed());
        assert!(!detection.keypoint(Landmark::RightWrist).is_observed());
        assert!(!detection.keypoint(Landmark::LeftWrist).is_observed());
    }

    #[test]
    fn recorded_sets_replay_in_order() {
        let sim = SimulatedPlayers::new(2, 640.0, 480.0, 30.0, 1).with_blank_every(2);
        let mut recording = Recording::new(sim, DetectionRecorder::new(Vec::new()));
        let produced: Vec<_> = (0..3)
            .map(|_| recording.estimate(&frame()).unwrap())
            .collect();
        let bytes = recording.recorder.finish().unwrap();

        let sets = ReplayPoses::parse(bytes.as_slice()).unwrap();
        assert_eq!(sets.len(), 3);
        assert!(sets[1].is_empty());

        let mut replay = ReplayPoses::from_sets(sets, false);
        for expected in &produced {
            let replayed = replay.estimate(&frame()).unwrap();
            assert_eq!(replayed.len(), expected.len());
            for (a, b) in replayed.iter().zip(expected) {
                let (a, b) = (a.keypoint(Landmark::LeftWrist), b.keypoint(Landmark::LeftWrist));
                assert!((a.position() - b.position()).norm() < 1e-3);
            }
        }
        assert!(replay.estimate(&frame()).is_err());
    }

    #[test]
    fn looping_replay_wraps_around() {
        let set = vec![Detection::empty().with(Landmark::Neck, 1.0, 2.0, 0.5)];
        let mut replay = ReplayPoses::from_sets(vec![set.clone(), Vec::new()], true);
        replay.estimate(&frame()).unwrap();
        replay.estimate(&frame()).unwrap();
        assert_eq!(replay.estimate(&frame()).unwrap(), set);
    }

    #[test]
    fn bad_replay_line_is_reported() {
        let text = "[]\n\nnot json\n";
        let err = ReplayPoses::parse(text.as_bytes()).unwrap_err();
        match err.downcast_ref::<GameError>() {
            Some(GameError::ReplayParse { line, .. }) => assert_eq!(*line, 3),
            other => panic!("unexpected {:?}", other),
        }
    }
}
