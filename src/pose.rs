// src/pose.rs - Keypoint schema shared with the pose source boundary
use crate::error::GameError;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Number of keypoints per detection (BODY_25 layout).
pub const KEYPOINT_COUNT: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub const MISSING: Keypoint = Keypoint {
        x: 0.0,
        y: 0.0,
        confidence: 0.0,
    };

    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn is_observed(&self) -> bool {
        self.confidence > 0.0
    }

    pub fn position(&self) -> Vector2<f32> {
        Vector2::new(self.x, self.y)
    }
}

/// The landmarks the game reads. Discriminants are BODY_25 indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Landmark {
    Nose = 0,
    Neck = 1,
    RightShoulder = 2,
    RightElbow = 3,
    RightWrist = 4,
    LeftShoulder = 5,
    LeftElbow = 6,
    LeftWrist = 7,
}

impl Landmark {
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One person in one processed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<[f32; 3]>", into = "Vec<[f32; 3]>")]
pub struct Detection {
    keypoints: [Keypoint; KEYPOINT_COUNT],
}

impl Detection {
    /// A detection where nothing is observed.
    pub fn empty() -> Self {
        Self {
            keypoints: [Keypoint::MISSING; KEYPOINT_COUNT],
        }
    }

    /// Builds a detection from `[x, y, confidence]` rows as pose engines emit them.
    pub fn from_rows(rows: &[[f32; 3]]) -> Result<Self, GameError> {
        if rows.len() != KEYPOINT_COUNT {
            return Err(GameError::MalformedDetection {
                expected: KEYPOINT_COUNT,
                found: rows.len(),
            });
        }
        let mut detection = Self::empty();
        for (slot, row) in detection.keypoints.iter_mut().zip(rows) {
            *slot = Keypoint::new(row[0], row[1], row[2]);
        }
        Ok(detection)
    }

    pub fn keypoint(&self, landmark: Landmark) -> Keypoint {
        self.keypoints[landmark.index()]
    }

    pub fn set(&mut self, landmark: Landmark, keypoint: Keypoint) {
        self.keypoints[landmark.index()] = keypoint;
    }

    /// Builder form of [`Detection::set`], handy for scripted poses.
    pub fn with(mut self, landmark: Landmark, x: f32, y: f32, confidence: f32) -> Self {
        self.set(landmark, Keypoint::new(x, y, confidence));
        self
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    pub fn rows(&self) -> Vec<[f32; 3]> {
        self.keypoints
            .iter()
            .map(|k| [k.x, k.y, k.confidence])
            .collect()
    }
}

impl TryFrom<Vec<[f32; 3]>> for Detection {
    type Error = GameError;

    fn try_from(rows: Vec<[f32; 3]>) -> Result<Self, Self::Error> {
        Detection::from_rows(&rows)
    }
}

impl From<Detection> for Vec<[f32; 3]> {
    fn from(detection: Detection) -> Self {
        detection.rows()
    }
}
