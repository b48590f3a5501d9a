// src/config.rs
use crate::error::GameError;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top level game configuration. Every section falls back to its defaults,
/// so a config file only needs to name the values it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub arena: ArenaConfig,
    pub physics: PhysicsConfig,
    pub push_body: PushBodyConfig,
    pub logo: LogoConfig,
    pub goal: GoalConfig,
    pub tracking: TrackingConfig,
    pub seed: u64,
}

/// Arena size in screen pixels. y grows downward.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub width: f32,
    pub height: f32,
    pub wall_thickness: f32,
    pub wall_elasticity: f32,
    pub wall_friction: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub dt: f32,
    pub steps_per_frame: u32,
    pub gravity: [f32; 2],
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub pixels_per_meter: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushBodyConfig {
    pub radius: f32,
    pub elasticity: f32,
    pub friction: f32,
    /// Post-smoothing speed clamp in px/s. `None` disables it.
    pub max_speed: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogoConfig {
    pub width: f32,
    pub height: f32,
    pub corner_radius: f32,
    pub mass: f32,
    pub elasticity: f32,
    pub friction: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalConfig {
    pub mouth_height: f32,
    pub thickness: f32,
    pub elasticity: f32,
    pub friction: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Neck-to-neck distance (px) under which a detection continues a player.
    pub match_threshold: f32,
    /// How far past the wrist the hand sits, as a fraction of the forearm.
    pub hand_extrapolation: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width: 640.0,
            height: 480.0,
            wall_thickness: 5.0,
            wall_elasticity: 0.9,
            wall_friction: 0.3,
        }
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            dt: 1.0 / 60.0,
            steps_per_frame: 1,
            gravity: [0.0, 60.0],   // slight pull toward the bottom of the screen
            linear_damping: 0.5,
            angular_damping: 0.5,
            pixels_per_meter: 100.0,
        }
    }
}

impl Default for PushBodyConfig {
    fn default() -> Self {
        Self {
            radius: 20.0,
            elasticity: 0.6,
            friction: 0.5,
            max_speed: Some(3000.0),
        }
    }
}

impl Default for LogoConfig {
    fn default() -> Self {
        Self {
            width: 80.0,
            height: 80.0,
            corner_radius: 2.0,
            mass: 1.0,
            elasticity: 0.8,
            friction: 0.4,
        }
    }
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            mouth_height: 200.0,
            thickness: 5.0,
            elasticity: 0.9,
            friction: 0.2,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            match_threshold: 100.0,
            hand_extrapolation: 0.25,
        }
    }
}

impl PhysicsConfig {
    pub fn gravity(&self) -> Vector2<f32> {
        Vector2::new(self.gravity[0], self.gravity[1])
    }

    /// Simulated time covered by one rendered frame.
    pub fn frame_dt(&self) -> f32 {
        self.dt * self.steps_per_frame as f32
    }
}

impl GameConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GameError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| GameError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: GameConfig =
            serde_json::from_str(&raw).map_err(|source| GameError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        fn positive(value: f32) -> bool {
            value.is_finite() && value > 0.0
        }

        if !positive(self.physics.dt) {
            return Err(GameError::InvalidConfig(
                "physics.dt must be positive and finite".into(),
            ));
        }
        if self.physics.steps_per_frame == 0 {
            return Err(GameError::InvalidConfig(
                "physics.steps_per_frame must be at least 1".into(),
            ));
        }
        if !positive(self.physics.pixels_per_meter) {
            return Err(GameError::InvalidConfig(
                "physics.pixels_per_meter must be positive and finite".into(),
            ));
        }
        if !(positive(self.arena.width) && positive(self.arena.height)) {
            return Err(GameError::InvalidConfig(
                "arena must have a positive, finite size".into(),
            ));
        }
        if self.goal.mouth_height >= self.arena.height {
            return Err(GameError::InvalidConfig(
                "goal.mouth_height must be smaller than the arena height".into(),
            ));
        }
        if !positive(self.tracking.match_threshold) {
            return Err(GameError::InvalidConfig(
                "tracking.match_threshold must be positive and finite".into(),
            ));
        }
        Ok(())
    }
}
