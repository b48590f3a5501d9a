// src/lib.rs
pub mod actuator;
pub mod config;
pub mod data;
pub mod error;
pub mod game;
pub mod goal;
pub mod logo;
pub mod physics;
pub mod player;
pub mod pose;
pub mod pose_bridge;
pub mod simulation;
pub mod tracking;
pub mod video;

pub use config::GameConfig;
pub use error::GameError;
pub use game::{FrameReport, GameSnapshot, GameState};
pub use goal::Side;
pub use pose::{Detection, Keypoint, Landmark};
