// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Failures at the edges of the game core: pose boundary, config and replay files.
///
/// Nothing inside the simulation itself returns these. Actuator, player and
/// goal operations are infallible by construction.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("detection has {found} keypoints, expected {expected}")]
    MalformedDetection { expected: usize, found: usize },

    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("replay line {line}: {source}")]
    ReplayParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
