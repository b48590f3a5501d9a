// src/main.rs
use anyhow::{Context, Result};
use clap::Parser;
use pose_logo_slap::data::{default_output_dir, MatchLog};
use pose_logo_slap::pose_bridge::{pose_channel, PoseSource, PoseWorker};
use pose_logo_slap::simulation::{DetectionRecorder, Recording, ReplayPoses, SimulatedPlayers};
use pose_logo_slap::video::{BlankFrameSource, FrameSource, ImageSequence};
use pose_logo_slap::{GameConfig, GameState, Side};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Headless driver: runs the game against simulated or replayed players
/// and exports the match when it ends.
#[derive(Debug, Parser)]
#[command(name = "pose_logo_slap", version, about)]
struct Cli {
    /// JSON config file; missing keys keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    width: Option<f32>,

    #[arg(long)]
    height: Option<f32>,

    /// Rendered frames per second
    #[arg(long, value_parser = positive_rate)]
    fps: Option<f32>,

    /// Rate of the pose worker
    #[arg(long, default_value_t = 15.0)]
    pose_fps: f32,

    #[arg(long)]
    seed: Option<u64>,

    /// Number of simulated players
    #[arg(long, default_value_t = 2)]
    players: usize,

    /// Every n-th simulated pose frame is empty, which resets the game
    #[arg(long)]
    blank_every: Option<u64>,

    /// Chance per frame that a simulated arm is not tracked
    #[arg(long, default_value_t = 0.0)]
    arm_dropout: f32,

    /// Replay detection sets from a JSON-lines file instead of simulating
    #[arg(long)]
    replay: Option<PathBuf>,

    #[arg(long)]
    loop_replay: bool,

    /// Directory of PNG frames to feed the pose source
    #[arg(long)]
    frames_dir: Option<PathBuf>,

    /// Record every detection set to a JSON-lines file
    #[arg(long)]
    record: Option<PathBuf>,

    /// Stop after this many rendered frames
    #[arg(long)]
    frames: Option<u64>,

    /// Where session exports go
    #[arg(long)]
    output: Option<PathBuf>,

    /// Start with the debug overlay on and log snapshots
    #[arg(long)]
    debug: bool,
}

fn positive_rate(raw: &str) -> Result<f32, String> {
    let rate: f32 = raw.parse().map_err(|e| format!("{e}"))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(format!("{raw} is not a positive rate"))
    }
}

impl Cli {
    fn game_config(&self) -> Result<GameConfig> {
        let mut config = match &self.config {
            Some(path) => GameConfig::load(path)?,
            None => GameConfig::default(),
        };
        if let Some(width) = self.width {
            config.arena.width = width;
        }
        if let Some(height) = self.height {
            config.arena.height = height;
        }
        if let Some(fps) = self.fps {
            config.physics.dt = 1.0 / (fps * config.physics.steps_per_frame as f32);
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cli.game_config()?;
    let (width, height) = (config.arena.width, config.arena.height);

    let (pose, replay_len): (Box<dyn PoseSource>, Option<usize>) = match &cli.replay {
        Some(path) => {
            let replay = ReplayPoses::open(path, cli.loop_replay)?;
            let len = (!cli.loop_replay).then(|| replay.len());
            (Box::new(replay) as Box<dyn PoseSource>, len)
        }
        None => {
            let mut sim =
                SimulatedPlayers::new(cli.players, width, height, cli.pose_fps, config.seed)
                    .with_arm_dropout(cli.arm_dropout);
            if let Some(every) = cli.blank_every {
                sim = sim.with_blank_every(every);
            }
            (Box::new(sim) as Box<dyn PoseSource>, None)
        }
    };

    let pose: Box<dyn PoseSource> = match &cli.record {
        Some(path) => Box::new(Recording::new(pose, DetectionRecorder::create(path)?)),
        None => pose,
    };

    let frames: Box<dyn FrameSource> = match (&cli.frames_dir, replay_len) {
        (Some(dir), _) => Box::new(ImageSequence::open(dir, true)?),
        (None, Some(len)) => Box::new(BlankFrameSource::limited(width as u32, height as u32, len)),
        (None, None) => Box::new(BlankFrameSource::new(width as u32, height as u32)),
    };

    let (publisher, mut latest) = pose_channel();
    let worker = PoseWorker::spawn(frames, pose, publisher, cli.pose_fps);

    let frame_dt = config.physics.frame_dt();
    let mut game = GameState::new(config);
    if cli.debug {
        game.toggle_debug();
    }
    let mut log = MatchLog::new(cli.output.clone().unwrap_or_else(default_output_dir), None);

    let mut interval = tokio::time::interval(Duration::from_secs_f32(frame_dt));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let snapshot_every = ((1.0 / frame_dt).round() as u64).max(1);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(frame_dt, pose_fps = cli.pose_fps, "Frame loop started");
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }

        // Sampled before taking so the last published set is never skipped.
        let source_done = worker.is_finished();
        let report = game.advance(latest.take_latest());
        for side in &report.goals {
            info!(
                ?side,
                left = game.score(Side::Left),
                right = game.score(Side::Right),
                "Score"
            );
        }
        log.record(&report);

        if game.debug_enabled() && report.frame % snapshot_every == 0 {
            let snapshot = serde_json::to_string(&game.snapshot())?;
            debug!(%snapshot, "Frame snapshot");
        }

        if cli.frames.map_or(false, |limit| report.frame + 1 >= limit) {
            info!(frames = report.frame + 1, "Frame limit reached");
            break;
        }
        if source_done {
            info!("Pose source finished");
            break;
        }
    }

    drop(latest);
    match tokio::task::spawn_blocking(move || worker.join()).await? {
        Ok(published) => debug!(published, "Pose worker joined"),
        Err(e) => warn!(error = %e, "Pose worker did not shut down cleanly"),
    }

    info!(
        left = game.score(Side::Left),
        right = game.score(Side::Right),
        frames = game.frame(),
        "Match over"
    );

    let dir = log.export().context("Failed to export session")?;
    info!(dir = %dir.display(), "Session saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_must_be_positive() {
        for bad in ["0", "-30", "inf", "NaN"] {
            assert!(
                Cli::try_parse_from(["pose_logo_slap", "--fps", bad]).is_err(),
                "accepted --fps {bad}"
            );
        }
    }

    #[test]
    fn fps_sets_the_physics_step() {
        let cli = Cli::try_parse_from(["pose_logo_slap", "--fps", "30"]).unwrap();
        let config = cli.game_config().unwrap();
        assert!((config.physics.frame_dt() - 1.0 / 30.0).abs() < 1e-6);
    }

    #[test]
    fn bad_arena_size_is_rejected() {
        let cli = Cli::try_parse_from(["pose_logo_slap", "--width", "0"]).unwrap();
        assert!(cli.game_config().is_err());
    }
}
