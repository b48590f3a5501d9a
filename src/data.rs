// src/data.rs - Match log and session export
use crate::game::FrameReport;
use crate::goal::Side;
use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use directories::ProjectDirs;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize)]
struct FrameRecord {
    frame: u64,
    sim_time: f64,
    players: usize,
    actuators: usize,
    pose_applied: bool,
    created: usize,
    dropped: usize,
    goals: usize,
    reset: bool,
}

#[derive(Debug, Clone, Serialize)]
struct GoalRecord {
    frame: u64,
    sim_time: f64,
    credited: Side,
    left_score: u32,
    right_score: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchSummary {
    pub session: String,
    pub frames: usize,
    pub duration_secs: f64,
    pub pose_updates: usize,
    pub goals_left: usize,
    pub goals_right: usize,
    pub resets: usize,
    pub players_seen: usize,
    pub peak_players: usize,
    /// Share of frames with at least one tracked player.
    pub tracked_ratio: f64,
}

/// Everything worth keeping from one run.
pub struct MatchLog {
    output_dir: PathBuf,
    session_name: String,
    frames: Vec<FrameRecord>,
    goals: Vec<GoalRecord>,
    left: u32,
    right: u32,
}

/// `<data dir>/pose_logo_slap/sessions` for the current user, or `./sessions`.
pub fn default_output_dir() -> PathBuf {
    ProjectDirs::from("", "", "pose_logo_slap")
        .map(|dirs| dirs.data_dir().join("sessions"))
        .unwrap_or_else(|| PathBuf::from("sessions"))
}

impl MatchLog {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name
            .unwrap_or_else(|| format!("session_{}", Local::now().format("%Y%m%d_%H%M%S")));

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            frames: Vec::new(),
            goals: Vec::new(),
            left: 0,
            right: 0,
        }
    }

    pub fn record(&mut self, report: &FrameReport) {
        for &side in &report.goals {
            match side {
                Side::Left => self.left += 1,
                Side::Right => self.right += 1,
            }
            self.goals.push(GoalRecord {
                frame: report.frame,
                sim_time: report.sim_time,
                credited: side,
                left_score: self.left,
                right_score: self.right,
            });
        }
        // Scores restart with the game.
        if report.reset {
            self.left = 0;
            self.right = 0;
        }

        let (created, dropped) = report
            .reconcile
            .as_ref()
            .map_or((0, 0), |r| (r.created.len(), r.dropped.len()));

        self.frames.push(FrameRecord {
            frame: report.frame,
            sim_time: report.sim_time,
            players: report.players,
            actuators: report.actuators,
            pose_applied: report.reconcile.is_some(),
            created,
            dropped,
            goals: report.goals.len(),
            reset: report.reset,
        });
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn summary(&self) -> MatchSummary {
        let total = self.frames.len();
        let tracked = self.frames.iter().filter(|f| f.players > 0).count();
        let count = |side: Side| self.goals.iter().filter(|g| g.credited == side).count();

        MatchSummary {
            session: self.session_name.clone(),
            frames: total,
            duration_secs: self.frames.last().map_or(0.0, |f| f.sim_time),
            pose_updates: self.frames.iter().filter(|f| f.pose_applied).count(),
            goals_left: count(Side::Left),
            goals_right: count(Side::Right),
            resets: self.frames.iter().filter(|f| f.reset).count(),
            players_seen: self.frames.iter().map(|f| f.created).sum(),
            peak_players: self.frames.iter().map(|f| f.players).max().unwrap_or(0),
            tracked_ratio: if total == 0 {
                0.0
            } else {
                tracked as f64 / total as f64
            },
        }
    }

    /// Writes `frames.csv`, `goals.csv` and `summary.json` into the session directory.
    pub fn export(&self) -> Result<PathBuf> {
        let dir = self.session_dir();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create session directory {}", dir.display()))?;

        write_csv(&dir.join("frames.csv"), &self.frames)?;
        write_csv(&dir.join("goals.csv"), &self.goals)?;

        let summary = self.summary();
        let file = File::create(dir.join("summary.json"))?;
        serde_json::to_writer_pretty(file, &summary)?;

        info!(
            dir = %dir.display(),
            frames = summary.frames,
            left = summary.goals_left,
            right = summary.goals_right,
            "Session exported"
        );
        Ok(dir)
    }
}

fn write_csv<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
    let mut writer = Writer::from_writer(file);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
