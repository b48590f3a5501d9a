// src/game.rs - Frame loop state: physics, players, scoring and the logo
use crate::actuator::PushBody;
use crate::config::GameConfig;
use crate::goal::{Scoreboard, Side};
use crate::logo::{Logo, LogoTransform};
use crate::physics::{BodyHandle, ColliderKind, Material, PhysicsWorld};
use crate::player::Hand;
use crate::pose::Detection;
use crate::tracking::{PlayerTracker, ReconcileOutcome};
use nalgebra::Vector2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{debug, info};

/// Everything the game mutates, owned by whoever drives the frame loop.
pub struct GameState {
    config: GameConfig,
    world: PhysicsWorld,
    tracker: PlayerTracker,
    scoreboard: Scoreboard,
    logo: Logo,
    walls: Vec<BodyHandle>,
    mouse: Option<PushBody>,
    debug: bool,
    rng: ChaCha8Rng,
    frame: u64,
    sim_time: f64,
    last_pose_time: Option<f64>,
}

/// What happened during one call to [`GameState::advance`].
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub frame: u64,
    pub sim_time: f64,
    /// Sides credited with a goal this frame, in event order.
    pub goals: Vec<Side>,
    /// Present when a detection set was applied this frame.
    pub reconcile: Option<ReconcileOutcome>,
    pub reset: bool,
    pub players: usize,
    pub actuators: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GoalLine {
    pub side: Side,
    pub start: [f32; 2],
    pub end: [f32; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreView {
    pub side: Side,
    pub score: u32,
    pub anchor: [f32; 2],
}

/// Read-only view handed to the renderer each frame.
#[derive(Debug, Clone, Serialize)]
pub struct GameSnapshot {
    pub frame: u64,
    pub logo: Option<LogoTransform>,
    pub goals: Vec<GoalLine>,
    pub scores: Vec<ScoreView>,
    pub hands: Vec<[f32; 2]>,
    pub mouse: Option<[f32; 2]>,
    pub players: usize,
    pub debug: bool,
}

impl GameState {
    /// Builds the arena, goals and first logo.
    ///
    /// `config` must pass [`GameConfig::validate`]; a non-positive or
    /// non-finite arena size or timestep is a programming error here.
    pub fn new(config: GameConfig) -> Self {
        debug_assert!(config.validate().is_ok(), "GameState built from an invalid config");
        let mut world = PhysicsWorld::new(&config.physics);
        let walls = build_walls(&mut world, &config);
        let scoreboard = Scoreboard::build(&mut world, &config.arena, &config.goal);

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let spawn = Logo::spawn_point(&config.arena, &mut rng);
        let logo = Logo::spawn(&mut world, spawn, &config.logo);

        let tracker = PlayerTracker::new(config.tracking.clone(), config.push_body.clone());

        info!(
            width = config.arena.width,
            height = config.arena.height,
            seed = config.seed,
            "Game initialized"
        );

        Self {
            config,
            world,
            tracker,
            scoreboard,
            logo,
            walls,
            mouse: None,
            debug: false,
            rng,
            frame: 0,
            sim_time: 0.0,
            last_pose_time: None,
        }
    }

    /// Runs one rendered frame.
    ///
    /// Physics always advances first. `detections` is `None` when the pose
    /// source produced nothing new this tick, in which case players and their
    /// actuators are simply held.
    pub fn advance(&mut self, detections: Option<Vec<Detection>>) -> FrameReport {
        let dt = self.config.physics.dt;
        for _ in 0..self.config.physics.steps_per_frame {
            self.world.step(dt);
            self.sim_time += dt as f64;
        }

        // Pushers only move when a pose or the mouse moves them.
        self.tracker.hold_actuators(&mut self.world);
        if let Some(mouse) = &self.mouse {
            mouse.hold(&mut self.world);
        }

        let mut report = FrameReport {
            frame: self.frame,
            ..FrameReport::default()
        };

        for event in self.world.drain_separations() {
            if let Some(side) = self.scoreboard.apply(&event) {
                report.goals.push(side);
            }
        }

        if let Some(detections) = detections {
            let pose_dt = self.pose_dt();
            let outcome = self.tracker.reconcile(&mut self.world, detections, pose_dt);
            self.last_pose_time = Some(self.sim_time);

            if outcome.reset_requested {
                info!("Nobody in frame, resetting");
                self.reset();
                report.reset = true;
            }
            report.reconcile = Some(outcome);
        }

        self.frame += 1;
        report.sim_time = self.sim_time;
        report.players = self.tracker.len();
        report.actuators = self.tracker.actuator_count();
        report
    }

    /// Time since the last applied detection set, never less than one frame.
    fn pose_dt(&self) -> f32 {
        let frame_dt = self.config.physics.frame_dt();
        match self.last_pose_time {
            Some(last) => ((self.sim_time - last) as f32).max(frame_dt),
            None => frame_dt,
        }
    }

    /// Zeroes both scores, drops every player and puts a new logo in play.
    pub fn reset(&mut self) {
        self.tracker.clear(&mut self.world);
        self.scoreboard.reset();
        self.logo.respawn(
            &mut self.world,
            &self.config.arena,
            &self.config.logo,
            &mut self.rng,
        );
        self.last_pose_time = None;
        info!(frame = self.frame, "Game reset");
    }

    pub fn toggle_debug(&mut self) -> bool {
        self.debug = !self.debug;
        debug!(enabled = self.debug, "Debug overlay toggled");
        self.debug
    }

    /// Moves the mouse pusher, creating it on first use. `None` removes it.
    pub fn set_mouse_actuator(&mut self, position: Option<Vector2<f32>>) {
        match (position, self.mouse.as_mut()) {
            (Some(position), Some(mouse)) => {
                mouse.move_to(&mut self.world, position, self.config.physics.frame_dt());
            }
            (Some(position), None) => {
                self.mouse = Some(PushBody::spawn(
                    &mut self.world,
                    position,
                    ColliderKind::MousePusher,
                    &self.config.push_body,
                ));
            }
            (None, _) => {
                if let Some(mouse) = self.mouse.take() {
                    mouse.remove(&mut self.world);
                }
            }
        }
    }

    pub fn snapshot(&self) -> GameSnapshot {
        let goals = self
            .scoreboard
            .posts()
            .iter()
            .map(|post| GoalLine {
                side: post.side,
                start: [post.start.x, post.start.y],
                end: [post.end.x, post.end.y],
            })
            .collect();

        let scores = [Side::Left, Side::Right]
            .into_iter()
            .map(|side| {
                let counter = self.scoreboard.counter(side);
                ScoreView {
                    side,
                    score: counter.score(),
                    anchor: counter.anchor,
                }
            })
            .collect();

        let hands = self
            .tracker
            .players()
            .flat_map(|(_, player)| Hand::BOTH.into_iter().filter_map(move |hand| player.actuator(hand)))
            .filter_map(|pusher| pusher.position(&self.world))
            .map(|p| [p.x, p.y])
            .collect();

        GameSnapshot {
            frame: self.frame,
            logo: self.logo.transform(&self.world),
            goals,
            scores,
            hands,
            mouse: self
                .mouse
                .as_ref()
                .and_then(|mouse| mouse.position(&self.world))
                .map(|p| [p.x, p.y]),
            players: self.tracker.len(),
            debug: self.debug,
        }
    }

    pub fn score(&self, side: Side) -> u32 {
        self.scoreboard.score(side)
    }

    pub fn tracker(&self) -> &PlayerTracker {
        &self.tracker
    }

    pub fn logo(&self) -> &Logo {
        &self.logo
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    /// Direct world access for scripted scenarios and debug tooling.
    pub fn world_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.world
    }

    pub fn wall_count(&self) -> usize {
        self.walls.len()
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }
}

/// Top and bottom walls, plus the side walls above and below each goal mouth.
fn build_walls(world: &mut PhysicsWorld, config: &GameConfig) -> Vec<BodyHandle> {
    let arena = &config.arena;
    let (w, h) = (arena.width, arena.height);
    let mouth_top = (h - config.goal.mouth_height) / 2.0;
    let mouth_bottom = mouth_top + config.goal.mouth_height;
    let material = Material {
        elasticity: arena.wall_elasticity,
        friction: arena.wall_friction,
    };

    let segments = [
        ((0.0, 0.0), (w, 0.0)),
        ((0.0, h), (w, h)),
        ((0.0, 0.0), (0.0, mouth_top)),
        ((0.0, mouth_bottom), (0.0, h)),
        ((w, 0.0), (w, mouth_top)),
        ((w, mouth_bottom), (w, h)),
    ];

    segments
        .iter()
        .map(|&((ax, ay), (bx, by))| {
            world.insert_static_segment(
                Vector2::new(ax, ay),
                Vector2::new(bx, by),
                arena.wall_thickness,
                material,
                ColliderKind::Boundary,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::ColliderTag;
    use crate::pose::Landmark;

    fn game() -> GameState {
        GameState::new(GameConfig::default())
    }

    fn player_at(x: f32) -> Detection {
        Detection::empty()
            .with(Landmark::Neck, x, 100.0, 0.9)
            .with(Landmark::RightElbow, x - 40.0, 200.0, 0.8)
            .with(Landmark::RightWrist, x - 60.0, 260.0, 0.8)
    }

    #[test]
    fn new_game_has_walls_goals_and_one_logo() {
        let game = game();
        assert_eq!(game.wall_count(), 6);
        assert_eq!(game.world().count_kind(ColliderTag::Boundary), 6);
        assert_eq!(game.world().count_kind(ColliderTag::Goal), 2);
        assert_eq!(game.world().count_kind(ColliderTag::Logo), 1);
    }

    #[test]
    fn missing_pose_data_holds_players() {
        let mut game = game();
        game.advance(Some(vec![player_at(200.0)]));
        for _ in 0..10 {
            let report = game.advance(None);
            assert!(report.reconcile.is_none());
            assert_eq!(report.players, 1);
            assert_eq!(report.actuators, 1);
        }
    }

    #[test]
    fn hands_stay_put_without_pose_data() {
        let mut game = game();
        game.advance(Some(vec![player_at(200.0)]));
        game.advance(Some(vec![player_at(230.0)]));
        let tracked = game.snapshot().hands;
        assert_eq!(tracked.len(), 1);
        assert!((tracked[0][0] - 165.0).abs() < 1e-3);

        for _ in 0..120 {
            game.advance(None);
            let hands = game.snapshot().hands;
            assert!(
                (hands[0][0] - tracked[0][0]).abs() < 1e-3
                    && (hands[0][1] - tracked[0][1]).abs() < 1e-3,
                "hand drifted to {:?}",
                hands[0]
            );
        }
    }

    #[test]
    fn mouse_is_held_between_commands() {
        let mut game = game();
        game.set_mouse_actuator(Some(Vector2::new(100.0, 100.0)));
        game.set_mouse_actuator(Some(Vector2::new(140.0, 100.0)));
        for _ in 0..60 {
            game.advance(None);
        }
        let mouse = game.snapshot().mouse.unwrap();
        assert!((mouse[0] - 140.0).abs() < 1e-3, "mouse drifted to {:?}", mouse);
    }

    #[test]
    fn empty_frame_resets_the_game() {
        let mut game = game();
        game.advance(Some(vec![player_at(200.0), player_at(450.0)]));
        let old_logo = game.logo().handle();

        let report = game.advance(Some(Vec::new()));
        assert!(report.reset);
        assert_eq!(report.players, 0);
        assert_eq!(game.score(Side::Left), 0);
        assert_eq!(game.score(Side::Right), 0);
        assert_eq!(game.world().count_kind(ColliderTag::HandPusher), 0);
        assert_eq!(game.world().count_kind(ColliderTag::Logo), 1);
        assert!(!game.world().contains(old_logo));
    }

    #[test]
    fn empty_frame_without_players_is_a_no_op() {
        let mut game = game();
        let logo = game.logo().handle();
        let report = game.advance(Some(Vec::new()));
        assert!(!report.reset);
        assert!(game.world().contains(logo));
    }

    #[test]
    fn pose_dt_spans_frames_without_detections() {
        let mut game = game();
        game.advance(Some(vec![player_at(200.0)]));
        game.advance(None);
        game.advance(None);
        // two frames stepped since the last applied set
        assert!((game.pose_dt() - 2.0 / 60.0).abs() < 1e-4);

        let mut fresh = GameState::new(GameConfig::default());
        assert!((fresh.pose_dt() - 1.0 / 60.0).abs() < 1e-6);
        fresh.advance(Some(vec![player_at(200.0)]));
        assert!((fresh.pose_dt() - 1.0 / 60.0).abs() < 1e-4);
    }

    #[test]
    fn mouse_actuator_lifecycle() {
        let mut game = game();
        game.set_mouse_actuator(Some(Vector2::new(100.0, 100.0)));
        game.set_mouse_actuator(Some(Vector2::new(110.0, 100.0)));
        assert_eq!(game.world().count_kind(ColliderTag::MousePusher), 1);
        let mouse = game.snapshot().mouse.unwrap();
        assert!((mouse[0] - 110.0).abs() < 1e-3);

        game.set_mouse_actuator(None);
        game.set_mouse_actuator(None);
        assert_eq!(game.world().count_kind(ColliderTag::MousePusher), 0);
        assert!(game.snapshot().mouse.is_none());
    }

    #[test]
    fn snapshot_reports_scene() {
        let mut game = game();
        game.advance(Some(vec![player_at(300.0)]));
        assert!(game.toggle_debug());

        let snapshot = game.snapshot();
        assert_eq!(snapshot.players, 1);
        assert_eq!(snapshot.hands.len(), 1);
        assert_eq!(snapshot.goals.len(), 2);
        assert_eq!(snapshot.scores.len(), 2);
        assert!(snapshot.logo.is_some());
        assert!(snapshot.debug);
        assert!(serde_json::to_string(&snapshot).is_ok());
    }

    #[test]
    fn same_seed_spawns_logo_at_same_point() {
        let a = game().snapshot().logo.unwrap();
        let b = game().snapshot().logo.unwrap();
        assert_eq!(a.position, b.position);
    }
}
