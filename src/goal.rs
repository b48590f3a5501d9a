// src/goal.rs
use crate::config::{ArenaConfig, GoalConfig};
use crate::physics::{BodyHandle, ColliderKind, ColliderTag, Material, PhysicsWorld, SeparationEvent};
use nalgebra::Vector2;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Goals for one side. Never decremented; only [`ScoreCounter::reset`] lowers it.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreCounter {
    /// Where the renderer draws the number.
    pub anchor: [f32; 2],
    score: u32,
}

impl ScoreCounter {
    pub fn new(anchor: [f32; 2]) -> Self {
        Self { anchor, score: 0 }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn add_goal(&mut self) {
        self.score += 1;
    }

    pub fn reset(&mut self) {
        self.score = 0;
    }
}

/// Static goal line on one side of the arena.
#[derive(Debug, Clone, Copy)]
pub struct GoalPost {
    pub side: Side,
    pub start: Vector2<f32>,
    pub end: Vector2<f32>,
    handle: BodyHandle,
}

impl GoalPost {
    /// Side whose counter goes up when the logo leaves this post. A ball in the
    /// left goal is a point for whoever defends the right.
    pub fn credited_side(&self) -> Side {
        self.side.opposite()
    }

    pub fn handle(&self) -> BodyHandle {
        self.handle
    }
}

/// Both counters and both goal posts.
#[derive(Debug, Clone)]
pub struct Scoreboard {
    left: ScoreCounter,
    right: ScoreCounter,
    posts: [GoalPost; 2],
}

impl Scoreboard {
    /// Places a goal line across the middle of each side wall and registers
    /// logo/goal separation with the world.
    pub fn build(world: &mut PhysicsWorld, arena: &ArenaConfig, goal: &GoalConfig) -> Self {
        let material = Material {
            elasticity: goal.elasticity,
            friction: goal.friction,
        };
        let top = (arena.height - goal.mouth_height) / 2.0;
        let bottom = top + goal.mouth_height;

        let mut post = |side: Side, x: f32| {
            let start = Vector2::new(x, top);
            let end = Vector2::new(x, bottom);
            let handle =
                world.insert_static_segment(start, end, goal.thickness, material, ColliderKind::Goal(side));
            GoalPost { side, start, end, handle }
        };
        let posts = [post(Side::Left, 0.0), post(Side::Right, arena.width)];

        world.watch_separation(ColliderTag::Logo, ColliderTag::Goal);

        Self {
            left: ScoreCounter::new([arena.width * 0.25, 40.0]),
            right: ScoreCounter::new([arena.width * 0.75, 40.0]),
            posts,
        }
    }

    pub fn counter(&self, side: Side) -> &ScoreCounter {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn counter_mut(&mut self, side: Side) -> &mut ScoreCounter {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    pub fn score(&self, side: Side) -> u32 {
        self.counter(side).score()
    }

    pub fn posts(&self) -> &[GoalPost; 2] {
        &self.posts
    }

    pub fn post(&self, side: Side) -> &GoalPost {
        match side {
            Side::Left => &self.posts[0],
            Side::Right => &self.posts[1],
        }
    }

    /// Credits a goal for a logo/goal separation. Returns the side that scored,
    /// or `None` for events that are not goals.
    pub fn apply(&mut self, event: &SeparationEvent) -> Option<Side> {
        let post_side = match (event.first, event.second) {
            (ColliderKind::Logo, ColliderKind::Goal(side))
            | (ColliderKind::Goal(side), ColliderKind::Logo) => side,
            _ => return None,
        };
        let scorer = self.post(post_side).credited_side();
        let counter = self.counter_mut(scorer);
        counter.add_goal();
        info!(goal = ?post_side, scorer = ?scorer, score = counter.score(), "Goal scored");
        Some(scorer)
    }

    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}
