// src/tracking.rs - Frame-to-frame identity for players
use crate::config::{PushBodyConfig, TrackingConfig};
use crate::physics::PhysicsWorld;
use crate::player::Player;
use crate::pose::Detection;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Stable handle for a tracked player. Never reused within a tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlayerId(u64);

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub created: Vec<PlayerId>,
    pub matched: Vec<PlayerId>,
    pub dropped: Vec<PlayerId>,
    /// The frame was processed but nobody was in it while players existed.
    pub reset_requested: bool,
}

/// Owns every [`Player`] and matches each frame's detections against them.
pub struct PlayerTracker {
    players: BTreeMap<PlayerId, Player>,
    next_id: u64,
    config: TrackingConfig,
    push_body: PushBodyConfig,
}

impl PlayerTracker {
    pub fn new(config: TrackingConfig, push_body: PushBodyConfig) -> Self {
        Self {
            players: BTreeMap::new(),
            next_id: 0,
            config,
            push_body,
        }
    }

    /// Greedy nearest-neighbour association of `detections` to players.
    ///
    /// Each detection takes the closest player under the match threshold
    /// (first minimum wins) or starts a new one. Players nobody picked are
    /// destroyed. An empty detection set leaves everything in place and only
    /// flags a reset when players exist; the caller performs the reset.
    pub fn reconcile(
        &mut self,
        world: &mut PhysicsWorld,
        detections: Vec<Detection>,
        dt: f32,
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        if detections.is_empty() {
            outcome.reset_requested = !self.players.is_empty();
            return outcome;
        }

        // Only players that existed before this pass are candidates, so two
        // detections in the same frame never merge into a player created here.
        let previous: Vec<PlayerId> = self.players.keys().copied().collect();
        let mut selected = BTreeSet::new();

        for detection in detections {
            let mut best: Option<(PlayerId, f32)> = None;
            for id in &previous {
                let distance = self.players[id].distance(&detection);
                if distance < self.config.match_threshold
                    && best.map_or(true, |(_, best_distance)| distance < best_distance)
                {
                    best = Some((*id, distance));
                }
            }

            let id = match best {
                Some((id, distance)) => {
                    debug!(player = id.0, distance, "Detection matched");
                    if selected.insert(id) {
                        outcome.matched.push(id);
                    }
                    id
                }
                None => {
                    let id = self.insert_player();
                    info!(player = id.0, "Player joined");
                    outcome.created.push(id);
                    id
                }
            };

            if let Some(player) = self.players.get_mut(&id) {
                player.update_pose(world, detection, dt);
            }
        }

        for id in previous {
            if selected.contains(&id) {
                continue;
            }
            if let Some(mut player) = self.players.remove(&id) {
                player.destroy(world);
                info!(player = id.0, "Player lost");
                outcome.dropped.push(id);
            }
        }

        outcome
    }

    fn insert_player(&mut self) -> PlayerId {
        let id = PlayerId(self.next_id);
        self.next_id += 1;
        self.players
            .insert(id, Player::new(&self.config, &self.push_body));
        id
    }

    /// Pins every hand pusher on its last tracked position.
    pub fn hold_actuators(&self, world: &mut PhysicsWorld) {
        for player in self.players.values() {
            player.hold(world);
        }
    }

    /// Destroys every player.
    pub fn clear(&mut self, world: &mut PhysicsWorld) {
        for (_, mut player) in std::mem::take(&mut self.players) {
            player.destroy(world);
        }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn get(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = (PlayerId, &Player)> {
        self.players.iter().map(|(id, player)| (*id, player))
    }

    pub fn actuator_count(&self) -> usize {
        self.players.values().map(Player::actuator_count).sum()
    }
}
