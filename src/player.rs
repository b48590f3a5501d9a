// src/player.rs - One tracked person and the pushers attached to their hands
use crate::actuator::PushBody;
use crate::config::{PushBodyConfig, TrackingConfig};
use crate::physics::{ColliderKind, PhysicsWorld};
use crate::pose::{Detection, Landmark};
use nalgebra::Vector2;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    fn slot(self) -> usize {
        match self {
            Hand::Left => 0,
            Hand::Right => 1,
        }
    }

    pub fn wrist(self) -> Landmark {
        match self {
            Hand::Left => Landmark::LeftWrist,
            Hand::Right => Landmark::RightWrist,
        }
    }

    pub fn elbow(self) -> Landmark {
        match self {
            Hand::Left => Landmark::LeftElbow,
            Hand::Right => Landmark::RightElbow,
        }
    }
}

/// Estimates where the hand is from the wrist and elbow keypoints.
///
/// Returns `None` unless both are observed. The hand sits `extrapolation`
/// forearm lengths beyond the wrist, so 0 gives the raw wrist position.
pub fn hand_position(detection: &Detection, hand: Hand, extrapolation: f32) -> Option<Vector2<f32>> {
    let wrist = detection.keypoint(hand.wrist());
    let elbow = detection.keypoint(hand.elbow());
    if !wrist.is_observed() || !elbow.is_observed() {
        return None;
    }

    let forearm = wrist.position() - elbow.position();
    Some(wrist.position() + forearm * extrapolation)
}

/// A person kept across frames. Identity is only "the detection that matched
/// this player last frame"; there is no external id from the pose source.
#[derive(Debug)]
pub struct Player {
    hands: [Option<PushBody>; 2],
    key_points: Option<Detection>,
    hand_extrapolation: f32,
    push_body: PushBodyConfig,
}

impl Player {
    pub fn new(tracking: &TrackingConfig, push_body: &PushBodyConfig) -> Self {
        Self {
            hands: [None, None],
            key_points: None,
            hand_extrapolation: tracking.hand_extrapolation,
            push_body: push_body.clone(),
        }
    }

    /// Neck to neck distance from this player's last pose to `candidate`.
    ///
    /// Infinite when either neck is unobserved, which keeps such pairs from
    /// ever matching.
    pub fn distance(&self, candidate: &Detection) -> f32 {
        let Some(own) = &self.key_points else {
            return f32::INFINITY;
        };
        let own_neck = own.keypoint(Landmark::Neck);
        let other_neck = candidate.keypoint(Landmark::Neck);
        if !own_neck.is_observed() || !other_neck.is_observed() {
            return f32::INFINITY;
        }
        (own_neck.position() - other_neck.position()).norm()
    }

    /// Applies a new pose: each hand's pusher is moved, created or removed to
    /// match what the detection shows, then the detection becomes the last
    /// known pose.
    pub fn update_pose(&mut self, world: &mut PhysicsWorld, detection: Detection, dt: f32) {
        for hand in Hand::BOTH {
            let Some(position) = hand_position(&detection, hand, self.hand_extrapolation) else {
                self.remove_hand(world, hand);
                continue;
            };

            if let Some(pusher) = self.hands[hand.slot()].as_mut() {
                pusher.move_to(world, position, dt);
            } else {
                debug!(?hand, x = position.x, y = position.y, "Hand actuator attached");
                self.hands[hand.slot()] = Some(PushBody::spawn(
                    world,
                    position,
                    ColliderKind::HandPusher,
                    &self.push_body,
                ));
            }
        }

        self.key_points = Some(detection);
    }

    fn remove_hand(&mut self, world: &mut PhysicsWorld, hand: Hand) {
        if let Some(pusher) = self.hands[hand.slot()].take() {
            debug!(?hand, "Hand actuator detached");
            pusher.remove(world);
        }
    }

    /// Keeps both pushers on their last pose until the next update.
    pub fn hold(&self, world: &mut PhysicsWorld) {
        for pusher in self.hands.iter().flatten() {
            pusher.hold(world);
        }
    }

    /// Removes both pushers from the world. Safe to call repeatedly.
    pub fn destroy(&mut self, world: &mut PhysicsWorld) {
        for hand in Hand::BOTH {
            self.remove_hand(world, hand);
        }
    }

    pub fn actuator(&self, hand: Hand) -> Option<&PushBody> {
        self.hands[hand.slot()].as_ref()
    }

    pub fn actuator_count(&self) -> usize {
        self.hands.iter().flatten().count()
    }

    pub fn key_points(&self) -> Option<&Detection> {
        self.key_points.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;
    use crate::physics::ColliderTag;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&PhysicsConfig::default())
    }

    fn player() -> Player {
        let tracking = TrackingConfig {
            hand_extrapolation: 0.0,
            ..TrackingConfig::default()
        };
        Player::new(&tracking, &PushBodyConfig::default())
    }

    fn pose(neck: (f32, f32)) -> Detection {
        Detection::empty().with(Landmark::Neck, neck.0, neck.1, 0.9)
    }

    fn with_right_arm(detection: Detection, wrist: (f32, f32)) -> Detection {
        detection
            .with(Landmark::RightElbow, wrist.0 - 30.0, wrist.1, 0.8)
            .with(Landmark::RightWrist, wrist.0, wrist.1, 0.8)
    }

    #[test]
    fn distance_is_infinite_without_a_pose() {
        let player = player();
        assert_eq!(player.distance(&pose((0.0, 0.0))), f32::INFINITY);
    }

    #[test]
    fn distance_is_infinite_when_either_neck_is_missing() {
        let mut world = world();
        let mut visible = player();
        visible.update_pose(&mut world, pose((100.0, 100.0)), 1.0 / 60.0);

        let hidden_neck = Detection::empty().with(Landmark::Neck, 100.0, 100.0, 0.0);
        assert_eq!(visible.distance(&hidden_neck), f32::INFINITY);

        let mut own_hidden = player();
        own_hidden.update_pose(&mut world, hidden_neck, 1.0 / 60.0);
        assert_eq!(own_hidden.distance(&pose((100.0, 100.0))), f32::INFINITY);
    }

    #[test]
    fn distance_is_symmetric_neck_distance() {
        let mut world = world();
        let mut a = player();
        let mut b = player();
        a.update_pose(&mut world, pose((0.0, 0.0)), 1.0 / 60.0);
        b.update_pose(&mut world, pose((30.0, 40.0)), 1.0 / 60.0);

        assert!((a.distance(&pose((30.0, 40.0))) - 50.0).abs() < 1e-4);
        assert!((b.distance(&pose((0.0, 0.0))) - 50.0).abs() < 1e-4);
    }

    #[test]
    fn observed_arm_gets_exactly_one_actuator() {
        let mut world = world();
        let mut player = player();
        let detection = with_right_arm(pose((300.0, 100.0)), (200.0, 250.0));

        player.update_pose(&mut world, detection.clone(), 1.0 / 60.0);
        player.update_pose(&mut world, detection, 1.0 / 60.0);

        assert!(player.actuator(Hand::Right).is_some());
        assert!(player.actuator(Hand::Left).is_none());
        assert_eq!(world.count_kind(ColliderTag::HandPusher), 1);
    }

    #[test]
    fn missing_elbow_removes_the_actuator() {
        let mut world = world();
        let mut player = player();
        player.update_pose(
            &mut world,
            with_right_arm(pose((300.0, 100.0)), (200.0, 250.0)),
            1.0 / 60.0,
        );
        assert_eq!(player.actuator_count(), 1);

        let elbow_lost = with_right_arm(pose((300.0, 100.0)), (200.0, 250.0))
            .with(Landmark::RightElbow, 170.0, 250.0, 0.0);
        player.update_pose(&mut world, elbow_lost, 1.0 / 60.0);

        assert_eq!(player.actuator_count(), 0);
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn existing_actuator_is_moved_not_replaced() {
        let mut world = world();
        let mut player = player();
        player.update_pose(
            &mut world,
            with_right_arm(pose((300.0, 100.0)), (200.0, 250.0)),
            1.0 / 60.0,
        );
        let handle = player.actuator(Hand::Right).unwrap().handle();

        player.update_pose(
            &mut world,
            with_right_arm(pose((300.0, 100.0)), (210.0, 250.0)),
            0.5,
        );
        let pusher = player.actuator(Hand::Right).unwrap();
        assert_eq!(pusher.handle(), handle);
        let position = pusher.position(&world).unwrap();
        assert!((position - Vector2::new(210.0, 250.0)).norm() < 1e-3);
        // 10 px over 0.5 s, averaged with a resting start
        assert!((pusher.velocity().x - 10.0).abs() < 1e-3);
    }

    #[test]
    fn destroy_twice_leaves_nothing() {
        let mut world = world();
        let mut player = player();
        let both_arms = with_right_arm(pose((300.0, 100.0)), (200.0, 250.0))
            .with(Landmark::LeftElbow, 430.0, 250.0, 0.8)
            .with(Landmark::LeftWrist, 400.0, 250.0, 0.8);
        player.update_pose(&mut world, both_arms, 1.0 / 60.0);
        assert_eq!(player.actuator_count(), 2);

        player.destroy(&mut world);
        player.destroy(&mut world);
        assert_eq!(player.actuator_count(), 0);
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn hand_is_extrapolated_along_the_forearm() {
        let detection = Detection::empty()
            .with(Landmark::LeftElbow, 100.0, 100.0, 0.5)
            .with(Landmark::LeftWrist, 140.0, 100.0, 0.5);

        assert_eq!(
            hand_position(&detection, Hand::Left, 0.0),
            Some(Vector2::new(140.0, 100.0))
        );
        assert_eq!(
            hand_position(&detection, Hand::Left, 0.25),
            Some(Vector2::new(150.0, 100.0))
        );
        assert_eq!(hand_position(&detection, Hand::Right, 0.25), None);
    }
}
