// src/actuator.rs - Kinematic pusher used for hands and the mouse
use crate::config::PushBodyConfig;
use crate::physics::{BodyHandle, ColliderKind, Material, PhysicsWorld};
use nalgebra::Vector2;

/// Weight of the fresh velocity estimate against the previous one.
pub const VELOCITY_SMOOTHING: f32 = 0.5;

/// A circle that follows a tracked point.
///
/// Its velocity is derived from successive positions rather than integrated
/// from forces, so the logo gets pushed with roughly the speed of the hand.
#[derive(Debug)]
pub struct PushBody {
    handle: BodyHandle,
    max_speed: Option<f32>,
    /// Last position handed to `move_to` or `spawn`.
    target: Vector2<f32>,
    /// Smoothed velocity from the last `move_to`.
    velocity: Vector2<f32>,
}

impl PushBody {
    pub fn spawn(
        world: &mut PhysicsWorld,
        position: Vector2<f32>,
        kind: ColliderKind,
        config: &PushBodyConfig,
    ) -> Self {
        let material = Material {
            elasticity: config.elasticity,
            friction: config.friction,
        };
        let handle = world.insert_kinematic_ball(position, config.radius, material, kind);
        Self {
            handle,
            max_speed: config.max_speed,
            target: position,
            velocity: Vector2::zeros(),
        }
    }

    /// Moves to `new_position` and sets the velocity to the mean of the
    /// measured velocity and the previous one.
    ///
    /// The measurement is taken from the previous target, not from wherever
    /// the body ended up after stepping. `dt` is the time since the previous
    /// target and must be positive.
    pub fn move_to(&mut self, world: &mut PhysicsWorld, new_position: Vector2<f32>, dt: f32) {
        assert!(dt > 0.0, "actuator moved with non-positive dt {dt}");

        let measured = (new_position - self.target) / dt;
        let mut velocity =
            measured * VELOCITY_SMOOTHING + self.velocity * (1.0 - VELOCITY_SMOOTHING);

        if let Some(max_speed) = self.max_speed {
            let speed = velocity.norm();
            if speed > max_speed {
                velocity *= max_speed / speed;
            }
        }

        self.target = new_position;
        self.velocity = velocity;
        world.set_body_state(self.handle, new_position, velocity);
    }

    /// Pins the body back on its target and stops it in the world.
    ///
    /// The smoothed velocity is kept for the next `move_to`, so the pusher
    /// only carries its speed into contacts during the steps right after an
    /// update and otherwise stays where the pose put it.
    pub fn hold(&self, world: &mut PhysicsWorld) {
        world.set_body_state(self.handle, self.target, Vector2::zeros());
    }

    pub fn position(&self, world: &PhysicsWorld) -> Option<Vector2<f32>> {
        world.position(self.handle)
    }

    pub fn target(&self) -> Vector2<f32> {
        self.target
    }

    /// Smoothed velocity, in px/s, as of the last `move_to`.
    pub fn velocity(&self) -> Vector2<f32> {
        self.velocity
    }

    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    /// Takes the pusher out of the world. Fine to call after the world already dropped it.
    pub fn remove(self, world: &mut PhysicsWorld) {
        world.remove(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;

    fn setup(max_speed: Option<f32>) -> (PhysicsWorld, PushBodyConfig) {
        let mut physics = PhysicsConfig::default();
        physics.gravity = [0.0, 0.0];
        let mut config = PushBodyConfig::default();
        config.max_speed = max_speed;
        (PhysicsWorld::new(&physics), config)
    }

    fn assert_close(actual: Vector2<f32>, expected: Vector2<f32>) {
        assert!(
            (actual - expected).norm() < 1e-3,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn velocity_is_averaged_with_previous() {
        let (mut world, config) = setup(None);
        let mut body = PushBody::spawn(&mut world, Vector2::zeros(), ColliderKind::HandPusher, &config);

        body.move_to(&mut world, Vector2::new(10.0, 0.0), 1.0);
        assert_close(body.velocity(), Vector2::new(5.0, 0.0));
        assert_close(world.velocity(body.handle()).unwrap(), Vector2::new(5.0, 0.0));

        body.move_to(&mut world, Vector2::new(20.0, 0.0), 1.0);
        // raw (10, 0) averaged with the previous (5, 0)
        assert_close(body.velocity(), Vector2::new(7.5, 0.0));
        assert_close(body.position(&world).unwrap(), Vector2::new(20.0, 0.0));
    }

    #[test]
    fn speed_is_clamped_after_smoothing() {
        let (mut world, config) = setup(Some(100.0));
        let mut body = PushBody::spawn(&mut world, Vector2::zeros(), ColliderKind::HandPusher, &config);

        body.move_to(&mut world, Vector2::new(0.0, 1000.0), 0.1);
        let velocity = body.velocity();
        assert!((velocity.norm() - 100.0).abs() < 1e-3);
        assert!(velocity.x.abs() < 1e-3 && velocity.y > 0.0);
    }

    #[test]
    fn velocity_is_measured_from_the_last_target() {
        let (mut world, config) = setup(None);
        let mut body = PushBody::spawn(&mut world, Vector2::zeros(), ColliderKind::HandPusher, &config);

        body.move_to(&mut world, Vector2::new(10.0, 0.0), 1.0);
        for _ in 0..60 {
            world.step(1.0 / 60.0);
        }
        // the body drifted past its target while stepping
        assert!(body.position(&world).unwrap().x > 14.0);

        body.move_to(&mut world, Vector2::new(20.0, 0.0), 1.0);
        assert_close(body.velocity(), Vector2::new(7.5, 0.0));
    }

    #[test]
    fn hold_pins_to_target_and_keeps_smoothing_state() {
        let (mut world, config) = setup(None);
        let mut body = PushBody::spawn(&mut world, Vector2::zeros(), ColliderKind::HandPusher, &config);
        body.move_to(&mut world, Vector2::new(30.0, 0.0), 0.5);
        world.step(1.0 / 60.0);
        body.hold(&mut world);

        assert_close(body.position(&world).unwrap(), Vector2::new(30.0, 0.0));
        assert_close(world.velocity(body.handle()).unwrap(), Vector2::zeros());
        assert_close(body.velocity(), Vector2::new(30.0, 0.0));

        for _ in 0..120 {
            world.step(1.0 / 60.0);
        }
        assert_close(body.position(&world).unwrap(), Vector2::new(30.0, 0.0));
    }

    #[test]
    #[should_panic]
    fn zero_dt_is_a_bug() {
        let (mut world, config) = setup(None);
        let mut body = PushBody::spawn(&mut world, Vector2::zeros(), ColliderKind::HandPusher, &config);
        body.move_to(&mut world, Vector2::new(1.0, 0.0), 0.0);
    }

    #[test]
    fn remove_takes_it_out_of_the_world() {
        let (mut world, config) = setup(None);
        let body = PushBody::spawn(&mut world, Vector2::zeros(), ColliderKind::MousePusher, &config);
        let handle = body.handle();
        assert!(world.contains(handle));
        body.remove(&mut world);
        assert!(!world.contains(handle));
        assert_eq!(world.body_count(), 0);
    }
}
