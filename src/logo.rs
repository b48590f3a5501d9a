// src/logo.rs
use crate::config::{ArenaConfig, LogoConfig};
use crate::physics::{BodyHandle, ColliderKind, Material, PhysicsWorld};
use nalgebra::Vector2;
use rand::Rng;
use serde::Serialize;

/// The "ball". Exactly one lives in the world during play.
#[derive(Debug)]
pub struct Logo {
    handle: BodyHandle,
    size: Vector2<f32>,
}

/// Pose of the logo for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LogoTransform {
    pub position: [f32; 2],
    /// Radians.
    pub angle: f32,
    pub size: [f32; 2],
}

impl Logo {
    pub fn spawn(world: &mut PhysicsWorld, center: Vector2<f32>, config: &LogoConfig) -> Self {
        let size = Vector2::new(config.width, config.height);
        let material = Material {
            elasticity: config.elasticity,
            friction: config.friction,
        };
        let handle = world.insert_dynamic_box(
            center,
            size,
            config.corner_radius,
            config.mass,
            material,
            ColliderKind::Logo,
        );
        Self { handle, size }
    }

    /// Random point in the central quarter of the arena: the middle half of
    /// its width by the middle half of its height.
    pub fn spawn_point<R: Rng>(arena: &ArenaConfig, rng: &mut R) -> Vector2<f32> {
        let x = rng.gen_range(arena.width * 0.25..=arena.width * 0.75);
        let y = rng.gen_range(arena.height * 0.25..=arena.height * 0.75);
        Vector2::new(x, y)
    }

    /// Removes this logo from the world and puts a fresh one at a random point.
    pub fn respawn<R: Rng>(
        &mut self,
        world: &mut PhysicsWorld,
        arena: &ArenaConfig,
        config: &LogoConfig,
        rng: &mut R,
    ) {
        world.remove(self.handle);
        *self = Logo::spawn(world, Logo::spawn_point(arena, rng), config);
    }

    pub fn handle(&self) -> BodyHandle {
        self.handle
    }

    pub fn transform(&self, world: &PhysicsWorld) -> Option<LogoTransform> {
        let position = world.position(self.handle)?;
        let angle = world.angle(self.handle)?;
        Some(LogoTransform {
            position: [position.x, position.y],
            angle,
            size: [self.size.x, self.size.y],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;
    use crate::physics::ColliderTag;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn spawn_points_stay_in_the_central_quarter() {
        let arena = ArenaConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..500 {
            let point = Logo::spawn_point(&arena, &mut rng);
            assert!((160.0..=480.0).contains(&point.x));
            assert!((120.0..=360.0).contains(&point.y));
        }
    }

    #[test]
    fn respawn_keeps_a_single_logo() {
        let mut world = PhysicsWorld::new(&PhysicsConfig::default());
        let arena = ArenaConfig::default();
        let config = LogoConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let mut logo = Logo::spawn(&mut world, Vector2::new(320.0, 240.0), &config);
        let old = logo.handle();
        logo.respawn(&mut world, &arena, &config, &mut rng);

        assert_eq!(world.count_kind(ColliderTag::Logo), 1);
        assert!(!world.contains(old));
        assert!(world.contains(logo.handle()));
        let transform = logo.transform(&world).unwrap();
        assert_eq!(transform.size, [80.0, 80.0]);
    }
}
