// src/physics.rs - rapier2d world with pixel-space API and a separation event queue
use crate::config::PhysicsConfig;
use crate::goal::Side;
use nalgebra::{Point2, Vector2};
use rapier2d::prelude::{
    ActiveEvents, BroadPhase, CCDSolver, ColliderBuilder, ColliderHandle, ColliderSet,
    CollisionEvent, CollisionEventFlags, ContactPair, EventHandler, ImpulseJointSet,
    IntegrationParameters, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline, Real,
    RigidBodyBuilder, RigidBodyHandle, RigidBodySet, SharedShape,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// What a collider stands for in the game. Collision handling switches on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColliderKind {
    MousePusher,
    HandPusher,
    Logo,
    Goal(Side),
    Boundary,
}

/// Discriminant of [`ColliderKind`], used to subscribe to separation events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColliderTag {
    MousePusher,
    HandPusher,
    Logo,
    Goal,
    Boundary,
}

impl ColliderKind {
    pub fn tag(&self) -> ColliderTag {
        match self {
            ColliderKind::MousePusher => ColliderTag::MousePusher,
            ColliderKind::HandPusher => ColliderTag::HandPusher,
            ColliderKind::Logo => ColliderTag::Logo,
            ColliderKind::Goal(_) => ColliderTag::Goal,
            ColliderKind::Boundary => ColliderTag::Boundary,
        }
    }
}

/// Surface response of a collider.
#[derive(Debug, Clone, Copy)]
pub struct Material {
    pub elasticity: f32,
    pub friction: f32,
}

/// A collider and, unless it is fixed scenery, the body carrying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyHandle {
    body: Option<RigidBodyHandle>,
    collider: ColliderHandle,
}

impl BodyHandle {
    pub fn collider(&self) -> ColliderHandle {
        self.collider
    }
}

/// Two watched colliders stopped touching during a step.
/// `first` carries the first tag of the subscription that matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeparationEvent {
    pub first: ColliderKind,
    pub second: ColliderKind,
}

/// Collects raw collision events while the pipeline is stepping.
/// The world reads them back only after `step` has returned.
#[derive(Default)]
struct EventQueue {
    collisions: Mutex<Vec<CollisionEvent>>,
}

impl EventQueue {
    fn take(&self) -> Vec<CollisionEvent> {
        match self.collisions.lock() {
            Ok(mut queue) => std::mem::take(&mut *queue),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl EventHandler for EventQueue {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: CollisionEvent,
        _contact_pair: Option<&ContactPair>,
    ) {
        if let Ok(mut queue) = self.collisions.lock() {
            queue.push(event);
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

/// Fixed-step rigid body simulation.
///
/// All positions and velocities crossing this API are in screen pixels;
/// rapier works in metres scaled by `pixels_per_meter`.
pub struct PhysicsWorld {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    integration: IntegrationParameters,
    gravity: Vector2<Real>,
    pixels_per_meter: Real,
    linear_damping: Real,
    angular_damping: Real,
    kinds: HashMap<ColliderHandle, ColliderKind>,
    watched: Vec<(ColliderTag, ColliderTag)>,
    events: EventQueue,
    separations: Vec<SeparationEvent>,
}

impl PhysicsWorld {
    pub fn new(config: &PhysicsConfig) -> Self {
        let mut integration = IntegrationParameters::default();
        integration.dt = config.dt;

        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            integration,
            gravity: config.gravity() / config.pixels_per_meter,
            pixels_per_meter: config.pixels_per_meter,
            linear_damping: config.linear_damping,
            angular_damping: config.angular_damping,
            kinds: HashMap::new(),
            watched: Vec::new(),
            events: EventQueue::default(),
            separations: Vec::new(),
        }
    }

    /// Advances the simulation by exactly `dt` seconds.
    ///
    /// Separation events for watched pairs are queued and must be collected
    /// with [`PhysicsWorld::drain_separations`]; the body set is never touched
    /// from inside the step.
    pub fn step(&mut self, dt: f32) {
        assert!(dt > 0.0, "physics step needs a positive dt, got {dt}");
        self.integration.dt = dt;

        self.pipeline.step(
            &self.gravity,
            &self.integration,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &self.events,
        );

        for event in self.events.take() {
            if let CollisionEvent::Stopped(a, b, flags) = event {
                // Removing a collider also reports a stop; that is teardown, not play.
                if flags.contains(CollisionEventFlags::REMOVED) {
                    continue;
                }
                if let Some(separation) = self.match_separation(a, b) {
                    self.separations.push(separation);
                }
            }
        }
    }

    /// Subscribe to "stopped touching" events between colliders of these kinds.
    pub fn watch_separation(&mut self, first: ColliderTag, second: ColliderTag) {
        if !self.watched.contains(&(first, second)) {
            self.watched.push((first, second));
        }
    }

    pub fn drain_separations(&mut self) -> Vec<SeparationEvent> {
        std::mem::take(&mut self.separations)
    }

    fn match_separation(&self, a: ColliderHandle, b: ColliderHandle) -> Option<SeparationEvent> {
        let kind_a = *self.kinds.get(&a)?;
        let kind_b = *self.kinds.get(&b)?;

        self.watched.iter().find_map(|&(first, second)| {
            if kind_a.tag() == first && kind_b.tag() == second {
                Some(SeparationEvent { first: kind_a, second: kind_b })
            } else if kind_b.tag() == first && kind_a.tag() == second {
                Some(SeparationEvent { first: kind_b, second: kind_a })
            } else {
                None
            }
        })
    }

    /// Circle moved by setting position and velocity directly. It pushes
    /// dynamic bodies but never reacts to them.
    pub fn insert_kinematic_ball(
        &mut self,
        position: Vector2<f32>,
        radius: f32,
        material: Material,
        kind: ColliderKind,
    ) -> BodyHandle {
        let body = RigidBodyBuilder::kinematic_velocity_based()
            .translation(self.to_world(position))
            .build();
        let collider = ColliderBuilder::ball(radius / self.pixels_per_meter)
            .restitution(material.elasticity)
            .friction(material.friction)
            .build();
        self.insert_with_body(body, collider, kind)
    }

    /// Dynamic box with rounded corners, damped like every other moving body.
    pub fn insert_dynamic_box(
        &mut self,
        center: Vector2<f32>,
        size: Vector2<f32>,
        corner_radius: f32,
        mass: f32,
        material: Material,
        kind: ColliderKind,
    ) -> BodyHandle {
        let half = self.to_world(size / 2.0);
        let border = corner_radius / self.pixels_per_meter;
        let area = (2.0 * half.x) * (2.0 * half.y);

        let body = RigidBodyBuilder::dynamic()
            .translation(self.to_world(center))
            .linear_damping(self.linear_damping)
            .angular_damping(self.angular_damping)
            .ccd_enabled(true)
            .build();
        let collider = ColliderBuilder::round_cuboid(
            (half.x - border).max(border),
            (half.y - border).max(border),
            border,
        )
        .density(mass / area.max(f32::EPSILON))
        .restitution(material.elasticity)
        .friction(material.friction)
        .active_events(ActiveEvents::COLLISION_EVENTS)
        .build();
        self.insert_with_body(body, collider, kind)
    }

    /// Fixed line segment with thickness `radius`.
    pub fn insert_static_segment(
        &mut self,
        a: Vector2<f32>,
        b: Vector2<f32>,
        radius: f32,
        material: Material,
        kind: ColliderKind,
    ) -> BodyHandle {
        let a = Point2::from(self.to_world(a));
        let b = Point2::from(self.to_world(b));
        let collider = ColliderBuilder::new(SharedShape::capsule(
            a,
            b,
            radius / self.pixels_per_meter,
        ))
        .restitution(material.elasticity)
        .friction(material.friction)
        .active_events(ActiveEvents::COLLISION_EVENTS)
        .build();

        let handle = self.colliders.insert(collider);
        self.kinds.insert(handle, kind);
        BodyHandle { body: None, collider: handle }
    }

    fn insert_with_body(
        &mut self,
        body: rapier2d::prelude::RigidBody,
        collider: rapier2d::prelude::Collider,
        kind: ColliderKind,
    ) -> BodyHandle {
        let body_handle = self.bodies.insert(body);
        let collider_handle =
            self.colliders
                .insert_with_parent(collider, body_handle, &mut self.bodies);
        self.kinds.insert(collider_handle, kind);
        BodyHandle {
            body: Some(body_handle),
            collider: collider_handle,
        }
    }

    /// Removes the body and its collider. Returns false, and does nothing,
    /// when the handle is no longer in the world.
    pub fn remove(&mut self, handle: BodyHandle) -> bool {
        self.kinds.remove(&handle.collider);
        match handle.body {
            Some(body) => self
                .bodies
                .remove(
                    body,
                    &mut self.islands,
                    &mut self.colliders,
                    &mut self.impulse_joints,
                    &mut self.multibody_joints,
                    true,
                )
                .is_some(),
            None => self
                .colliders
                .remove(handle.collider, &mut self.islands, &mut self.bodies, true)
                .is_some(),
        }
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        match handle.body {
            Some(body) => self.bodies.contains(body),
            None => self.colliders.contains(handle.collider),
        }
    }

    pub fn kind(&self, handle: BodyHandle) -> Option<ColliderKind> {
        self.kinds.get(&handle.collider).copied()
    }

    pub fn position(&self, handle: BodyHandle) -> Option<Vector2<f32>> {
        match handle.body {
            Some(body) => self.bodies.get(body).map(|b| self.to_pixels(*b.translation())),
            None => self
                .colliders
                .get(handle.collider)
                .map(|c| self.to_pixels(c.position().translation.vector)),
        }
    }

    pub fn velocity(&self, handle: BodyHandle) -> Option<Vector2<f32>> {
        let body = self.bodies.get(handle.body?)?;
        Some(self.to_pixels(*body.linvel()))
    }

    /// Rotation in radians.
    pub fn angle(&self, handle: BodyHandle) -> Option<f32> {
        let body = self.bodies.get(handle.body?)?;
        Some(body.rotation().angle())
    }

    /// Teleports a body and sets its velocity. Pushers go through this every pose update.
    pub fn set_body_state(
        &mut self,
        handle: BodyHandle,
        position: Vector2<f32>,
        velocity: Vector2<f32>,
    ) -> bool {
        let position = self.to_world(position);
        let velocity = self.to_world(velocity);
        match handle.body.and_then(|body| self.bodies.get_mut(body)) {
            Some(body) => {
                body.set_translation(position, true);
                body.set_linvel(velocity, true);
                true
            }
            None => false,
        }
    }

    /// Sets the velocity of a dynamic body. Test scenarios use this to throw the logo.
    pub fn set_velocity(&mut self, handle: BodyHandle, velocity: Vector2<f32>) -> bool {
        let velocity = self.to_world(velocity);
        match handle.body.and_then(|body| self.bodies.get_mut(body)) {
            Some(body) => {
                body.set_linvel(velocity, true);
                true
            }
            None => false,
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn collider_count(&self) -> usize {
        self.colliders.len()
    }

    /// Number of live colliders of the given kind.
    pub fn count_kind(&self, tag: ColliderTag) -> usize {
        self.kinds.values().filter(|kind| kind.tag() == tag).count()
    }

    fn to_world(&self, pixels: Vector2<f32>) -> Vector2<Real> {
        pixels / self.pixels_per_meter
    }

    fn to_pixels(&self, metres: Vector2<Real>) -> Vector2<f32> {
        metres * self.pixels_per_meter
    }
}
