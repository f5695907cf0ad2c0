//! rapier2d physics integration.
//!
//! The [`PhysicsWorld`] owns the rapier simulation. Population logic creates
//! bodies through [`PhysicsWorld::add_body`] and attaches the returned
//! [`Physics`] component to an entity; from then on the simulation is the
//! source of truth for that entity's pose. Each frame:
//!
//! 1. The frame driver steps rapier with the fixed dt.
//! 2. [`PhysicsSystem`] copies every linked body's position and rotation into
//!    the entity's [`Transform`].
//!
//! Data only flows from physics to `Transform`. Writing a `Transform` on a
//! physics-linked entity does not move the body and is overwritten on the
//! next update.
//!
//! Coordinates are screen pixels with y growing downward; body positions are
//! centers, matching [`Transform`].
//!
//! # Determinism
//!
//! rapier2d is compiled with `enhanced-determinism`. With a fixed timestep
//! and the same population order, a session replays identically on the same
//! platform.

use std::cell::RefCell;
use std::rc::Rc;

use moa_ecs::component::{BodyHandle, Physics, Transform};
use moa_ecs::entity::Entity;
use moa_ecs::world::System;
use moa_ecs::EcsError;
use rapier2d::prelude::*;
use tracing::{debug, warn};

/// Name the physics sync system registers under.
pub const PHYSICS_SYSTEM_NAME: &str = "physics";

/// Physics world shared between the frame driver, which steps it, and the
/// [`PhysicsSystem`], which reads it.
pub type SharedPhysics = Rc<RefCell<PhysicsWorld>>;

// ---------------------------------------------------------------------------
// Body descriptors
// ---------------------------------------------------------------------------

/// Collider shape of a body, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyShape {
    Rectangle { width: f64, height: f64 },
    Circle { radius: f64 },
}

/// Everything needed to create one rigid body with a single collider.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    /// Center x.
    pub x: f64,
    /// Center y.
    pub y: f64,
    /// Rotation in radians.
    pub angle: f64,
    pub shape: BodyShape,
    /// Fixed bodies never move.
    pub is_static: bool,
    /// Bounciness. 0 = none, 1 = perfectly elastic.
    pub restitution: f64,
    pub friction: f64,
    pub density: f64,
    /// Initial linear velocity in pixels per second.
    pub velocity: (f64, f64),
}

impl BodyDesc {
    fn with_shape(x: f64, y: f64, shape: BodyShape) -> Self {
        Self {
            x,
            y,
            angle: 0.0,
            shape,
            is_static: false,
            restitution: 0.0,
            friction: 0.5,
            density: 1.0,
            velocity: (0.0, 0.0),
        }
    }

    /// Dynamic rectangle centered on `(x, y)`.
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::with_shape(x, y, BodyShape::Rectangle { width, height })
    }

    /// Dynamic circle centered on `(x, y)`.
    pub fn circle(x: f64, y: f64, radius: f64) -> Self {
        Self::with_shape(x, y, BodyShape::Circle { radius })
    }

    /// Make the body immovable (ground, walls).
    pub fn fixed(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density;
        self
    }

    pub fn with_velocity(mut self, vx: f64, vy: f64) -> Self {
        self.velocity = (vx, vy);
        self
    }
}

/// Position and rotation of a body as read back from the simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyPose {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
}

impl BodyPose {
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.angle.is_finite()
    }
}

fn to_rapier(handle: BodyHandle) -> RigidBodyHandle {
    let (index, generation) = handle.into_raw_parts();
    RigidBodyHandle::from_raw_parts(index, generation)
}

fn from_rapier(handle: RigidBodyHandle) -> BodyHandle {
    let (index, generation) = handle.into_raw_parts();
    BodyHandle::from_raw_parts(index, generation)
}

// ---------------------------------------------------------------------------
// PhysicsWorld
// ---------------------------------------------------------------------------

/// Manages the rapier2d simulation state.
///
/// The physics world lives outside the ECS because rapier owns its own body
/// and collider storage. Entities refer to bodies through the opaque
/// [`BodyHandle`] in their [`Physics`] component.
pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    steps: u64,
}

impl PhysicsWorld {
    /// Create a new physics world with the given gravity vector.
    pub fn new(gravity_x: f64, gravity_y: f64) -> Self {
        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![gravity_x as Real, gravity_y as Real],
            integration_params: IntegrationParameters::default(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            steps: 0,
        }
    }

    /// Create a physics world without gravity (top-down scenes).
    pub fn new_zero_gravity() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn gravity(&self) -> (f64, f64) {
        (self.gravity.x as f64, self.gravity.y as f64)
    }

    // -- bodies ---------------------------------------------------------------

    /// Create a body and its collider. Returns the component that links an
    /// entity to it.
    pub fn add_body(&mut self, desc: &BodyDesc) -> Physics {
        let builder = if desc.is_static {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
                .linvel(vector![desc.velocity.0 as Real, desc.velocity.1 as Real])
        };
        let rb = builder
            .translation(vector![desc.x as Real, desc.y as Real])
            .rotation(desc.angle as Real)
            .build();
        let body_handle = self.rigid_body_set.insert(rb);

        let shape = match desc.shape {
            BodyShape::Rectangle { width, height } => {
                SharedShape::cuboid((width / 2.0) as Real, (height / 2.0) as Real)
            }
            BodyShape::Circle { radius } => SharedShape::ball(radius as Real),
        };
        let collider = ColliderBuilder::new(shape)
            .restitution(desc.restitution as Real)
            .friction(desc.friction as Real)
            .density(desc.density as Real)
            .build();
        self.collider_set
            .insert_with_parent(collider, body_handle, &mut self.rigid_body_set);

        let handle = from_rapier(body_handle);
        debug!(body = %handle, is_static = desc.is_static, x = desc.x, y = desc.y, "body created");
        Physics::new(handle, desc.is_static)
    }

    /// Remove a body and its colliders. Returns `false` for an unknown or
    /// stale handle.
    pub fn remove_body(&mut self, handle: BodyHandle) -> bool {
        self.rigid_body_set
            .remove(
                to_rapier(handle),
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true, // remove attached colliders
            )
            .is_some()
    }

    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.rigid_body_set.contains(to_rapier(handle))
    }

    /// Number of bodies currently in the simulation.
    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    pub fn collider_count(&self) -> usize {
        self.collider_set.len()
    }

    /// Drop every body, collider and joint. Gravity is kept.
    pub fn clear(&mut self) {
        let (gx, gy) = self.gravity();
        let bodies = self.body_count();
        *self = Self::new(gx, gy);
        debug!(bodies, "physics world cleared");
    }

    // -- stepping -------------------------------------------------------------

    /// Advance the simulation by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        self.integration_params.dt = dt as Real;

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None, // query pipeline (unused)
            &(),  // physics hooks
            &(),  // events
        );
        self.steps += 1;
    }

    /// Number of steps taken since creation or the last [`clear`](Self::clear).
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    // -- body state -----------------------------------------------------------

    /// Current center and rotation, or `None` for an unknown handle.
    pub fn body_pose(&self, handle: BodyHandle) -> Option<BodyPose> {
        let rb = self.rigid_body_set.get(to_rapier(handle))?;
        let t = rb.translation();
        Some(BodyPose {
            x: t.x as f64,
            y: t.y as f64,
            angle: rb.rotation().angle() as f64,
        })
    }

    /// Teleport a body. Returns `false` for an unknown handle.
    pub fn set_pose(&mut self, handle: BodyHandle, x: f64, y: f64, angle: f64) -> bool {
        let Some(rb) = self.rigid_body_set.get_mut(to_rapier(handle)) else {
            return false;
        };
        rb.set_position(
            Isometry::new(vector![x as Real, y as Real], angle as Real),
            true,
        );
        true
    }

    pub fn velocity(&self, handle: BodyHandle) -> Option<(f64, f64)> {
        let v = self.rigid_body_set.get(to_rapier(handle))?.linvel();
        Some((v.x as f64, v.y as f64))
    }

    pub fn set_velocity(&mut self, handle: BodyHandle, vx: f64, vy: f64) -> bool {
        let Some(rb) = self.rigid_body_set.get_mut(to_rapier(handle)) else {
            return false;
        };
        rb.set_linvel(vector![vx as Real, vy as Real], true);
        true
    }

    pub fn apply_impulse(&mut self, handle: BodyHandle, ix: f64, iy: f64) -> bool {
        let Some(rb) = self.rigid_body_set.get_mut(to_rapier(handle)) else {
            return false;
        };
        rb.apply_impulse(vector![ix as Real, iy as Real], true);
        true
    }

    // -- pointer queries ------------------------------------------------------

    /// First dynamic body whose collider contains the point.
    pub fn body_at_point(&self, x: f64, y: f64) -> Option<BodyHandle> {
        let point = point![x as Real, y as Real];
        self.collider_set.iter().find_map(|(_, collider)| {
            let parent = collider.parent()?;
            let rb = self.rigid_body_set.get(parent)?;
            (rb.is_dynamic() && collider.shape().contains_point(collider.position(), &point))
                .then(|| from_rapier(parent))
        })
    }

    /// A world point expressed in the body's local frame.
    pub fn to_local_point(&self, handle: BodyHandle, x: f64, y: f64) -> Option<(f64, f64)> {
        let rb = self.rigid_body_set.get(to_rapier(handle))?;
        let local = rb
            .position()
            .inverse_transform_point(&point![x as Real, y as Real]);
        Some((local.x as f64, local.y as f64))
    }

    /// Pull the body so that `local_anchor` closes `stiffness` of its
    /// distance to `target` over the next step of length `dt`.
    pub fn pull_toward(
        &mut self,
        handle: BodyHandle,
        local_anchor: (f64, f64),
        target: (f64, f64),
        stiffness: f64,
        dt: f64,
    ) -> bool {
        let Some(rb) = self.rigid_body_set.get_mut(to_rapier(handle)) else {
            return false;
        };
        if !rb.is_dynamic() || dt <= 0.0 {
            return false;
        }
        let anchor = rb.position() * point![local_anchor.0 as Real, local_anchor.1 as Real];
        let delta = point![target.0 as Real, target.1 as Real] - anchor;
        let gain = (stiffness / dt) as Real;
        rb.set_linvel(delta * gain, true);
        rb.set_angvel(rb.angvel() * 0.9, true);
        true
    }
}

impl Default for PhysicsWorld {
    /// Screen-space gravity of 1000 px/s² downward.
    fn default() -> Self {
        Self::new(0.0, crate::config::DEFAULT_GRAVITY[1])
    }
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("gravity", &self.gravity())
            .field("bodies", &self.body_count())
            .field("steps", &self.steps)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// PhysicsSystem
// ---------------------------------------------------------------------------

/// Copies each physics body's pose into its entity's [`Transform`].
///
/// Entities lacking either `Transform` or `Physics` are skipped, as are
/// entities whose body has been removed (the transform keeps its last pose).
/// A body whose pose is not finite is a fault: the system returns
/// [`EcsError::SystemFault`] and the session halts.
pub struct PhysicsSystem {
    physics: SharedPhysics,
}

impl PhysicsSystem {
    pub fn new(physics: SharedPhysics) -> Self {
        Self { physics }
    }
}

impl System for PhysicsSystem {
    fn name(&self) -> &str {
        PHYSICS_SYSTEM_NAME
    }

    fn update(&mut self, entities: &mut Vec<Entity>, _dt: f64) -> Result<(), EcsError> {
        let physics = self.physics.borrow();
        for entity in entities.iter_mut() {
            let Some((transform, link)) = entity.get_mut_with::<Transform, Physics>() else {
                continue;
            };
            let body = link.body;
            let Some(pose) = physics.body_pose(body) else {
                debug!(entity = %entity.id(), %body, "body no longer exists; sync skipped");
                continue;
            };
            if pose.is_finite() {
                transform.x = pose.x;
                transform.y = pose.y;
                transform.angle = pose.angle;
                continue;
            }
            let details = format!("{body} has a non-finite pose {pose:?}");
            warn!(entity = %entity.id(), %details, "physics sync failed");
            return Err(EcsError::SystemFault {
                system: PHYSICS_SYSTEM_NAME.to_owned(),
                entity: entity.id().to_string(),
                details,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use moa_ecs::component::Visual;

    const DT: f64 = 1.0 / 60.0;

    fn shared(world: PhysicsWorld) -> SharedPhysics {
        Rc::new(RefCell::new(world))
    }

    #[test]
    fn physics_world_starts_empty() {
        let pw = PhysicsWorld::default();
        assert_eq!(pw.body_count(), 0);
        assert_eq!(pw.gravity(), (0.0, 1000.0));
    }

    #[test]
    fn add_body_returns_linked_component() {
        let mut pw = PhysicsWorld::new_zero_gravity();
        let ground = pw.add_body(&BodyDesc::rectangle(400.0, 590.0, 800.0, 20.0).fixed());
        let ball = pw.add_body(&BodyDesc::circle(400.0, 100.0, 10.0));

        assert!(ground.is_static);
        assert!(!ball.is_static);
        assert_ne!(ground.body, ball.body);
        assert_eq!(pw.body_count(), 2);
        assert_eq!(pw.collider_count(), 2);
        assert!(pw.contains(ball.body));
    }

    #[test]
    fn dynamic_body_falls_under_gravity() {
        let mut pw = PhysicsWorld::default();
        let body = pw.add_body(&BodyDesc::rectangle(100.0, 100.0, 20.0, 20.0)).body;

        for _ in 0..30 {
            pw.step(DT);
        }
        let pose = pw.body_pose(body).unwrap();
        assert!(pose.y > 100.0, "expected fall, y = {}", pose.y);
        assert!((pose.x - 100.0).abs() < 1e-3);
        assert_eq!(pw.step_count(), 30);
    }

    #[test]
    fn static_body_does_not_move() {
        let mut pw = PhysicsWorld::default();
        let ground = pw.add_body(&BodyDesc::rectangle(400.0, 590.0, 800.0, 20.0).fixed()).body;
        for _ in 0..30 {
            pw.step(DT);
        }
        let pose = pw.body_pose(ground).unwrap();
        assert_eq!((pose.x, pose.y), (400.0, 590.0));
    }

    #[test]
    fn box_comes_to_rest_on_ground() {
        let mut pw = PhysicsWorld::default();
        pw.add_body(&BodyDesc::rectangle(400.0, 590.0, 800.0, 20.0).fixed());
        let body = pw.add_body(&BodyDesc::rectangle(400.0, 500.0, 40.0, 40.0)).body;

        for _ in 0..240 {
            pw.step(DT);
        }
        let pose = pw.body_pose(body).unwrap();
        // Ground top is at 580, box half-height is 20.
        assert!((pose.y - 560.0).abs() < 2.0, "resting y = {}", pose.y);
    }

    #[test]
    fn removed_body_has_no_pose() {
        let mut pw = PhysicsWorld::default();
        let body = pw.add_body(&BodyDesc::circle(0.0, 0.0, 5.0)).body;
        assert!(pw.remove_body(body));
        assert!(!pw.remove_body(body));
        assert!(pw.body_pose(body).is_none());
        assert_eq!(pw.collider_count(), 0);
    }

    #[test]
    fn clear_drops_everything_but_gravity() {
        let mut pw = PhysicsWorld::new(0.0, 250.0);
        let body = pw.add_body(&BodyDesc::circle(0.0, 0.0, 5.0)).body;
        pw.step(DT);
        pw.clear();
        assert_eq!(pw.body_count(), 0);
        assert_eq!(pw.step_count(), 0);
        assert_eq!(pw.gravity(), (0.0, 250.0));
        assert!(pw.body_pose(body).is_none());
    }

    #[test]
    fn velocity_and_impulse() {
        let mut pw = PhysicsWorld::new_zero_gravity();
        let body = pw.add_body(&BodyDesc::circle(0.0, 0.0, 5.0).with_velocity(60.0, 0.0)).body;
        assert_eq!(pw.velocity(body), Some((60.0, 0.0)));

        pw.step(DT);
        assert!((pw.body_pose(body).unwrap().x - 1.0).abs() < 1e-3);

        assert!(pw.set_velocity(body, 0.0, 0.0));
        assert!(pw.apply_impulse(body, 0.0, 10.0));
        assert!(pw.velocity(body).unwrap().1 > 0.0);
    }

    #[test]
    fn set_pose_teleports() {
        let mut pw = PhysicsWorld::new_zero_gravity();
        let body = pw.add_body(&BodyDesc::rectangle(0.0, 0.0, 10.0, 10.0)).body;
        assert!(pw.set_pose(body, 50.0, 60.0, 0.5));
        let pose = pw.body_pose(body).unwrap();
        assert!((pose.x - 50.0).abs() < 1e-4);
        assert!((pose.y - 60.0).abs() < 1e-4);
        assert!((pose.angle - 0.5).abs() < 1e-4);
    }

    #[test]
    fn body_at_point_only_finds_dynamic_bodies() {
        let mut pw = PhysicsWorld::new_zero_gravity();
        let wall = pw.add_body(&BodyDesc::rectangle(0.0, 0.0, 100.0, 100.0).fixed()).body;
        let ball = pw.add_body(&BodyDesc::circle(200.0, 200.0, 10.0)).body;

        assert_eq!(pw.body_at_point(205.0, 200.0), Some(ball));
        assert_eq!(pw.body_at_point(10.0, 10.0), None, "{wall} is static");
        assert_eq!(pw.body_at_point(500.0, 500.0), None);
    }

    #[test]
    fn pull_toward_moves_anchor_to_target() {
        let mut pw = PhysicsWorld::new_zero_gravity();
        let body = pw.add_body(&BodyDesc::rectangle(100.0, 100.0, 20.0, 20.0)).body;
        let anchor = pw.to_local_point(body, 100.0, 100.0).unwrap();
        assert_eq!(anchor, (0.0, 0.0));

        for _ in 0..60 {
            pw.pull_toward(body, anchor, (200.0, 100.0), 0.2, DT);
            pw.step(DT);
        }
        let pose = pw.body_pose(body).unwrap();
        assert!((pose.x - 200.0).abs() < 1.0, "x = {}", pose.x);
    }

    #[test]
    fn physics_system_copies_pose_into_transform() {
        let physics = shared(PhysicsWorld::default());
        let link = physics
            .borrow_mut()
            .add_body(&BodyDesc::rectangle(10.0, 10.0, 20.0, 20.0).with_angle(0.25));
        let mut entities = vec![Entity::new("box")
            .with(Transform::new(0.0, 0.0, 20.0, 20.0))
            .with(link)];

        physics.borrow_mut().step(DT);
        let mut system = PhysicsSystem::new(Rc::clone(&physics));
        system.update(&mut entities, DT).unwrap();

        let pose = physics.borrow().body_pose(link.body).unwrap();
        let t = entities[0].get::<Transform>().unwrap();
        assert_eq!((t.x, t.y, t.angle), (pose.x, pose.y, pose.angle));
        assert!(t.y > 10.0);
        // Size is never touched by physics.
        assert_eq!((t.width, t.height), (20.0, 20.0));
    }

    #[test]
    fn physics_system_skips_partial_entities() {
        let physics = shared(PhysicsWorld::default());
        let link = physics.borrow_mut().add_body(&BodyDesc::circle(5.0, 5.0, 5.0));
        let mut entities = vec![
            Entity::new("no-transform").with(link),
            Entity::new("no-physics")
                .with(Transform::new(1.0, 2.0, 3.0, 4.0))
                .with(Visual::rect("#000")),
        ];
        let before = entities.clone();

        PhysicsSystem::new(physics).update(&mut entities, DT).unwrap();
        assert_eq!(entities, before);
    }

    #[test]
    fn transform_writes_do_not_reach_the_body() {
        let physics = shared(PhysicsWorld::new_zero_gravity());
        let link = physics.borrow_mut().add_body(&BodyDesc::circle(50.0, 50.0, 5.0));
        let mut entities = vec![Entity::new("ball").with(Transform::default()).with(link)];

        if let Some(t) = entities[0].get_mut::<Transform>() {
            t.x = 999.0;
        }
        PhysicsSystem::new(Rc::clone(&physics))
            .update(&mut entities, DT)
            .unwrap();
        assert_eq!(entities[0].get::<Transform>().unwrap().x, 50.0);
        assert_eq!(physics.borrow().body_pose(link.body).unwrap().x, 50.0);
    }

    #[test]
    fn removed_body_is_skipped() {
        let physics = shared(PhysicsWorld::default());
        let link = physics.borrow_mut().add_body(&BodyDesc::circle(5.0, 5.0, 5.0));
        physics.borrow_mut().remove_body(link.body);
        let mut entities = vec![Entity::new("ghost")
            .with(Transform::new(40.0, 50.0, 10.0, 10.0))
            .with(link)];

        PhysicsSystem::new(physics).update(&mut entities, DT).unwrap();
        let t = entities[0].get::<Transform>().unwrap();
        assert_eq!((t.x, t.y), (40.0, 50.0));
    }

    #[test]
    fn non_finite_pose_is_a_fault() {
        let physics = shared(PhysicsWorld::new_zero_gravity());
        let link = physics.borrow_mut().add_body(&BodyDesc::circle(5.0, 5.0, 5.0));
        physics.borrow_mut().set_pose(link.body, f64::NAN, 0.0, 0.0);
        let mut entities = vec![Entity::new("nan").with(Transform::default()).with(link)];

        let result = PhysicsSystem::new(physics).update(&mut entities, DT);
        assert!(matches!(result, Err(EcsError::SystemFault { .. })));
    }
}
