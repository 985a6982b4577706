//! Physics body adapter
//!
//! Bridges entity models onto rapier2d rigid bodies. Hitbox outlines are
//! hand-authored in sprite pixel space; fixture construction centers them
//! on the body origin, flips the vertical axis (pixel rows grow downward,
//! physics space grows upward) and scales by the pixel-to-meter factor.
//! Each body carries a [`BodyTag`] in its `user_data` so collision payloads
//! can be dispatched without touching the model storage.

use std::num::NonZeroUsize;

use glam::Vec2;
use rapier2d::crossbeam;
use rapier2d::prelude::*;

use super::entities::{BulletModel, PlayerModel, Weapon, ZombieModel, ZombieSize};
use crate::consts::{PHYSICS_DT, PIXEL_TO_METER};

/// Collision filter groups partitioning the broad-phase by entity kind.
pub const PLAYER_GROUP: Group = Group::GROUP_1;
pub const ZOMBIE_GROUP: Group = Group::GROUP_2;
pub const BULLET_GROUP: Group = Group::GROUP_3;
pub const MAP_WALL_GROUP: Group = Group::GROUP_4;

/// Velocity-solver iterations per step; fixed by the engine contract, not
/// tunable per call.
const SOLVER_ITERATIONS: NonZeroUsize = NonZeroUsize::new(6).unwrap();

/// Sprite sheet cell the hitbox vertex tables were traced from, in pixels.
const SHEET_WIDTH: f32 = 155.0;
const SHEET_HEIGHT: f32 = 105.0;

/// Fixture material shared by every entity body.
const DENSITY: f32 = 0.5;
const FRICTION: f32 = 0.4;
const RESTITUTION: f32 = 0.5;

// Hitbox outlines, traced in pixels over the sprite sheet.
const PLAYER_VERTICES: [f32; 12] = [
    15.0, 35.0, 30.0, 18.0, 15.0, 96.0, 120.0, 96.0, 120.0, 60.0, 90.0, 18.0,
];
const SMALL_ZOMBIE_VERTICES: [f32; 8] = [35.0, 20.0, 35.0, 90.0, 100.0, 90.0, 100.0, 20.0];
const MEDIUM_ZOMBIE_VERTICES: [f32; 8] = [25.0, 10.0, 25.0, 100.0, 120.0, 100.0, 120.0, 10.0];
const BIG_ZOMBIE_VERTICES: [f32; 8] = [0.0, 10.0, 0.0, 110.0, 120.0, 110.0, 120.0, 10.0];
const BULLET_VERTICES: [f32; 8] = [74.0, 46.0, 79.0, 46.0, 79.0, 59.0, 74.0, 59.0];

// Tiny quads marking weapon reference points on the sprite: where bullets
// leave each barrel, and where the knife tip reaches.
const RIFLE_BARREL_VERTICES: [f32; 8] = [140.0, 72.0, 140.0, 77.0, 145.0, 77.0, 145.0, 72.0];
const PISTOL_BARREL_VERTICES: [f32; 8] = [125.0, 75.0, 125.0, 80.0, 130.0, 80.0, 130.0, 75.0];
const KNIFE_POINT_VERTICES: [f32; 8] = [155.0, 72.0, 155.0, 77.0, 160.0, 77.0, 160.0, 72.0];

/// Payload tag stored in a rigid body's `user_data`. Zero means untagged
/// (static map geometry); every consumer skips untagged bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyTag {
    Player,
    Zombie(u32),
    Bullet(u32),
}

impl BodyTag {
    pub fn encode(self) -> u128 {
        match self {
            BodyTag::Player => 1,
            BodyTag::Zombie(key) => 2 | ((key as u128) << 8),
            BodyTag::Bullet(key) => 3 | ((key as u128) << 8),
        }
    }

    pub fn decode(data: u128) -> Option<BodyTag> {
        let key = (data >> 8) as u32;
        match data & 0xff {
            1 => Some(BodyTag::Player),
            2 => Some(BodyTag::Zombie(key)),
            3 => Some(BodyTag::Bullet(key)),
            _ => None,
        }
    }
}

/// Convert a pixel-space vertex list into body-local physics points:
/// center on the sprite cell, invert y, scale to meters.
fn fixture_points(pixels: &[f32]) -> Vec<Point<Real>> {
    pixels
        .chunks_exact(2)
        .map(|v| {
            let x = (v[0] - SHEET_WIDTH / 2.0) * PIXEL_TO_METER;
            let y = -(v[1] - SHEET_HEIGHT / 2.0) * PIXEL_TO_METER;
            point![x, y]
        })
        .collect()
}

/// Body-local point a vertex table starts at (its first vertex).
fn reference_point(pixels: &[f32]) -> Vec2 {
    let p = fixture_points(pixels)[0];
    Vec2::new(p.x, p.y)
}

fn convex_fixture(pixels: &[f32]) -> ColliderBuilder {
    let points = fixture_points(pixels);
    ColliderBuilder::convex_hull(&points).expect("hitbox vertex table must form a convex polygon")
}

/// Owns the rapier2d world: body and collider sets plus the stepping
/// pipeline. Construction, destruction and stepping all go through here;
/// no other component creates or destroys bodies.
pub struct PhysicsWorld {
    pub bodies: RigidBodySet,
    pub colliders: ColliderSet,
    pub narrow_phase: NarrowPhase,
    pipeline: PhysicsPipeline,
    integration: IntegrationParameters,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    gravity: Vector<Real>,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    /// Top-down world: no gravity.
    pub fn new() -> Self {
        let mut integration = IntegrationParameters::default();
        integration.dt = PHYSICS_DT;
        integration.num_solver_iterations = SOLVER_ITERATIONS;
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            narrow_phase: NarrowPhase::new(),
            pipeline: PhysicsPipeline::new(),
            integration,
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            gravity: vector![0.0, 0.0],
        }
    }

    /// Advance one fixed 1/60 s step and return the collision events it
    /// produced, in the order the engine reported them.
    pub fn step(&mut self) -> Vec<CollisionEvent> {
        let (collision_send, collision_recv) = crossbeam::channel::unbounded::<CollisionEvent>();
        let (force_send, _force_recv) = crossbeam::channel::unbounded::<ContactForceEvent>();
        let events = ChannelEventCollector::new(collision_send, force_send);

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
            &mut self.ccd,
            None,
            &(),
            &events,
        );

        collision_recv.try_iter().collect()
    }

    /// Remove a body and its attached colliders.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    /// Tag carried by a body, if any.
    pub fn tag(&self, handle: RigidBodyHandle) -> Option<BodyTag> {
        BodyTag::decode(self.bodies.get(handle)?.user_data)
    }

    /// Tag carried by a collider's parent body, if any.
    pub fn collider_tag(&self, collider: ColliderHandle) -> Option<BodyTag> {
        let parent = self.colliders.get(collider)?.parent()?;
        self.tag(parent)
    }

    pub fn position(&self, handle: RigidBodyHandle) -> Vec2 {
        let t = self.bodies[handle].translation();
        Vec2::new(t.x, t.y)
    }

    pub fn angle(&self, handle: RigidBodyHandle) -> f32 {
        self.bodies[handle].rotation().angle()
    }

    /// Change the body's angle, keeping its translation.
    pub fn set_angle(&mut self, handle: RigidBodyHandle, angle: f32) {
        self.bodies[handle].set_rotation(Rotation::new(angle), true);
    }

    pub fn set_transform(&mut self, handle: RigidBodyHandle, pos: Vec2, angle: f32) {
        self.bodies[handle].set_position(Isometry::new(vector![pos.x, pos.y], angle), true);
    }

    pub fn linear_velocity(&self, handle: RigidBodyHandle) -> Vec2 {
        let v = self.bodies[handle].linvel();
        Vec2::new(v.x, v.y)
    }

    pub fn set_linear_velocity(&mut self, handle: RigidBodyHandle, velocity: Vec2) {
        self.bodies[handle].set_linvel(vector![velocity.x, velocity.y], true);
    }

    /// Launch along the body's facing: `(-sin θ, cos θ) * speed`, i.e. the
    /// body's local up axis.
    pub fn set_velocity_along_facing(&mut self, handle: RigidBodyHandle, speed: f32) {
        let angle = self.angle(handle);
        self.set_linear_velocity(
            handle,
            Vec2::new(speed * -angle.sin(), speed * angle.cos()),
        );
    }

    pub fn set_angular_velocity(&mut self, handle: RigidBodyHandle, omega: f32) {
        self.bodies[handle].set_angvel(omega, true);
    }

    pub fn apply_force(&mut self, handle: RigidBodyHandle, force: Vec2) {
        self.bodies[handle].add_force(vector![force.x, force.y], true);
    }

    pub fn apply_impulse(&mut self, handle: RigidBodyHandle, impulse: Vec2) {
        self.bodies[handle].apply_impulse(vector![impulse.x, impulse.y], true);
    }
}

/// Handles into the player's body plus its weapon reference fixtures.
#[derive(Debug, Clone)]
pub struct PlayerHandles {
    pub body: RigidBodyHandle,
    /// Sensor at the knife tip; its filter mask is toggled per frame
    pub knife_sensor: ColliderHandle,
    rifle_muzzle: Vec2,
    pistol_muzzle: Vec2,
}

impl PlayerHandles {
    /// World position bullets leave from, for the equipped weapon. With
    /// the knife out this is the body origin.
    pub fn muzzle_position(&self, world: &PhysicsWorld, weapon: Weapon) -> Vec2 {
        let local = match weapon {
            Weapon::Rifle => self.rifle_muzzle,
            Weapon::Pistol => self.pistol_muzzle,
            Weapon::Knife => Vec2::ZERO,
        };
        let p = world.bodies[self.body]
            .position()
            .transform_point(&point![local.x, local.y]);
        Vec2::new(p.x, p.y)
    }
}

/// Create the player's dynamic body: the torso hull plus the knife-tip
/// sensor (disarmed until a swing reaches its active window).
pub fn create_player_body(world: &mut PhysicsWorld, model: &PlayerModel) -> PlayerHandles {
    let body = world.bodies.insert(
        RigidBodyBuilder::dynamic()
            .translation(vector![model.entity.pos.x, model.entity.pos.y])
            .rotation(model.entity.rotation)
            .user_data(BodyTag::Player.encode())
            .build(),
    );

    world.colliders.insert_with_parent(
        convex_fixture(&PLAYER_VERTICES)
            .density(DENSITY)
            .friction(FRICTION)
            .restitution(RESTITUTION)
            .collision_groups(InteractionGroups::new(PLAYER_GROUP, Group::ALL))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build(),
        body,
        &mut world.bodies,
    );

    let knife_sensor = world.colliders.insert_with_parent(
        convex_fixture(&KNIFE_POINT_VERTICES)
            .sensor(true)
            .collision_groups(InteractionGroups::new(PLAYER_GROUP, Group::NONE))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build(),
        body,
        &mut world.bodies,
    );

    PlayerHandles {
        body,
        knife_sensor,
        rifle_muzzle: reference_point(&RIFLE_BARREL_VERTICES),
        pistol_muzzle: reference_point(&PISTOL_BARREL_VERTICES),
    }
}

/// Arm the knife hit-zone: let the sensor see zombie bodies.
pub fn enable_knife_sensor(world: &mut PhysicsWorld, sensor: ColliderHandle) {
    world.colliders[sensor].set_collision_groups(InteractionGroups::new(PLAYER_GROUP, ZOMBIE_GROUP));
}

pub fn disable_knife_sensor(world: &mut PhysicsWorld, sensor: ColliderHandle) {
    world.colliders[sensor].set_collision_groups(InteractionGroups::new(PLAYER_GROUP, Group::NONE));
}

/// Create a zombie's dynamic body sized for its model.
pub fn create_zombie_body(
    world: &mut PhysicsWorld,
    key: u32,
    model: &ZombieModel,
) -> RigidBodyHandle {
    let vertices: &[f32] = match model.size {
        ZombieSize::Small => &SMALL_ZOMBIE_VERTICES,
        ZombieSize::Medium => &MEDIUM_ZOMBIE_VERTICES,
        ZombieSize::Big => &BIG_ZOMBIE_VERTICES,
    };
    let body = world.bodies.insert(
        RigidBodyBuilder::dynamic()
            .translation(vector![model.entity.pos.x, model.entity.pos.y])
            .rotation(model.entity.rotation)
            .user_data(BodyTag::Zombie(key).encode())
            .build(),
    );
    world.colliders.insert_with_parent(
        convex_fixture(vertices)
            .density(DENSITY)
            .friction(FRICTION)
            .restitution(RESTITUTION)
            .collision_groups(InteractionGroups::new(ZOMBIE_GROUP, Group::ALL))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build(),
        body,
        &mut world.bodies,
    );
    body
}

/// Create a bullet's dynamic body. Bullets never collide with the player
/// who fired them.
pub fn create_bullet_body(
    world: &mut PhysicsWorld,
    key: u32,
    model: &BulletModel,
) -> RigidBodyHandle {
    let body = world.bodies.insert(
        RigidBodyBuilder::dynamic()
            .translation(vector![model.entity.pos.x, model.entity.pos.y])
            .rotation(model.entity.rotation)
            .user_data(BodyTag::Bullet(key).encode())
            .build(),
    );
    world.colliders.insert_with_parent(
        convex_fixture(&BULLET_VERTICES)
            .density(DENSITY)
            .friction(FRICTION)
            .restitution(RESTITUTION)
            .collision_groups(InteractionGroups::new(BULLET_GROUP, Group::ALL & !PLAYER_GROUP))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .build(),
        body,
        &mut world.bodies,
    );
    body
}

/// Inject one static wall rectangle on the MAP_WALL group. Walls carry no
/// tag; the resolver ignores them beyond the physical response.
pub fn create_map_wall(world: &mut PhysicsWorld, center: Vec2, half_extents: Vec2) -> RigidBodyHandle {
    let body = world.bodies.insert(
        RigidBodyBuilder::fixed()
            .translation(vector![center.x, center.y])
            .build(),
    );
    world.colliders.insert_with_parent(
        ColliderBuilder::cuboid(half_extents.x, half_extents.y)
            .collision_groups(InteractionGroups::new(MAP_WALL_GROUP, Group::ALL))
            .build(),
        body,
        &mut world.bodies,
    );
    body
}
