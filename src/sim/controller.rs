//! Simulation controller
//!
//! [`Game`] owns the physics world and everything living in it. The shell
//! calls [`Game::update`] once per frame with the wall-clock delta; the
//! controller drains it in fixed 1/60 s steps, resolves combat after each
//! step, then runs per-tick bookkeeping in a fixed order: removal sweep
//! (top of update), body sync, state-timer expiry, regeneration, blood
//! spill aging. Later stages read state the earlier ones wrote, so the
//! order is load-bearing.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use rapier2d::prelude::{RigidBodyHandle, RigidBodyType, vector};

use crate::consts::*;

use super::bodies::{self, BodyTag, PhysicsWorld, PlayerHandles};
use super::combat;
use super::entities::{
    BloodSpillModel, BulletModel, GROWL_MAX_SECS, GROWL_MIN_SECS, MAX_PISTOL_AMMO, MAX_RIFLE_AMMO,
    PlayerModel, PlayerState, Weapon, ZombieModel, ZombieSize,
};
use super::pool::Pool;
use super::rounds::{Difficulty, MatchPhase, RoundManager, SPAWN_CLEARANCE_SQ, ZOMBIE_SPAWNS};

/// Sink for the final score; notified once when the player dies.
pub trait ScoreReporter {
    fn player_died(&mut self, kills: u32);
}

/// Where the player starts a fresh match.
const PLAYER_SPAWN: Vec2 = Vec2::new(50.0, 100.0);

/// Crosshair-to-muzzle squared distances bounding the aim anchor blend:
/// full muzzle weight above the upper bound, none below the lower bound,
/// linear in between.
const AIM_BLEND_UPPER_SQ: f32 = 15.0;
const AIM_BLEND_LOWER_SQ: f32 = 9.0;

/// Fraction of the knife swing remaining at which the hit sensor arms.
const KNIFE_SENSOR_ARM_FRACTION: f32 = 0.6;
/// Fraction of the knife swing remaining below which hits stop landing.
const KNIFE_HIT_CUTOFF_FRACTION: f32 = 0.3;

/// One running match: the physics world, every entity model, round state
/// and the public API the input layer drives.
pub struct Game {
    pub player: PlayerModel,
    pub zombies: Pool<ZombieModel>,
    pub bullets: Pool<BulletModel>,
    pub blood_spills: Pool<BloodSpillModel>,
    physics: PhysicsWorld,
    player_handles: PlayerHandles,
    rounds: RoundManager,
    rng: Pcg32,
    accumulator: f32,
    time_to_next_shot: f32,
    time_to_next_state: f32,
    kills: u32,
    death_reported: bool,
    score_reporter: Option<Box<dyn ScoreReporter>>,
}

impl Game {
    /// Fresh match. The seed drives every random decision (spawn sizes,
    /// growl timers), so identical seeds replay identical spawn rolls.
    pub fn new(seed: u64) -> Self {
        let mut physics = PhysicsWorld::new();
        let player = PlayerModel::new(PLAYER_SPAWN, 0.0);
        let player_handles = bodies::create_player_body(&mut physics, &player);
        log::info!("new game (seed {seed})");
        Self {
            player,
            zombies: Pool::new(),
            bullets: Pool::new(),
            blood_spills: Pool::new(),
            physics,
            player_handles,
            rounds: RoundManager::new(Difficulty::default()),
            rng: Pcg32::seed_from_u64(seed),
            accumulator: 0.0,
            time_to_next_shot: -1.0,
            time_to_next_state: -1.0,
            kills: 0,
            death_reported: false,
            score_reporter: None,
        }
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.rounds.difficulty = difficulty;
    }

    /// Install the sink that receives the kill count on player death.
    pub fn set_score_reporter(&mut self, reporter: Box<dyn ScoreReporter>) {
        self.score_reporter = Some(reporter);
    }

    pub fn current_round(&self) -> u32 {
        self.rounds.round
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    /// The round is clear once its quota has been fully spawned and no
    /// zombie is left standing. The shell drives phase transitions off
    /// this.
    pub fn round_cleared(&self) -> bool {
        self.rounds.quota_exhausted() && self.zombies.is_empty()
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    /// Escape hatch for shells and tests that need the raw world.
    pub fn physics_mut(&mut self) -> &mut PhysicsWorld {
        &mut self.physics
    }

    /// Player body/fixture handles (muzzle lookups, knife sensor).
    pub fn player_handles(&self) -> &PlayerHandles {
        &self.player_handles
    }

    /// Body handle of a live zombie.
    pub fn zombie_body(&self, key: u32) -> Option<RigidBodyHandle> {
        self.physics
            .bodies
            .iter()
            .find(|(_, body)| BodyTag::decode(body.user_data) == Some(BodyTag::Zombie(key)))
            .map(|(handle, _)| handle)
    }

    /// Inject one static wall rectangle; the map loader calls this before
    /// the first update.
    pub fn add_map_wall(&mut self, center: Vec2, half_extents: Vec2) {
        bodies::create_map_wall(&mut self.physics, center, half_extents);
    }

    /// Full reset: destroy every entity body (static map geometry stays),
    /// respawn the player, rewind to round 1.
    pub fn start_new_game(&mut self) {
        let tagged: Vec<RigidBodyHandle> = self
            .physics
            .bodies
            .iter()
            .filter(|(_, body)| BodyTag::decode(body.user_data).is_some())
            .map(|(handle, _)| handle)
            .collect();
        for handle in tagged {
            self.physics.remove_body(handle);
        }
        self.zombies.clear();
        self.bullets.clear();
        self.blood_spills.clear();

        self.player = PlayerModel::new(PLAYER_SPAWN, 0.0);
        self.player_handles = bodies::create_player_body(&mut self.physics, &self.player);

        self.rounds.reset();
        self.kills = 0;
        self.death_reported = false;
        self.accumulator = 0.0;
        self.time_to_next_shot = -1.0;
        self.time_to_next_state = -1.0;
        log::info!("match reset");
    }

    /// Advance the round counter and arm the next spawn quota.
    pub fn start_new_round(&mut self) {
        self.rounds.advance();
        log::info!(
            "round {} begins ({} zombies)",
            self.rounds.round,
            self.rounds.round_total()
        );
    }

    /// Round-driven spawning. Call once per frame with the shell's current
    /// phase; only an active round spawns. The spawn table is scanned in
    /// order and occupied points skip to the next entry.
    pub fn handle_rounds(&mut self, phase: MatchPhase) {
        if phase != MatchPhase::RoundActive {
            return;
        }
        if self.rounds.ensure_quota() == 0 {
            return;
        }
        for point in &ZOMBIE_SPAWNS {
            if self.rounds.quota_exhausted() {
                break;
            }
            if !self.spawn_point_free(point.pos) {
                continue;
            }
            let size = match self.rng.random_range(0..3) {
                0 => ZombieSize::Small,
                1 => ZombieSize::Medium,
                _ => ZombieSize::Big,
            };
            self.spawn_zombie(point.pos, point.facing, size);
            self.rounds.take_spawn();
        }
    }

    /// A spawn point is free when every player and zombie body keeps its
    /// clearance distance.
    fn spawn_point_free(&self, point: Vec2) -> bool {
        self.physics.bodies.iter().all(|(_, body)| {
            match BodyTag::decode(body.user_data) {
                Some(BodyTag::Player | BodyTag::Zombie(_)) => {
                    let t = body.translation();
                    let d = Vec2::new(t.x, t.y) - point;
                    d.length_squared() >= SPAWN_CLEARANCE_SQ
                }
                _ => true,
            }
        })
    }

    /// Add one zombie to the match and the world.
    pub fn spawn_zombie(&mut self, pos: Vec2, rotation: f32, size: ZombieSize) -> u32 {
        let key = self.zombies.obtain();
        let growl = self.rng.random_range(GROWL_MIN_SECS..GROWL_MAX_SECS);
        let zombie = self.zombies.get_mut(key).expect("freshly obtained slot");
        *zombie = ZombieModel::new(pos, rotation, size);
        zombie.set_growl_timer(growl);
        bodies::create_zombie_body(&mut self.physics, key, zombie);
        log::debug!("spawned {size:?} zombie at ({}, {})", pos.x, pos.y);
        key
    }

    /// Advance the simulation by `delta` seconds of wall-clock time.
    pub fn update(&mut self, delta: f32) {
        // Entities flagged last tick go first, so nothing below can touch
        // a body scheduled for destruction.
        self.remove_flagged();

        if !(self.time_to_next_shot < 0.0) {
            self.time_to_next_shot -= delta;
        }
        if !(self.time_to_next_state < 0.0) {
            self.time_to_next_state -= delta;
        }

        let frame_time = delta.min(MAX_FRAME_TIME);
        self.accumulator += frame_time;
        while self.accumulator >= PHYSICS_DT {
            let events = self.physics.step();
            let knife_can_hit =
                self.time_to_next_state >= SHOT_COOLDOWN_KNIFE * KNIFE_HIT_CUTOFF_FRACTION;
            combat::process_collision_events(
                &mut self.physics,
                &events,
                &self.player,
                &mut self.zombies,
                knife_can_hit,
            );
            combat::resolve_active_contacts(
                &mut self.physics,
                &mut self.player,
                &mut self.zombies,
                &mut self.bullets,
            );
            self.accumulator -= PHYSICS_DT;
        }

        self.sync_bodies(delta);
        self.handle_state_expiry();
        self.update_knife_window();
        self.player.regenerate(delta);
        self.age_blood_spills(delta);
    }

    /// Post-step bookkeeping for every live body: pull transforms into the
    /// models, then handle player death, zombie steering and knockback.
    fn sync_bodies(&mut self, delta: f32) {
        let player_pos = self.physics.position(self.player_handles.body);
        let player_dead = self.player.is_dead();

        for (_, body) in self.physics.bodies.iter_mut() {
            let Some(tag) = BodyTag::decode(body.user_data) else {
                continue;
            };
            match tag {
                BodyTag::Player => {
                    let t = body.translation();
                    self.player.entity.pos = Vec2::new(t.x, t.y);
                    self.player.entity.rotation = body.rotation().angle();
                }
                BodyTag::Bullet(key) => {
                    let bullet = self.bullets.get_mut(key).expect("bullet body with no model");
                    let t = body.translation();
                    bullet.entity.pos = Vec2::new(t.x, t.y);
                    bullet.entity.rotation = body.rotation().angle();
                }
                BodyTag::Zombie(key) => {
                    let zombie = self.zombies.get_mut(key).expect("zombie body with no model");
                    let t = body.translation();
                    zombie.entity.pos = Vec2::new(t.x, t.y);
                    zombie.entity.rotation = body.rotation().angle();

                    if zombie.health < 0.0 {
                        // Dead: leave a spill, flag for the next sweep,
                        // count the kill, and stop processing it.
                        let spill_key = self.blood_spills.obtain();
                        let spill = self
                            .blood_spills
                            .get_mut(spill_key)
                            .expect("freshly obtained slot");
                        spill.entity.pos = zombie.entity.pos;
                        spill.zombie_size = zombie.size;
                        zombie.kill();
                        self.kills += 1;
                        continue;
                    }

                    zombie.face_towards(player_pos);
                    body.set_rotation(
                        rapier2d::prelude::Rotation::new(zombie.entity.rotation),
                        true,
                    );
                    if player_dead {
                        body.set_linvel(vector![0.0, 0.0], true);
                    } else {
                        let speed = zombie.size.speed();
                        body.set_linvel(
                            vector![
                                speed * zombie.entity.rotation.cos(),
                                speed * zombie.entity.rotation.sin()
                            ],
                            true,
                        );
                    }
                    zombie.tick_attack_cooldown(delta);

                    if let Some(kb) = zombie.entity.knockback.vector(delta) {
                        let v = body.linvel();
                        body.set_linvel(vector![v.x + kb.x, v.y + kb.y], true);
                    }

                    if !player_dead && zombie.advance_state_time(delta) {
                        let next = self.rng.random_range(GROWL_MIN_SECS..GROWL_MAX_SECS);
                        zombie.set_growl_timer(next);
                    }
                }
            }
        }

        // Death is observed here; the latch keeps the report one-shot even
        // though the health check repeats every tick.
        if self.player.is_dead() && !self.death_reported {
            self.death_reported = true;
            log::info!("player died with {} kills", self.kills);
            if let Some(reporter) = &mut self.score_reporter {
                reporter.player_died(self.kills);
            }
        }

        self.player.advance_state_time(delta);
    }

    /// Fires when the SHOOT/RELOAD state timer lapses: disarm the knife
    /// hit-zone, refill the magazine if a reload just finished, drop back
    /// to IDLE.
    fn handle_state_expiry(&mut self) {
        if self.time_to_next_state < 0.0 {
            bodies::disable_knife_sensor(&mut self.physics, self.player_handles.knife_sensor);
            if matches!(self.player.state, PlayerState::Shoot | PlayerState::Reload) {
                if self.player.state == PlayerState::Reload {
                    match self.player.weapon {
                        Weapon::Rifle => self.player.replenish_rifle_ammo(),
                        Weapon::Pistol => self.player.replenish_pistol_ammo(),
                        Weapon::Knife => {}
                    }
                }
                self.player.state = PlayerState::Idle;
                self.player.reset_state_time();
                self.time_to_next_state = f32::MAX;
            }
        }
    }

    /// Arm the knife hit-zone once the swing animation is far enough in.
    fn update_knife_window(&mut self) {
        if self.player.state == PlayerState::Shoot
            && self.player.weapon == Weapon::Knife
            && self.time_to_next_state <= SHOT_COOLDOWN_KNIFE * KNIFE_SENSOR_ARM_FRACTION
        {
            bodies::enable_knife_sensor(&mut self.physics, self.player_handles.knife_sensor);
        }
    }

    fn age_blood_spills(&mut self, delta: f32) {
        let mut expired: Vec<u32> = Vec::new();
        for (key, spill) in self.blood_spills.iter_mut() {
            spill.update_spill_time(delta);
            if spill.entity.flagged_for_removal {
                expired.push(key);
            }
        }
        for key in expired {
            self.blood_spills.free(key);
        }
    }

    /// Destroy the body and model of everything flagged for removal. Runs
    /// at the top of every update, before any body iteration; it is also
    /// public for shells that keep an explicit sweep in their frame order.
    pub fn remove_flagged(&mut self) {
        let flagged: Vec<(RigidBodyHandle, BodyTag)> = self
            .physics
            .bodies
            .iter()
            .filter_map(|(handle, body)| Some((handle, BodyTag::decode(body.user_data)?)))
            .filter(|(_, tag)| match *tag {
                BodyTag::Player => false,
                BodyTag::Zombie(key) => self
                    .zombies
                    .get(key)
                    .is_some_and(|z| z.entity.flagged_for_removal),
                BodyTag::Bullet(key) => self
                    .bullets
                    .get(key)
                    .is_some_and(|b| b.entity.flagged_for_removal),
            })
            .collect();

        for (handle, tag) in flagged {
            self.physics.remove_body(handle);
            match tag {
                BodyTag::Zombie(key) => self.zombies.free(key),
                BodyTag::Bullet(key) => self.bullets.free(key),
                BodyTag::Player => {}
            }
        }
    }

    /// Apply one frame of movement input and aim the player at the
    /// crosshair (already projected to world space by the input layer).
    pub fn process_movement(&mut self, movement_mask: u8, dt: f32, aim: Vec2) {
        self.physics
            .set_linear_velocity(self.player_handles.body, Vec2::ZERO);

        let mut vel = Vec2::ZERO;
        if movement_mask & MOVE_LEFT != 0 {
            vel.x -= PLAYER_MAX_SPEED;
        }
        if movement_mask & MOVE_RIGHT != 0 {
            vel.x += PLAYER_MAX_SPEED;
        }
        if movement_mask & MOVE_UP != 0 {
            vel.y += PLAYER_MAX_SPEED;
        }
        if movement_mask & MOVE_DOWN != 0 {
            vel.y -= PLAYER_MAX_SPEED;
        }

        if vel != Vec2::ZERO {
            vel = vel.normalize() * PLAYER_MAX_SPEED;
            self.physics
                .set_linear_velocity(self.player_handles.body, vel);
            if self.player.state == PlayerState::Idle {
                self.player.state = PlayerState::Move;
                self.player.reset_state_time();
            }
            self.player.move_state_time += dt;
            self.player.walking = !self.player.is_dead();
        } else {
            self.player.walking = false;
            if self.player.state == PlayerState::Move {
                self.player.state = PlayerState::Idle;
                self.player.reset_state_time();
            }
        }

        // Knockback rides on top of the input velocity.
        if !self.player.is_dead() {
            if let Some(kb) = self.player.entity.knockback.vector(dt) {
                self.physics
                    .set_linear_velocity(self.player_handles.body, vel + kb);
            }
        }

        // Aim anchor blends from body center to muzzle with crosshair
        // distance; anchoring hard on the muzzle spins the body endlessly
        // when the crosshair sits on top of it.
        let muzzle = self
            .player_handles
            .muzzle_position(&self.physics, self.player.weapon);
        let distance_sq = aim.distance_squared(muzzle);
        let weight = if distance_sq > AIM_BLEND_UPPER_SQ {
            1.0
        } else if distance_sq < AIM_BLEND_LOWER_SQ {
            0.0
        } else {
            (distance_sq - AIM_BLEND_LOWER_SQ) / (AIM_BLEND_UPPER_SQ - AIM_BLEND_LOWER_SQ)
        };
        let body_pos = self.physics.position(self.player_handles.body);
        let anchor = body_pos + (muzzle - body_pos) * weight;
        let angle = (aim.y - anchor.y).atan2(aim.x - anchor.x);
        self.physics.set_angle(self.player_handles.body, angle);

        self.physics
            .set_angular_velocity(self.player_handles.body, 0.0);
    }

    /// Fire the equipped weapon. Silent no-op while reloading, while the
    /// previous shot's cooldown runs, or with an empty magazine.
    pub fn shoot(&mut self) {
        if self.player.state == PlayerState::Reload {
            return;
        }
        if !(self.time_to_next_shot < 0.0) {
            return;
        }
        match self.player.weapon {
            Weapon::Rifle if self.player.rifle_ammo == 0 => return,
            Weapon::Pistol if self.player.pistol_ammo == 0 => return,
            _ => {}
        }

        if self.player.weapon != Weapon::Knife {
            let muzzle = self
                .player_handles
                .muzzle_position(&self.physics, self.player.weapon);
            let facing = self.physics.angle(self.player_handles.body);

            let key = self.bullets.obtain();
            let bullet = self.bullets.get_mut(key).expect("freshly obtained slot");
            bullet.gun = self.player.weapon;
            bullet.entity.pos = muzzle;
            // Bullet sprites point up: the body sits a quarter turn behind
            // the facing and launches along its local up axis.
            bullet.entity.rotation = facing - std::f32::consts::FRAC_PI_2;
            let handle = bodies::create_bullet_body(&mut self.physics, key, bullet);
            self.physics.set_velocity_along_facing(handle, BULLET_SPEED);
        }

        match self.player.weapon {
            Weapon::Rifle => {
                self.time_to_next_shot = SHOT_COOLDOWN_RIFLE;
                self.time_to_next_state = STATE_TIME_RIFLE;
                self.player.fire_rifle();
            }
            Weapon::Pistol => {
                self.time_to_next_shot = SHOT_COOLDOWN_PISTOL;
                self.time_to_next_state = STATE_TIME_PISTOL;
                self.player.fire_pistol();
            }
            Weapon::Knife => {
                self.time_to_next_shot = SHOT_COOLDOWN_KNIFE;
                self.time_to_next_state = STATE_TIME_KNIFE;
            }
        }

        self.player.state = PlayerState::Shoot;
        self.player.reset_state_time();
    }

    /// Start reloading unless already reloading or the magazine is full.
    pub fn reload(&mut self) {
        if self.player.state == PlayerState::Reload {
            return;
        }
        let needs_reload = match self.player.weapon {
            Weapon::Rifle => self.player.rifle_ammo != MAX_RIFLE_AMMO,
            Weapon::Pistol => self.player.pistol_ammo != MAX_PISTOL_AMMO,
            Weapon::Knife => false,
        };
        if needs_reload {
            self.player.state = PlayerState::Reload;
            self.player.reset_state_time();
            self.time_to_next_state = STATE_TIME_RELOAD;
        }
    }

    /// Equip a specific weapon; no-op when already held.
    pub fn switch_to_weapon(&mut self, weapon: Weapon) {
        if weapon == self.player.weapon {
            return;
        }
        self.player.weapon = weapon;
        self.player.reset_state_time();
        self.player.state = PlayerState::Idle;
    }

    /// Cycle RIFLE→PISTOL→KNIFE→RIFLE (reversed for `next == false`).
    pub fn cycle_weapon(&mut self, next: bool) {
        self.player.weapon = match (self.player.weapon, next) {
            (Weapon::Rifle, true) => Weapon::Pistol,
            (Weapon::Rifle, false) => Weapon::Knife,
            (Weapon::Pistol, true) => Weapon::Knife,
            (Weapon::Pistol, false) => Weapon::Rifle,
            (Weapon::Knife, true) => Weapon::Rifle,
            (Weapon::Knife, false) => Weapon::Pistol,
        };
        self.player.reset_state_time();
        self.player.state = PlayerState::Idle;
    }

    /// Freeze the world in place for the game-over overlay.
    pub fn freeze_bodies(&mut self) {
        for (_, body) in self.physics.bodies.iter_mut() {
            body.set_linvel(vector![0.0, 0.0], false);
            body.set_body_type(RigidBodyType::Fixed, false);
        }
    }
}
