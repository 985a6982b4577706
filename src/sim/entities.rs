//! Entity data model
//!
//! Plain-data records for everything the simulation tracks: the player,
//! zombies, bullets and blood spills. These types know nothing about
//! physics bodies or rendering; the controller syncs them from the world
//! after each step and the renderer reads them back.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::pool::Poolable;

/// How long a knockback impulse keeps acting, in seconds
pub const KNOCKBACK_WINDOW: f32 = 0.090;

/// Decaying push applied on top of an entity's own velocity.
///
/// Starts at the set magnitude and falls off as
/// `magnitude * (1 - sqrt(elapsed / window))`; once the window has passed
/// it clears itself. Zero magnitude or no direction means no knockback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Knockback {
    magnitude: f32,
    direction: Option<Vec2>,
    elapsed: f32,
}

impl Knockback {
    /// Start a new knockback along `direction` (unit vector).
    pub fn set(&mut self, magnitude: f32, direction: Vec2) {
        self.magnitude = magnitude;
        self.direction = Some(direction);
        self.elapsed = 0.0;
    }

    /// Advance the timer and return the velocity to add this frame.
    pub fn vector(&mut self, dt: f32) -> Option<Vec2> {
        let direction = self.direction?;
        if self.magnitude == 0.0 {
            return None;
        }
        self.elapsed += dt;
        if self.elapsed > KNOCKBACK_WINDOW {
            self.magnitude = 0.0;
            self.direction = None;
            return None;
        }
        let value = self.magnitude * (1.0 - (self.elapsed / KNOCKBACK_WINDOW).sqrt());
        Some(direction * value)
    }

    pub fn is_active(&self) -> bool {
        self.magnitude != 0.0 && self.direction.is_some()
    }
}

/// Position/orientation data shared by every entity kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityState {
    /// Position in world meters
    pub pos: Vec2,
    /// Rotation in radians
    pub rotation: f32,
    /// Set when the end-of-tick sweep should destroy this entity
    pub flagged_for_removal: bool,
    pub knockback: Knockback,
}

impl EntityState {
    pub fn new(pos: Vec2, rotation: f32) -> Self {
        Self {
            pos,
            rotation,
            ..Default::default()
        }
    }
}

/// Weapons the player can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Weapon {
    #[default]
    Rifle,
    Pistol,
    Knife,
}

/// States the player may be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayerState {
    #[default]
    Idle,
    Move,
    Reload,
    Shoot,
}

/// Rifle magazine capacity
pub const MAX_RIFLE_AMMO: u32 = 30;
/// Pistol magazine capacity
pub const MAX_PISTOL_AMMO: u32 = 15;
/// Player starting (and maximum) health
pub const PLAYER_MAX_HEALTH: f32 = 100.0;
/// Damage a knife hit deals
pub const KNIFE_DAMAGE: f32 = 125.0;

/// Seconds without taking damage before health starts regenerating
const REGEN_DELAY: f32 = 3.0;
/// Health points regained per second once regeneration kicks in
const REGEN_RATE: f32 = 10.0;

/// The local player.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerModel {
    pub entity: EntityState,
    pub weapon: Weapon,
    pub state: PlayerState,
    /// Seconds since the current animation state began
    pub state_time: f32,
    /// Seconds of accumulated movement, drives the walk cycle
    pub move_state_time: f32,
    pub rifle_ammo: u32,
    pub pistol_ammo: u32,
    pub health: f32,
    /// Whether movement input is currently applied (footstep loop signal)
    pub walking: bool,
    time_since_damage: f32,
}

impl PlayerModel {
    pub fn new(pos: Vec2, rotation: f32) -> Self {
        Self {
            entity: EntityState::new(pos, rotation),
            weapon: Weapon::Rifle,
            state: PlayerState::Idle,
            state_time: 0.0,
            move_state_time: 0.0,
            rifle_ammo: MAX_RIFLE_AMMO,
            pistol_ammo: MAX_PISTOL_AMMO,
            health: PLAYER_MAX_HEALTH,
            walking: false,
            time_since_damage: 0.0,
        }
    }

    /// Dead at zero health, inclusive.
    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// Damage is ignored once dead.
    pub fn take_damage(&mut self, damage: f32) {
        if self.is_dead() {
            return;
        }
        self.time_since_damage = 0.0;
        self.health -= damage;
    }

    /// Regain health after going unharmed for a while.
    pub fn regenerate(&mut self, dt: f32) {
        self.time_since_damage += dt;
        if self.time_since_damage > REGEN_DELAY {
            if self.is_dead() {
                return;
            }
            self.health = (self.health + dt * REGEN_RATE).min(PLAYER_MAX_HEALTH);
        }
    }

    pub fn fire_rifle(&mut self) {
        if self.rifle_ammo > 0 {
            self.rifle_ammo -= 1;
        }
    }

    pub fn fire_pistol(&mut self) {
        if self.pistol_ammo > 0 {
            self.pistol_ammo -= 1;
        }
    }

    pub fn replenish_rifle_ammo(&mut self) {
        self.rifle_ammo = MAX_RIFLE_AMMO;
    }

    pub fn replenish_pistol_ammo(&mut self) {
        self.pistol_ammo = MAX_PISTOL_AMMO;
    }

    pub fn reset_state_time(&mut self) {
        self.state_time = 0.0;
    }

    /// Animation clock; frozen once dead.
    pub fn advance_state_time(&mut self, dt: f32) {
        if !self.is_dead() {
            self.state_time += dt;
        }
    }
}

/// Zombie size classes; everything about a zombie scales off its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ZombieSize {
    Small,
    #[default]
    Medium,
    Big,
}

impl ZombieSize {
    /// Starting health
    pub fn health(self) -> f32 {
        match self {
            ZombieSize::Small => 60.0,
            ZombieSize::Medium => 100.0,
            ZombieSize::Big => 200.0,
        }
    }

    /// Walk speed in m/s
    pub fn speed(self) -> f32 {
        match self {
            ZombieSize::Small => 8.0,
            ZombieSize::Medium => 4.0,
            ZombieSize::Big => 2.0,
        }
    }

    /// Contact damage dealt per attack
    pub fn damage(self) -> f32 {
        match self {
            ZombieSize::Small => 10.0,
            ZombieSize::Medium => 20.0,
            ZombieSize::Big => 30.0,
        }
    }
}

/// States a zombie may be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZombieState {
    Idle,
    Move,
    Attack,
}

/// Seconds between zombie melee attacks
pub const ZOMBIE_ATTACK_COOLDOWN: f32 = 1.0;
/// Bounds for the randomized growl timer, in seconds
pub const GROWL_MIN_SECS: f32 = 5.0;
pub const GROWL_MAX_SECS: f32 = 35.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZombieModel {
    pub entity: EntityState,
    pub size: ZombieSize,
    pub state: ZombieState,
    /// Seconds since the current animation state began
    pub state_time: f32,
    pub health: f32,
    /// Counts down to the next allowed attack; negative means ready
    pub time_to_next_attack: f32,
    time_to_next_growl: f32,
    growl_pending: bool,
}

impl Default for ZombieModel {
    fn default() -> Self {
        Self::new(Vec2::ZERO, 0.0, ZombieSize::default())
    }
}

impl ZombieModel {
    pub fn new(pos: Vec2, rotation: f32, size: ZombieSize) -> Self {
        Self {
            entity: EntityState::new(pos, rotation),
            size,
            state: ZombieState::Move,
            state_time: 0.0,
            health: size.health(),
            time_to_next_attack: ZOMBIE_ATTACK_COOLDOWN,
            time_to_next_growl: 0.0,
            growl_pending: false,
        }
    }

    /// No dead-guard here: zombie health goes as negative as the damage
    /// takes it, and removal triggers on strictly negative health.
    pub fn take_damage(&mut self, damage: f32) {
        self.health -= damage;
    }

    /// Point this zombie at a target position.
    pub fn face_towards(&mut self, target: Vec2) {
        let delta = target - self.entity.pos;
        self.entity.rotation = delta.y.atan2(delta.x);
    }

    pub fn tick_attack_cooldown(&mut self, dt: f32) {
        self.time_to_next_attack -= dt;
    }

    pub fn can_attack(&self) -> bool {
        self.time_to_next_attack < 0.0
    }

    pub fn reset_attack_cooldown(&mut self) {
        self.time_to_next_attack = ZOMBIE_ATTACK_COOLDOWN;
    }

    /// Flag this zombie for the end-of-tick sweep.
    pub fn kill(&mut self) {
        self.entity.flagged_for_removal = true;
    }

    /// Advance the animation clock and the growl countdown. Returns true
    /// when a growl fell due; the caller re-arms with [`set_growl_timer`].
    ///
    /// [`set_growl_timer`]: ZombieModel::set_growl_timer
    pub fn advance_state_time(&mut self, dt: f32) -> bool {
        self.state_time += dt;
        if self.time_to_next_growl <= 0.0 {
            self.growl_pending = true;
            true
        } else {
            self.time_to_next_growl -= dt;
            false
        }
    }

    pub fn set_growl_timer(&mut self, seconds: f32) {
        self.time_to_next_growl = seconds;
    }

    /// The audio layer polls this each frame; reading clears the flag.
    pub fn take_growl(&mut self) -> bool {
        std::mem::take(&mut self.growl_pending)
    }
}

impl Poolable for ZombieModel {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Damage a rifle bullet deals
pub const RIFLE_BULLET_DAMAGE: f32 = 30.0;
/// Damage a pistol bullet deals
pub const PISTOL_BULLET_DAMAGE: f32 = 50.0;

/// A projectile in flight. Knives never produce one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulletModel {
    pub entity: EntityState,
    /// Gun that fired this bullet
    pub gun: Weapon,
}

impl BulletModel {
    pub fn damage(&self) -> f32 {
        match self.gun {
            Weapon::Rifle => RIFLE_BULLET_DAMAGE,
            Weapon::Pistol => PISTOL_BULLET_DAMAGE,
            Weapon::Knife => 0.0,
        }
    }
}

impl Poolable for BulletModel {
    fn reset(&mut self) {
        self.entity.pos = Vec2::ZERO;
        self.entity.flagged_for_removal = false;
    }
}

/// Seconds a blood spill stays on the floor
pub const SPILL_TIME: f32 = 10.0;

/// Decorative blood left where a zombie died. No physics body; the
/// controller ages it out directly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BloodSpillModel {
    pub entity: EntityState,
    pub time_since_spill: f32,
    /// Size of the zombie that bled; the renderer scales the decal off it
    pub zombie_size: ZombieSize,
}

impl BloodSpillModel {
    /// Age the spill; flags itself for removal once stale.
    pub fn update_spill_time(&mut self, dt: f32) {
        self.time_since_spill += dt;
        if self.time_since_spill > SPILL_TIME {
            self.entity.flagged_for_removal = true;
        }
    }
}

impl Poolable for BloodSpillModel {
    fn reset(&mut self) {
        self.entity.pos = Vec2::ZERO;
        self.entity.flagged_for_removal = false;
        self.time_since_spill = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_knockback_full_strength_at_start() {
        let mut kb = Knockback::default();
        kb.set(10.0, Vec2::X);
        let v = kb.vector(0.0).expect("knockback just set");
        assert!((v.length() - 10.0).abs() < 1e-4);
        assert!(v.y.abs() < 1e-6);
    }

    #[test]
    fn test_knockback_expires_past_window() {
        let mut kb = Knockback::default();
        kb.set(10.0, Vec2::X);
        assert!(kb.vector(KNOCKBACK_WINDOW + 0.001).is_none());
        assert!(!kb.is_active());
        // Stays cleared on later queries
        assert!(kb.vector(0.01).is_none());
    }

    #[test]
    fn test_knockback_curve_midpoint() {
        let mut kb = Knockback::default();
        kb.set(8.0, Vec2::Y);
        let t = 0.045;
        let v = kb.vector(t).expect("inside the window");
        let expected = 8.0 * (1.0 - (t / KNOCKBACK_WINDOW).sqrt());
        assert!((v.length() - expected).abs() < 1e-4);
    }

    #[test]
    fn test_knockback_inactive_without_direction() {
        let mut kb = Knockback::default();
        assert!(kb.vector(0.016).is_none());
    }

    proptest! {
        #[test]
        fn knockback_follows_decay_curve(magnitude in 1.0f32..20.0, t in 0.0f32..0.089) {
            let mut kb = Knockback::default();
            kb.set(magnitude, Vec2::X);
            let v = kb.vector(t).expect("inside the window");
            let expected = magnitude * (1.0 - (t / KNOCKBACK_WINDOW).sqrt());
            prop_assert!((v.length() - expected).abs() < 1e-3);
            prop_assert!(v.length() <= magnitude + 1e-3);
        }

        #[test]
        fn knockback_gone_after_window(magnitude in 1.0f32..20.0, t in 0.091f32..2.0) {
            let mut kb = Knockback::default();
            kb.set(magnitude, Vec2::X);
            prop_assert!(kb.vector(t).is_none());
            prop_assert!(!kb.is_active());
        }
    }

    #[test]
    fn test_player_ammo_consumption() {
        let mut player = PlayerModel::new(Vec2::ZERO, 0.0);
        for expected in (0..=MAX_RIFLE_AMMO).rev() {
            assert_eq!(player.rifle_ammo, expected);
            player.fire_rifle();
        }
        // Empty magazine stays empty
        player.fire_rifle();
        assert_eq!(player.rifle_ammo, 0);
        player.replenish_rifle_ammo();
        assert_eq!(player.rifle_ammo, MAX_RIFLE_AMMO);

        for expected in (0..=MAX_PISTOL_AMMO).rev() {
            assert_eq!(player.pistol_ammo, expected);
            player.fire_pistol();
        }
        player.fire_pistol();
        assert_eq!(player.pistol_ammo, 0);
        player.replenish_pistol_ammo();
        assert_eq!(player.pistol_ammo, MAX_PISTOL_AMMO);
    }

    #[test]
    fn test_player_death_is_inclusive_and_final() {
        let mut player = PlayerModel::new(Vec2::ZERO, 0.0);
        player.take_damage(PLAYER_MAX_HEALTH);
        assert_eq!(player.health, 0.0);
        assert!(player.is_dead());
        // Dead players take no further damage
        player.take_damage(50.0);
        assert_eq!(player.health, 0.0);
    }

    #[test]
    fn test_player_regeneration() {
        let mut player = PlayerModel::new(Vec2::ZERO, 0.0);
        player.take_damage(50.0);
        // Nothing back during the delay window
        player.regenerate(2.9);
        assert_eq!(player.health, 50.0);
        // One full second of regen once past it
        player.regenerate(0.2);
        for _ in 0..10 {
            player.regenerate(0.1);
        }
        assert!(player.health > 50.0);
        assert!(player.health < PLAYER_MAX_HEALTH);
        // Caps at max
        player.regenerate(100.0);
        assert_eq!(player.health, PLAYER_MAX_HEALTH);
    }

    #[test]
    fn test_no_regeneration_while_dead() {
        let mut player = PlayerModel::new(Vec2::ZERO, 0.0);
        player.take_damage(150.0);
        player.regenerate(100.0);
        assert!(player.is_dead());
    }

    #[test]
    fn test_zombie_size_tables() {
        assert_eq!(ZombieSize::Small.health(), 60.0);
        assert_eq!(ZombieSize::Medium.health(), 100.0);
        assert_eq!(ZombieSize::Big.health(), 200.0);
        assert_eq!(ZombieSize::Small.speed(), 8.0);
        assert_eq!(ZombieSize::Medium.speed(), 4.0);
        assert_eq!(ZombieSize::Big.speed(), 2.0);
        assert_eq!(ZombieSize::Small.damage(), 10.0);
        assert_eq!(ZombieSize::Medium.damage(), 20.0);
        assert_eq!(ZombieSize::Big.damage(), 30.0);
    }

    #[test]
    fn test_zombie_damage_has_no_floor() {
        let mut zombie = ZombieModel::new(Vec2::ZERO, 0.0, ZombieSize::Small);
        zombie.take_damage(60.0);
        assert_eq!(zombie.health, 0.0);
        zombie.take_damage(5.0);
        assert_eq!(zombie.health, -5.0);
    }

    #[test]
    fn test_zombie_faces_target() {
        let mut zombie = ZombieModel::new(Vec2::new(1.0, 1.0), 0.0, ZombieSize::Medium);
        zombie.face_towards(Vec2::new(1.0, 5.0));
        assert!((zombie.entity.rotation - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn test_zombie_attack_cooldown() {
        let mut zombie = ZombieModel::new(Vec2::ZERO, 0.0, ZombieSize::Big);
        assert!(!zombie.can_attack());
        zombie.tick_attack_cooldown(1.5);
        assert!(zombie.can_attack());
        zombie.reset_attack_cooldown();
        assert!(!zombie.can_attack());
    }

    #[test]
    fn test_bullet_damage_per_gun() {
        let mut bullet = BulletModel::default();
        bullet.gun = Weapon::Pistol;
        assert_eq!(bullet.damage(), PISTOL_BULLET_DAMAGE);
        bullet.gun = Weapon::Rifle;
        assert_eq!(bullet.damage(), RIFLE_BULLET_DAMAGE);
    }

    #[test]
    fn test_blood_spill_ages_out() {
        let mut spill = BloodSpillModel::default();
        spill.update_spill_time(9.9);
        assert!(!spill.entity.flagged_for_removal);
        spill.update_spill_time(0.2);
        assert!(spill.entity.flagged_for_removal);
    }
}
