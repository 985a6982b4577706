//! Combat resolution
//!
//! Interprets raw collision data into domain outcomes. Two surfaces feed
//! it after every fixed step: collision start/stop events (knife sensor
//! touches and contact-end cleanup) and the narrow phase's actively
//! touching contact pairs, which fire every step two solids stay in
//! contact — a zombie leaning on the player keeps attacking on cooldown.
//!
//! Untagged bodies (static map geometry) flow through all of this and are
//! skipped without comment. A tagged body whose model slot is gone means
//! the spawn/pool bookkeeping broke, and that asserts.

use std::f32::consts::FRAC_PI_2;

use glam::Vec2;
use rapier2d::prelude::*;

use super::bodies::{BodyTag, PhysicsWorld};
use super::entities::{
    BulletModel, KNIFE_DAMAGE, PlayerModel, PlayerState, Weapon, ZombieModel, ZombieSize,
    ZombieState,
};
use super::pool::Pool;

/// Knockback applied to a zombie hit by a bullet
const BULLET_KNOCKBACK: f32 = 9.0;
/// Knockback applied to a zombie hit by the knife
const KNIFE_KNOCKBACK: f32 = 10.0;

/// Player knockback when a zombie attack lands, by attacker size.
fn attack_knockback(size: ZombieSize) -> f32 {
    match size {
        ZombieSize::Small => 10.0,
        ZombieSize::Medium => 12.0,
        ZombieSize::Big => 14.0,
    }
}

fn unit_from_angle(angle: f32) -> Vec2 {
    Vec2::new(angle.cos(), angle.sin())
}

fn zero_angvel(world: &mut PhysicsWorld, collider: ColliderHandle) {
    if let Some(parent) = world.colliders.get(collider).and_then(|c| c.parent()) {
        if let Some(body) = world.bodies.get_mut(parent) {
            body.set_angvel(0.0, true);
        }
    }
}

/// Handle the collision start/stop events one step produced.
///
/// A sensor start is the knife hit-zone touching something: if the player
/// is mid-swing with the knife and the swing is still inside its damage
/// window, the zombie takes knife damage and knockback along the player's
/// facing. Every contact stop zeroes both bodies' angular velocity to shed
/// residual spin from the discrete solver.
pub fn process_collision_events(
    world: &mut PhysicsWorld,
    events: &[CollisionEvent],
    player: &PlayerModel,
    zombies: &mut Pool<ZombieModel>,
    knife_can_hit: bool,
) {
    for event in events {
        match *event {
            CollisionEvent::Started(a, b, _) => {
                let sensor_involved = [a, b]
                    .iter()
                    .any(|&h| world.colliders.get(h).is_some_and(|c| c.is_sensor()));
                if !sensor_involved {
                    continue;
                }
                zero_angvel(world, a);
                zero_angvel(world, b);

                // The sensor hangs off the player and its filter only
                // admits zombie bodies.
                let zombie_key = match (world.collider_tag(a), world.collider_tag(b)) {
                    (Some(BodyTag::Player), Some(BodyTag::Zombie(key)))
                    | (Some(BodyTag::Zombie(key)), Some(BodyTag::Player)) => key,
                    _ => continue,
                };

                if player.weapon == Weapon::Knife
                    && player.state == PlayerState::Shoot
                    && knife_can_hit
                {
                    let zombie = zombies
                        .get_mut(zombie_key)
                        .expect("knife sensor touched a zombie body with no model");
                    zombie
                        .entity
                        .knockback
                        .set(KNIFE_KNOCKBACK, unit_from_angle(player.entity.rotation));
                    zombie.take_damage(KNIFE_DAMAGE);
                }
            }
            CollisionEvent::Stopped(a, b, _) => {
                zero_angvel(world, a);
                zero_angvel(world, b);
            }
        }
    }
}

/// Interpret every actively touching contact pair. Runs after each step,
/// for as long as two solids overlap.
pub fn resolve_active_contacts(
    world: &mut PhysicsWorld,
    player: &mut PlayerModel,
    zombies: &mut Pool<ZombieModel>,
    bullets: &mut Pool<BulletModel>,
) {
    // Snapshot the touching pairs first; resolution mutates body state.
    let pairs: Vec<(
        RigidBodyHandle,
        Option<BodyTag>,
        RigidBodyHandle,
        Option<BodyTag>,
    )> = world
        .narrow_phase
        .contact_pairs()
        .filter(|pair| pair.has_any_active_contact)
        .filter_map(|pair| {
            let a = world.colliders.get(pair.collider1)?.parent()?;
            let b = world.colliders.get(pair.collider2)?.parent()?;
            Some((a, world.tag(a), b, world.tag(b)))
        })
        .collect();

    for (body_a, tag_a, body_b, tag_b) in pairs {
        // Bullets are single-hit: the first contact of any kind retires
        // them, and a retired bullet deals no further damage even while
        // its body lingers until the next sweep.
        let fresh_a = retire_bullet(bullets, tag_a);
        let fresh_b = retire_bullet(bullets, tag_b);

        match (tag_a, tag_b) {
            (Some(BodyTag::Bullet(bullet)), Some(BodyTag::Zombie(zombie))) if fresh_a => {
                bullet_hits_zombie(world, body_a, bullet, body_b, zombie, bullets, zombies);
            }
            (Some(BodyTag::Zombie(zombie)), Some(BodyTag::Bullet(bullet))) if fresh_b => {
                bullet_hits_zombie(world, body_b, bullet, body_a, zombie, bullets, zombies);
            }
            (Some(BodyTag::Player), Some(BodyTag::Zombie(zombie))) => {
                zombie_attacks_player(world, body_b, zombie, player, zombies);
            }
            (Some(BodyTag::Zombie(zombie)), Some(BodyTag::Player)) => {
                zombie_attacks_player(world, body_a, zombie, player, zombies);
            }
            _ => {}
        }
    }
}

/// Flag a bullet for removal on any contact. Returns whether the bullet
/// was still unspent before this contact.
fn retire_bullet(bullets: &mut Pool<BulletModel>, tag: Option<BodyTag>) -> bool {
    let Some(BodyTag::Bullet(key)) = tag else {
        return false;
    };
    let bullet = bullets.get_mut(key).expect("bullet body with no model");
    let fresh = !bullet.entity.flagged_for_removal;
    bullet.entity.flagged_for_removal = true;
    fresh
}

#[allow(clippy::too_many_arguments)]
fn bullet_hits_zombie(
    world: &mut PhysicsWorld,
    bullet_body: RigidBodyHandle,
    bullet_key: u32,
    zombie_body: RigidBodyHandle,
    zombie_key: u32,
    bullets: &Pool<BulletModel>,
    zombies: &mut Pool<ZombieModel>,
) {
    let damage = bullets
        .get(bullet_key)
        .expect("bullet body with no model")
        .damage();
    let zombie = zombies
        .get_mut(zombie_key)
        .expect("bullet hit a zombie body with no model");
    zombie.take_damage(damage);
    // Bullet bodies fly along their local up axis, a quarter turn ahead
    // of their stored angle.
    let travel = world.angle(bullet_body) + FRAC_PI_2;
    zombie
        .entity
        .knockback
        .set(BULLET_KNOCKBACK, unit_from_angle(travel));
    world.set_angular_velocity(zombie_body, 0.0);
}

fn zombie_attacks_player(
    world: &mut PhysicsWorld,
    zombie_body: RigidBodyHandle,
    zombie_key: u32,
    player: &mut PlayerModel,
    zombies: &mut Pool<ZombieModel>,
) {
    let zombie = zombies
        .get_mut(zombie_key)
        .expect("player touched a zombie body with no model");
    zombie.state = ZombieState::Attack;

    if zombie.can_attack() {
        player.take_damage(zombie.size.damage());
        zombie.reset_attack_cooldown();
        if !player.is_dead() {
            let facing = world.angle(zombie_body);
            player
                .entity
                .knockback
                .set(attack_knockback(zombie.size), unit_from_angle(facing));
        }
    }
    world.set_angular_velocity(zombie_body, 0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::bodies::create_zombie_body;
    use glam::Vec2;

    #[test]
    fn test_attack_knockback_scales_with_size() {
        assert_eq!(attack_knockback(ZombieSize::Small), 10.0);
        assert_eq!(attack_knockback(ZombieSize::Medium), 12.0);
        assert_eq!(attack_knockback(ZombieSize::Big), 14.0);
    }

    #[test]
    fn test_retire_bullet_single_hit() {
        let mut bullets: Pool<BulletModel> = Pool::new();
        let key = bullets.obtain();
        assert!(retire_bullet(&mut bullets, Some(BodyTag::Bullet(key))));
        assert!(bullets.get(key).unwrap().entity.flagged_for_removal);
        // Already spent: later contacts report stale
        assert!(!retire_bullet(&mut bullets, Some(BodyTag::Bullet(key))));
        // Non-bullet tags are never fresh
        assert!(!retire_bullet(&mut bullets, Some(BodyTag::Player)));
        assert!(!retire_bullet(&mut bullets, None));
    }

    #[test]
    fn test_zombie_attack_respects_cooldown() {
        let mut world = PhysicsWorld::new();
        let mut zombies: Pool<ZombieModel> = Pool::new();
        let key = zombies.obtain();
        *zombies.get_mut(key).unwrap() = ZombieModel::new(Vec2::ZERO, 0.0, ZombieSize::Medium);
        let body = create_zombie_body(
            &mut world,
            key,
            zombies.get(key).unwrap(),
        );
        let mut player = PlayerModel::new(Vec2::new(3.0, 0.0), 0.0);

        // Cooldown not elapsed yet: state flips but no damage lands
        zombie_attacks_player(&mut world, body, key, &mut player, &mut zombies);
        assert_eq!(zombies.get(key).unwrap().state, ZombieState::Attack);
        assert_eq!(player.health, 100.0);

        // Elapsed cooldown: damage plus knockback, cooldown re-armed
        zombies.get_mut(key).unwrap().tick_attack_cooldown(1.5);
        zombie_attacks_player(&mut world, body, key, &mut player, &mut zombies);
        assert_eq!(player.health, 80.0);
        assert!(player.entity.knockback.is_active());
        assert!(!zombies.get(key).unwrap().can_attack());
    }

    #[test]
    fn test_dead_player_gets_no_knockback() {
        let mut world = PhysicsWorld::new();
        let mut zombies: Pool<ZombieModel> = Pool::new();
        let key = zombies.obtain();
        *zombies.get_mut(key).unwrap() = ZombieModel::new(Vec2::ZERO, 0.0, ZombieSize::Big);
        let body = create_zombie_body(
            &mut world,
            key,
            zombies.get(key).unwrap(),
        );
        let mut player = PlayerModel::new(Vec2::new(3.0, 0.0), 0.0);
        player.health = 20.0;
        zombies.get_mut(key).unwrap().tick_attack_cooldown(1.5);

        // The killing blow itself emits no knockback
        zombie_attacks_player(&mut world, body, key, &mut player, &mut zombies);
        assert!(player.is_dead());
        assert!(!player.entity.knockback.is_active());
    }
}
