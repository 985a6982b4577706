//! Round and spawn management
//!
//! Each round hands the spawner a quota of `round × per-difficulty
//! constant` zombies. Every active tick the fixed spawn table is scanned
//! in declaration order and each free point spawns one zombie until the
//! quota runs dry; occupied points simply skip to the next entry.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Match difficulty; scales the zombies-per-round quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    /// Zombies added to the quota per round number.
    pub fn zombies_per_round(self) -> u32 {
        match self {
            Difficulty::Easy => 8,
            Difficulty::Normal => 13,
            Difficulty::Hard => 20,
        }
    }
}

/// Where the surrounding shell is in the round flow. Spawning only runs
/// while a round is active; the shell drives transitions off
/// [`Game::round_cleared`](super::Game::round_cleared).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    PreRound,
    RoundActive,
    RoundClear,
}

/// A spawn location and the facing spawned zombies start with.
#[derive(Debug, Clone, Copy)]
pub struct SpawnPoint {
    pub pos: Vec2,
    pub facing: f32,
}

/// Spawn locations around the map edge, scanned in this order.
pub const ZOMBIE_SPAWNS: [SpawnPoint; 10] = [
    // Left edge
    SpawnPoint { pos: Vec2::new(14.0, 98.0), facing: 0.0 },
    SpawnPoint { pos: Vec2::new(14.0, 90.0), facing: 0.0 },
    // Bottom edge
    SpawnPoint { pos: Vec2::new(50.0, 70.0), facing: FRAC_PI_2 },
    SpawnPoint { pos: Vec2::new(57.0, 70.0), facing: FRAC_PI_2 },
    SpawnPoint { pos: Vec2::new(84.0, 75.0), facing: FRAC_PI_2 },
    // Right edge
    SpawnPoint { pos: Vec2::new(121.0, 98.0), facing: PI },
    SpawnPoint { pos: Vec2::new(121.0, 90.0), facing: PI },
    // Top edge
    SpawnPoint { pos: Vec2::new(50.0, 148.0), facing: PI * 1.5 },
    SpawnPoint { pos: Vec2::new(58.0, 148.0), facing: PI * 1.5 },
    SpawnPoint { pos: Vec2::new(112.0, 148.0), facing: PI * 1.5 },
];

/// Minimum squared distance (m²) a spawn point must keep from every
/// player and zombie body before it may spawn.
pub const SPAWN_CLEARANCE_SQ: f32 = 36.0;

/// Tracks the current round, its difficulty and the remaining spawn quota.
#[derive(Debug, Clone)]
pub struct RoundManager {
    /// Current round number, starting at 1
    pub round: u32,
    pub difficulty: Difficulty,
    /// Remaining spawns this round; `None` until the first active tick
    /// of the round initializes it.
    pub zombies_left_to_spawn: Option<u32>,
}

impl RoundManager {
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            round: 1,
            difficulty,
            zombies_left_to_spawn: None,
        }
    }

    /// Total zombies this round will spawn.
    pub fn round_total(&self) -> u32 {
        self.round * self.difficulty.zombies_per_round()
    }

    /// Lazily arm the quota on the first active tick, then return it.
    pub fn ensure_quota(&mut self) -> u32 {
        *self
            .zombies_left_to_spawn
            .get_or_insert(self.round_total())
    }

    /// Record one spawn against the quota.
    pub fn take_spawn(&mut self) {
        if let Some(left) = &mut self.zombies_left_to_spawn {
            *left = left.saturating_sub(1);
        }
    }

    /// True once the armed quota has been fully spent.
    pub fn quota_exhausted(&self) -> bool {
        self.zombies_left_to_spawn == Some(0)
    }

    /// Advance to the next round and arm its quota.
    pub fn advance(&mut self) {
        self.round += 1;
        self.zombies_left_to_spawn = Some(self.round_total());
    }

    /// Back to round 1 with an unarmed quota.
    pub fn reset(&mut self) {
        self.round = 1;
        self.zombies_left_to_spawn = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_formula_per_difficulty() {
        for (difficulty, per_round) in [
            (Difficulty::Easy, 8),
            (Difficulty::Normal, 13),
            (Difficulty::Hard, 20),
        ] {
            let mut rounds = RoundManager::new(difficulty);
            for n in 1..=4 {
                rounds.round = n;
                assert_eq!(rounds.round_total(), n * per_round);
            }
        }
    }

    #[test]
    fn test_quota_armed_lazily() {
        let mut rounds = RoundManager::new(Difficulty::Hard);
        assert_eq!(rounds.zombies_left_to_spawn, None);
        assert!(!rounds.quota_exhausted());
        assert_eq!(rounds.ensure_quota(), 20);
        assert_eq!(rounds.zombies_left_to_spawn, Some(20));
        // A second call must not re-arm
        rounds.take_spawn();
        assert_eq!(rounds.ensure_quota(), 19);
    }

    #[test]
    fn test_take_spawn_saturates() {
        let mut rounds = RoundManager::new(Difficulty::Easy);
        rounds.ensure_quota();
        for _ in 0..20 {
            rounds.take_spawn();
        }
        assert!(rounds.quota_exhausted());
    }

    #[test]
    fn test_advance_arms_next_round() {
        let mut rounds = RoundManager::new(Difficulty::Normal);
        rounds.ensure_quota();
        rounds.advance();
        assert_eq!(rounds.round, 2);
        assert_eq!(rounds.zombies_left_to_spawn, Some(26));
        rounds.reset();
        assert_eq!(rounds.round, 1);
        assert_eq!(rounds.zombies_left_to_spawn, None);
    }

    #[test]
    fn test_spawn_table_shape() {
        assert_eq!(ZOMBIE_SPAWNS.len(), 10);
        // Table order is the scan order: left, bottom, right, top
        assert_eq!(ZOMBIE_SPAWNS[0].pos, Vec2::new(14.0, 98.0));
        assert_eq!(ZOMBIE_SPAWNS[9].pos, Vec2::new(112.0, 148.0));
    }
}
