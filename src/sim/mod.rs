//! Round/combat simulation core
//!
//! All gameplay logic lives here. The module is strictly single-threaded:
//! the shell calls input handling, [`Game::update`] and its render reads in
//! sequence once per frame, and within one update the ordering is fixed —
//! removal sweep, physics steps (with combat resolution after each), body
//! sync, state-timer expiry, regeneration, blood-spill aging.

pub mod bodies;
pub mod combat;
pub mod controller;
pub mod entities;
pub mod pool;
pub mod rounds;

pub use controller::{Game, ScoreReporter};
pub use entities::{
    BloodSpillModel, BulletModel, EntityState, Knockback, PlayerModel, PlayerState, Weapon,
    ZombieModel, ZombieSize, ZombieState,
};
pub use pool::{Pool, Poolable};
pub use rounds::{Difficulty, MatchPhase, RoundManager, SpawnPoint};
