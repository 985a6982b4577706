//! Undead Arena - top-down zombie survival simulation
//!
//! Core modules:
//! - `sim`: round/combat simulation over a rapier2d physics world
//!
//! Rendering, HUD, audio, input decoding and map loading are external
//! collaborators: they feed decoded intents into [`sim::Game`] and read the
//! entity models back each frame. The crate itself never blocks, spawns
//! threads or touches I/O.

pub mod sim;

pub use sim::{Difficulty, Game, MatchPhase, ScoreReporter, Weapon};

/// Game configuration constants
pub mod consts {
    /// Fixed physics timestep (60 Hz)
    pub const PHYSICS_DT: f32 = 1.0 / 60.0;
    /// Hard cap on per-frame simulated time; bounds catch-up after a stall
    pub const MAX_FRAME_TIME: f32 = 0.25;
    /// Scale from hand-authored sprite pixels to world meters
    pub const PIXEL_TO_METER: f32 = 0.04;

    /// Player movement speed in m/s
    pub const PLAYER_MAX_SPEED: f32 = 15.0;
    /// Bullet muzzle speed in m/s
    pub const BULLET_SPEED: f32 = 70.0;

    /// Minimum time between consecutive rifle shots in seconds
    pub const SHOT_COOLDOWN_RIFLE: f32 = 0.1;
    /// Minimum time between consecutive pistol shots in seconds
    pub const SHOT_COOLDOWN_PISTOL: f32 = 0.2;
    /// Minimum time between consecutive knife swings in seconds
    pub const SHOT_COOLDOWN_KNIFE: f32 = 0.6;

    /// Duration of the rifle firing animation state
    pub const STATE_TIME_RIFLE: f32 = 0.1;
    /// Duration of the pistol firing animation state
    pub const STATE_TIME_PISTOL: f32 = 0.2;
    /// Duration of the knife swing animation state
    pub const STATE_TIME_KNIFE: f32 = 0.6;
    /// Duration of the reload state
    pub const STATE_TIME_RELOAD: f32 = 0.8;

    /// Movement direction bits accepted by `Game::process_movement`.
    /// Combinable; diagonal movement is normalized to the max speed.
    pub const MOVE_LEFT: u8 = 0x01;
    pub const MOVE_RIGHT: u8 = 0x02;
    pub const MOVE_UP: u8 = 0x04;
    pub const MOVE_DOWN: u8 = 0x08;
}
