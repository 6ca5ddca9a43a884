//! Types and rules shared by the game server and its clients.
//!
//! The server owns the authoritative simulation, but both sides need the same
//! arena dimensions, the same entity shapes and the same wire format. Keeping
//! them here guarantees the two binaries never disagree about what a frame
//! looks like.

pub mod entity;
pub mod protocol;

pub use entity::{player_color, Ball, Food};
pub use protocol::{
    decode_line, encode_line, ClientMessage, ControlKey, EventRecord, LineBuffer,
    ProtocolError, ServerMessage, Snapshot, Welcome,
};

pub const ARENA_WIDTH: f32 = 800.0;
pub const ARENA_HEIGHT: f32 = 600.0;

pub const BALL_RADIUS: u32 = 15;
pub const FOOD_RADIUS: u32 = 5;

pub const MAX_SPEED: f32 = 10.0;
pub const ACCELERATION: f32 = 1.0;
pub const DECELERATION: f32 = 0.3;
/// Degrees added or removed per turn call.
pub const TURN_STEP: f32 = 5.0;

/// Ticks between periodic food respawns.
pub const RESPAWN_INTERVAL: u64 = 100;
/// Distance from the arena edge inside which new players are never spawned.
pub const SPAWN_MARGIN: f32 = 50.0;

pub const DEFAULT_PORT: u16 = 21002;
pub const DEFAULT_TICK_MS: u64 = 50;

pub const PLAYER_COLORS: [[u8; 3]; 6] = [
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 165, 0],
    [128, 0, 128],
    [0, 255, 255],
];
