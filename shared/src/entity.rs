use crate::{
    ACCELERATION, ARENA_HEIGHT, ARENA_WIDTH, BALL_RADIUS, DECELERATION, FOOD_RADIUS, MAX_SPEED,
    PLAYER_COLORS, TURN_STEP,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Returns the fixed color of a player slot.
pub fn player_color(player_id: u32) -> [u8; 3] {
    let slot = (player_id.max(1) - 1) as usize % PLAYER_COLORS.len();
    PLAYER_COLORS[slot]
}

/// A player-controlled ball.
///
/// The server mutates balls only from inside a tick; the same struct is what
/// clients receive in every snapshot, keyed by player id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ball {
    pub radius: u32,
    pub color: [u8; 3],
    pub x: f32,
    pub y: f32,
    pub speed: f32,
    /// Heading in degrees, always in `[0, 360)`.
    pub direction: f32,
    pub score: u32,
}

impl Ball {
    pub fn new(color: [u8; 3], x: f32, y: f32) -> Self {
        Self {
            radius: BALL_RADIUS,
            color,
            x,
            y,
            speed: 0.0,
            direction: 0.0,
            score: 0,
        }
    }

    pub fn move_forward(&mut self) {
        self.speed = (self.speed + ACCELERATION).min(MAX_SPEED);
    }

    pub fn stop_moving(&mut self) {
        self.speed = (self.speed - DECELERATION).max(0.0);
    }

    pub fn turn_left(&mut self) {
        self.direction = (self.direction + TURN_STEP).rem_euclid(360.0);
    }

    pub fn turn_right(&mut self) {
        self.direction = (self.direction - TURN_STEP).rem_euclid(360.0);
    }

    /// Advances the ball along its heading and keeps the whole circle inside the arena.
    pub fn advance(&mut self) {
        let angle = self.direction.to_radians();
        self.x += self.speed * angle.cos();
        self.y += self.speed * angle.sin();

        let r = self.radius as f32;
        self.x = self.x.clamp(r, ARENA_WIDTH - r);
        self.y = self.y.clamp(r, ARENA_HEIGHT - r);
    }

    pub fn distance_to(&self, food: &Food) -> f32 {
        let dx = self.x - food.x;
        let dy = self.y - food.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn touches(&self, food: &Food) -> bool {
        self.distance_to(food) < (self.radius + food.radius) as f32
    }
}

/// The single shared pickup.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Food {
    pub radius: u32,
    pub x: f32,
    pub y: f32,
}

impl Food {
    pub fn spawn<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut food = Self::at(ARENA_WIDTH / 2.0, ARENA_HEIGHT / 2.0);
        food.respawn(rng);
        food
    }

    pub fn at(x: f32, y: f32) -> Self {
        Self {
            radius: FOOD_RADIUS,
            x,
            y,
        }
    }

    /// Moves the food to a random spot at least two radii away from every edge.
    pub fn respawn<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let margin = (self.radius * 2) as f32;
        self.x = rng.gen_range(margin..=ARENA_WIDTH - margin);
        self.y = rng.gen_range(margin..=ARENA_HEIGHT - margin);
    }
}
