use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    player_color, Ball, ControlKey, EventRecord, Food, Snapshot, ARENA_HEIGHT, ARENA_WIDTH,
    RESPAWN_INTERVAL, SPAWN_MARGIN,
};
use std::collections::BTreeMap;

/// Latest known key state of one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlIntent {
    pub forward: bool,
    pub left: bool,
    pub right: bool,
}

impl ControlIntent {
    pub fn set(&mut self, key: ControlKey, pressed: bool) {
        match key {
            ControlKey::Forward => self.forward = pressed,
            ControlKey::TurnLeft => self.left = pressed,
            ControlKey::TurnRight => self.right = pressed,
        }
    }
}

/// The authoritative world: every ball, every player's controls, and the food.
///
/// Balls and controls live in ordered maps so a tick always walks players in
/// ascending id order; that order decides who gets a contested food.
#[derive(Debug, Clone)]
pub struct World {
    frame: u64,
    players: BTreeMap<u32, Ball>,
    controls: BTreeMap<u32, ControlIntent>,
    food: Food,
    rng: StdRng,
}

impl World {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Creates a world whose spawns and respawns are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(mut rng: StdRng) -> Self {
        let food = Food::spawn(&mut rng);
        Self {
            frame: 0,
            players: BTreeMap::new(),
            controls: BTreeMap::new(),
            food,
            rng,
        }
    }

    /// Adds a ball at a random interior spawn point.
    pub fn add_player(&mut self, player_id: u32) {
        let x = self.rng.gen_range(SPAWN_MARGIN..=ARENA_WIDTH - SPAWN_MARGIN);
        let y = self.rng.gen_range(SPAWN_MARGIN..=ARENA_HEIGHT - SPAWN_MARGIN);
        self.add_player_at(player_id, x, y);
    }

    pub fn add_player_at(&mut self, player_id: u32, x: f32, y: f32) {
        let ball = Ball::new(player_color(player_id), x, y);
        info!("Added player {} at ({:.1}, {:.1})", player_id, ball.x, ball.y);
        self.players.insert(player_id, ball);
        self.controls.insert(player_id, ControlIntent::default());
    }

    /// Drops the ball, controls and score of a player. Safe to call twice.
    pub fn remove_player(&mut self, player_id: u32) -> bool {
        let removed = self.players.remove(&player_id).is_some();
        self.controls.remove(&player_id);
        if removed {
            info!("Removed player {}", player_id);
        }
        removed
    }

    /// Updates one key of a player. Unknown players are ignored.
    pub fn set_control(&mut self, player_id: u32, key: ControlKey, pressed: bool) -> bool {
        match self.controls.get_mut(&player_id) {
            Some(intent) => {
                intent.set(key, pressed);
                true
            }
            None => false,
        }
    }

    /// Advances the world by one tick and reports what happened.
    pub fn tick(&mut self) -> EventRecord {
        self.frame += 1;
        let mut events = EventRecord::default();
        let mut collected = false;

        for (player_id, ball) in self.players.iter_mut() {
            let intent = self.controls.get(player_id).copied().unwrap_or_default();

            if intent.forward {
                ball.move_forward();
            } else {
                ball.stop_moving();
            }
            if intent.left {
                ball.turn_left();
            }
            if intent.right {
                ball.turn_right();
            }
            ball.advance();

            // One collection per tick; the respawned food waits for the next one.
            if !collected && ball.touches(&self.food) {
                collected = true;
                ball.score += 1;
                events.record_collision(*player_id);
                self.food.respawn(&mut self.rng);
                debug!(
                    "Frame {}: player {} collected food, score {}",
                    self.frame, player_id, ball.score
                );
            }
        }

        if self.frame % RESPAWN_INTERVAL == 0 {
            self.food.respawn(&mut self.rng);
            events.record_periodic_respawn();
        }

        events
    }

    /// Copies the current state into a snapshot carrying the given events.
    pub fn snapshot(&self, events: EventRecord) -> Snapshot {
        Snapshot {
            frame: self.frame,
            ball: self.players.clone(),
            foods: self.food.clone(),
            events,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn ball(&self, player_id: u32) -> Option<&Ball> {
        self.players.get(&player_id)
    }

    pub fn control(&self, player_id: u32) -> Option<ControlIntent> {
        self.controls.get(&player_id).copied()
    }

    pub fn food(&self) -> &Food {
        &self.food
    }

    /// Moves the food to a fixed spot, bypassing the random respawn.
    pub fn place_food(&mut self, x: f32, y: f32) {
        self.food.x = x;
        self.food.y = y;
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
