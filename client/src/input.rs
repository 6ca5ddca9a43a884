//! Key state tracking with change detection, plus a random autopilot

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::ControlKey;

/// Remembers which keys are held and reports only the keys that changed.
///
/// Input goes over the wire on the press/release boundary, never once per
/// frame, so the caller sends exactly what `update` returns.
#[derive(Debug, Default)]
pub struct InputManager {
    forward: bool,
    left: bool,
    right: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the currently held keys and returns the transitions.
    pub fn update(&mut self, forward: bool, left: bool, right: bool) -> Vec<(ControlKey, bool)> {
        let mut changes = Vec::new();

        for (key, now) in [
            (ControlKey::Forward, forward),
            (ControlKey::TurnLeft, left),
            (ControlKey::TurnRight, right),
        ] {
            let held = self.slot(key);
            if *held != now {
                *held = now;
                changes.push((key, now));
            }
        }

        changes
    }

    /// Releases every held key, returning the releases to send.
    pub fn release_all(&mut self) -> Vec<(ControlKey, bool)> {
        self.update(false, false, false)
    }

    pub fn is_pressed(&self, key: ControlKey) -> bool {
        match key {
            ControlKey::Forward => self.forward,
            ControlKey::TurnLeft => self.left,
            ControlKey::TurnRight => self.right,
        }
    }

    fn slot(&mut self, key: ControlKey) -> &mut bool {
        match key {
            ControlKey::Forward => &mut self.forward,
            ControlKey::TurnLeft => &mut self.left,
            ControlKey::TurnRight => &mut self.right,
        }
    }
}

/// Key combinations the autopilot picks from: idle, forward, left, right,
/// forward+left, forward+right. `(forward, left, right)`.
pub const AUTOPILOT_COMBOS: [(bool, bool, bool); 6] = [
    (false, false, false),
    (true, false, false),
    (false, true, false),
    (false, false, true),
    (true, true, false),
    (true, false, true),
];

/// Drives a headless client with uniformly random key combinations.
#[derive(Debug)]
pub struct Autopilot {
    rng: StdRng,
}

impl Autopilot {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_keys(&mut self) -> (bool, bool, bool) {
        AUTOPILOT_COMBOS[self.rng.gen_range(0..AUTOPILOT_COMBOS.len())]
    }
}

impl Default for Autopilot {
    fn default() -> Self {
        Self::new()
    }
}
