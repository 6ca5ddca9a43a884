use log::debug;
use shared::{Ball, Snapshot};
use std::sync::Arc;

/// Client-side cache of the most recent authoritative frame.
///
/// This is what a renderer draws from. Each update swaps in a whole
/// snapshot, so a reader sees either the previous frame or the new one and
/// never a mix of both.
#[derive(Debug, Clone)]
pub struct ClientGameState {
    player_id: u32,
    current: Option<Arc<Snapshot>>,
    frames_applied: u64,
    frames_missed: u64,
}

impl ClientGameState {
    pub fn new(player_id: u32) -> Self {
        Self {
            player_id,
            current: None,
            frames_applied: 0,
            frames_missed: 0,
        }
    }

    /// Replaces the cached state. Frames not newer than the cached one are ignored.
    pub fn update_game_state(&mut self, snapshot: Arc<Snapshot>) -> bool {
        if let Some(current) = &self.current {
            if snapshot.frame <= current.frame {
                debug!(
                    "Ignoring stale frame {} (have {})",
                    snapshot.frame, current.frame
                );
                return false;
            }
            self.frames_missed += snapshot.frame - current.frame - 1;
        }

        self.current = Some(snapshot);
        self.frames_applied += 1;
        true
    }

    pub fn player_id(&self) -> u32 {
        self.player_id
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_deref()
    }

    pub fn frame(&self) -> Option<u64> {
        self.current.as_ref().map(|snapshot| snapshot.frame)
    }

    /// The local player's ball, if it is in the latest frame.
    pub fn my_ball(&self) -> Option<&Ball> {
        self.current()
            .and_then(|snapshot| snapshot.ball.get(&self.player_id))
    }

    /// `(player_id, score)` pairs, best score first, ties by id.
    pub fn scores(&self) -> Vec<(u32, u32)> {
        let mut scores: Vec<(u32, u32)> = self
            .current()
            .map(|snapshot| {
                snapshot
                    .ball
                    .iter()
                    .map(|(id, ball)| (*id, ball.score))
                    .collect()
            })
            .unwrap_or_default();
        scores.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        scores
    }

    pub fn frames_applied(&self) -> u64 {
        self.frames_applied
    }

    /// Frames the server produced that this cache never saw.
    pub fn frames_missed(&self) -> u64 {
        self.frames_missed
    }
}
