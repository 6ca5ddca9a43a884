//! Session tracking for connected players
//!
//! The registry is the only owner of the [`World`]. Everything that touches
//! shared state goes through it while the caller holds the single lock around
//! the registry:
//! - joins and leaves from connection handlers
//! - control updates decoded from client input lines
//! - the broadcast loop's tick, snapshot and fan-out
//!
//! Player ids grow monotonically and are never handed out twice, so a frame
//! queued for a departed player can never reach a newcomer.

use crate::game::World;
use log::{debug, info, warn};
use shared::{encode_line, ControlKey, ProtocolError, ServerMessage, Snapshot, Welcome};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Lines a session may have waiting for its writer before it counts as stalled.
pub const OUTBOUND_CAPACITY: usize = 64;

/// Encoded lines headed for one connection's writer task.
pub type Outbound = mpsc::Sender<Arc<str>>;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("server is full ({0} players)")]
    ServerFull(usize),
    #[error("welcome could not be encoded: {0}")]
    Encode(#[from] ProtocolError),
}

/// A live binding between one connection and one player.
#[derive(Debug)]
pub struct Session {
    pub player_id: u32,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    outbound: Outbound,
}

impl Session {
    pub fn new(player_id: u32, addr: SocketAddr, outbound: Outbound) -> Self {
        Self {
            player_id,
            addr,
            connected_at: Instant::now(),
            outbound,
        }
    }

    /// Queues a line for the writer without waiting.
    ///
    /// Fails once the writer has gone away or has fallen a full queue behind.
    pub fn send(&self, line: Arc<str>) -> bool {
        match self.outbound.try_send(line) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Player {} is {} lines behind, treating as stalled",
                    self.player_id, OUTBOUND_CAPACITY
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

pub struct SessionRegistry {
    sessions: BTreeMap<u32, Session>,
    world: World,
    next_player_id: u32,
    max_players: usize,
}

impl SessionRegistry {
    pub fn new(world: World, max_players: usize) -> Self {
        Self {
            sessions: BTreeMap::new(),
            world,
            next_player_id: 1,
            max_players,
        }
    }

    /// Admits a new connection and spawns its ball.
    ///
    /// The welcome line is queued before the session becomes visible to the
    /// broadcast loop, so it always precedes the first frame.
    pub fn register(&mut self, addr: SocketAddr, outbound: Outbound) -> Result<u32, SessionError> {
        if self.sessions.len() >= self.max_players {
            return Err(SessionError::ServerFull(self.max_players));
        }

        let player_id = self.next_player_id;
        let welcome = encode_line(&ServerMessage::Welcome(Welcome { player_id }))?;
        self.next_player_id += 1;

        let session = Session::new(player_id, addr, outbound);
        if !session.send(Arc::from(welcome)) {
            warn!("Player {} went away before the welcome was queued", player_id);
        }

        self.world.add_player(player_id);
        self.sessions.insert(player_id, session);
        info!("Player {} joined from {}", player_id, addr);

        Ok(player_id)
    }

    /// Applies one key change. Unknown players and unknown keys are ignored.
    pub fn set_control(&mut self, player_id: u32, key: &str, pressed: bool) -> bool {
        let Some(key) = ControlKey::from_wire(key) else {
            debug!("Ignoring unknown key {:?} from player {}", key, player_id);
            return false;
        };
        self.world.set_control(player_id, key, pressed)
    }

    /// Tears down a session and everything the world holds for that player.
    pub fn deregister(&mut self, player_id: u32) -> bool {
        match self.sessions.remove(&player_id) {
            Some(session) => {
                self.world.remove_player(player_id);
                info!(
                    "Player {} left after {:.1}s",
                    player_id,
                    session.connected_at.elapsed().as_secs_f32()
                );
                true
            }
            None => false,
        }
    }

    /// Runs one engine tick and returns the resulting snapshot.
    pub fn tick(&mut self) -> Snapshot {
        let events = self.world.tick();
        self.world.snapshot(events)
    }

    /// Hands a line to every session and returns the ids whose writer is gone
    /// or stalled.
    ///
    /// Nothing is removed here; callers deregister the returned ids once the
    /// pass is over.
    pub fn deliver(&self, line: &Arc<str>) -> Vec<u32> {
        self.sessions
            .values()
            .filter(|session| !session.send(Arc::clone(line)))
            .map(|session| session.player_id)
            .collect()
    }

    pub fn contains(&self, player_id: u32) -> bool {
        self.sessions.contains_key(&player_id)
    }

    pub fn player_ids(&self) -> Vec<u32> {
        self.sessions.keys().copied().collect()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
