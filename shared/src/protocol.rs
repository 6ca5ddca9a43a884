//! Newline-delimited JSON wire protocol
//!
//! Every message is one UTF-8 JSON object followed by a single `\n`. The
//! server sends a welcome once per connection and then one full snapshot per
//! tick; clients only ever send key state changes.

use crate::entity::{Ball, Food};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longest line accepted before the peer is considered to be misbehaving.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line exceeds {0} bytes without a delimiter")]
    LineTooLong(usize),
    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// The three keys a player can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlKey {
    Forward,
    TurnLeft,
    TurnRight,
}

impl ControlKey {
    pub const ALL: [ControlKey; 3] = [
        ControlKey::Forward,
        ControlKey::TurnLeft,
        ControlKey::TurnRight,
    ];

    /// Maps a wire key name to a control key; unknown names yield `None`.
    pub fn from_wire(key: &str) -> Option<Self> {
        match key {
            "w" => Some(ControlKey::Forward),
            "a" => Some(ControlKey::TurnLeft),
            "d" => Some(ControlKey::TurnRight),
            _ => None,
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            ControlKey::Forward => "w",
            ControlKey::TurnLeft => "a",
            ControlKey::TurnRight => "d",
        }
    }
}

/// Client to server messages, dispatched on the `"type"` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Input { key: String, state: bool },
}

impl ClientMessage {
    pub fn input(key: ControlKey, pressed: bool) -> Self {
        ClientMessage::Input {
            key: key.as_wire().to_string(),
            state: pressed,
        }
    }
}

/// What happened during a single tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    /// Players that picked up the food this tick, each at most once.
    pub collision: Vec<u32>,
    /// `[1]` when the periodic timer moved the food this tick, otherwise empty.
    pub respawn: Vec<u32>,
}

impl EventRecord {
    pub fn record_collision(&mut self, player_id: u32) {
        if !self.collision.contains(&player_id) {
            self.collision.push(player_id);
        }
    }

    pub fn record_periodic_respawn(&mut self) {
        self.respawn = vec![1];
    }

    pub fn periodic_respawn(&self) -> bool {
        !self.respawn.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.collision.is_empty() && self.respawn.is_empty()
    }
}

/// A complete, self-contained view of the world at one frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub frame: u64,
    /// Balls keyed by player id, ascending.
    pub ball: BTreeMap<u32, Ball>,
    pub foods: Food,
    pub events: EventRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Welcome {
    pub player_id: u32,
}

/// Server to client messages.
///
/// Serialized untagged so the wire carries the bare objects. Decoding goes
/// through [`ServerMessage::decode`] rather than `Deserialize`, because the
/// integer keys of the ball map only survive a direct string parse.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ServerMessage {
    Welcome(Welcome),
    Frame(Snapshot),
}

impl ServerMessage {
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        match serde_json::from_str::<Snapshot>(line) {
            Ok(snapshot) => Ok(ServerMessage::Frame(snapshot)),
            Err(frame_err) => match serde_json::from_str::<Welcome>(line) {
                Ok(welcome) => Ok(ServerMessage::Welcome(welcome)),
                Err(_) => Err(ProtocolError::Json(frame_err)),
            },
        }
    }
}

/// Serializes a message and appends the line delimiter.
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T, ProtocolError> {
    Ok(serde_json::from_str(line)?)
}

/// Accumulates raw bytes from a stream and splits them into lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Returns the next complete, non-blank line without its delimiter.
    ///
    /// `Ok(None)` means more bytes are needed. An error consumes the offending
    /// line (or, for an oversized partial line, everything buffered) so the
    /// caller can keep reading.
    pub fn next_line(&mut self) -> Result<Option<String>, ProtocolError> {
        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else {
                if self.buf.len() > MAX_LINE_BYTES {
                    let len = self.buf.len();
                    self.buf.clear();
                    return Err(ProtocolError::LineTooLong(len));
                }
                return Ok(None);
            };

            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let line = String::from_utf8(line).map_err(|_| ProtocolError::InvalidUtf8)?;
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(line));
        }
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
