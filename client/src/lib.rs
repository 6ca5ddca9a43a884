//! # Game Client Library
//!
//! Client-side half of the food chase. The server is the only authority on
//! where the balls are; a client simply mirrors the latest frame it received
//! and tells the server when one of its keys goes up or down.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! The [`network::Synchronizer`] owns the TCP connection. A background task
//! splits incoming newline-delimited JSON into frames and publishes each one
//! through a `tokio::sync::watch` channel, so the render/input side never
//! waits on the socket. Key changes go out through
//! [`network::Synchronizer::send_input`].
//!
//! ### Game Module (`game`)
//! [`game::ClientGameState`] is the cache a renderer draws from. It swaps in
//! whole snapshots via `update_game_state`, drops stale frames, and offers
//! convenience views such as the local ball and the score table.
//!
//! ### Input Module (`input`)
//! [`input::InputManager`] turns "which keys are held right now" into the
//! minimal list of press/release transitions to send. The
//! [`input::Autopilot`] produces random key combinations for headless runs.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::ClientGameState;
//! use client::input::InputManager;
//! use client::network::Synchronizer;
//!
//! # async fn demo() -> Result<(), client::BoxError> {
//! let mut sync = Synchronizer::connect("127.0.0.1:21002").await?;
//! let mut game = ClientGameState::new(sync.player_id());
//! let mut input = InputManager::new();
//!
//! // Hold forward and turn left.
//! for (key, pressed) in input.update(true, true, false) {
//!     sync.send_input(key, pressed).await?;
//! }
//!
//! while let Some(snapshot) = sync.next_snapshot().await {
//!     game.update_game_state(snapshot);
//!     if let Some(ball) = game.my_ball() {
//!         println!("at ({:.0}, {:.0}) score {}", ball.x, ball.y, ball.score);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod game;
pub mod input;
pub mod network;

/// Error type returned by the client's async entry points.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
