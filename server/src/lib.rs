//! # Game Server Library
//!
//! Authoritative server for the two-player food chase. The server owns the
//! only real copy of the world: it advances ball physics on a fixed tick,
//! decides who collected the food, and pushes a full snapshot of the result
//! to every connected client after each tick.
//!
//! ## Architecture
//!
//! ### One World, One Lock
//! All shared state (balls, key states, food, scores and the set of live
//! sessions) sits inside a single [`session::SessionRegistry`] behind one
//! mutex. Connection handlers take the lock to join, leave or change a key;
//! the broadcast loop takes it to tick, snapshot and fan out. Nobody ever
//! sees a half-joined or half-removed player.
//!
//! ### Task Layout
//! - **Accept loop**: accepts TCP connections and spawns a handler per client
//! - **Connection handler**: splits newline-delimited JSON input lines and
//!   forwards key changes into the registry
//! - **Writer**: one per client, drains that client's outbound queue
//! - **Broadcast loop**: ticks the engine at a fixed period and queues the
//!   encoded snapshot for every session
//!
//! Because a single task produces every frame and queues it for all clients
//! in the same pass, every client observes the same strictly increasing
//! sequence of frames.
//!
//! ### Failure Handling
//! A client that closes its socket, errors on read, or whose writer fails is
//! deregistered; its ball vanishes from the next snapshot and nobody else is
//! affected. Outbound queues are bounded, so a client that stops reading
//! fills its queue and is dropped the same way. A malformed input line is
//! logged and skipped.
//!
//! ## Module Organization
//!
//! - [`game`]: the simulation engine ([`game::World`]) and per-player
//!   [`game::ControlIntent`]
//! - [`session`]: join/leave bookkeeping and the single-lock boundary
//! - [`network`]: TCP plumbing, handlers and the broadcast loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), server::BoxError> {
//!     // Two players, 20 ticks per second
//!     let server = Server::bind("0.0.0.0:21002", Duration::from_millis(50), 2).await?;
//!     server.run().await
//! }
//! ```

pub mod game;
pub mod network;
pub mod session;

/// Error type returned by the server's async entry points.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
