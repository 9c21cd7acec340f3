//! # Chess Server Library
//!
//! The authoritative server for two-player chess over TCP. Players meet in a
//! lobby, one creates a game and takes white, another joins as black, and
//! every move is validated here before both seats see the new position.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Rules
//! Clients only propose moves. The server checks turn order and legality
//! with the shared rules engine and then broadcasts the resulting state,
//! numbered so clients can spot gaps.
//!
//! ### Lobby and Sessions
//! Games waiting for an opponent are listed in creation order. Joining is
//! first come first served: when several clients race for the same seat
//! exactly one gets it and the rest are told the game is full.
//!
//! ### Connection Lifecycle
//! A connection that closes, goes quiet past the idle timeout, or sends a
//! malformed frame is cleaned up the same way. Its seat is released and an
//! active game is aborted with the opponent notified.
//!
//! ## Architecture Design
//!
//! One tokio task per connection reads framed packets and calls into the
//! [`registry::SessionRegistry`]. Each session has its own lock, so games
//! run independently of each other. Outbound packets go through a
//! per-connection queue drained by a writer task, which keeps a slow
//! socket from stalling a game.
//!
//! ## Module Organization
//!
//! - `client_manager`: roster of connected clients and lobby broadcasts
//! - `config`: runtime settings
//! - `connection`: per-connection reader loop and packet dispatch
//! - `error`: request failures and their wire error kinds
//! - `network`: TCP listener and shared server context
//! - `registry`: session lookup, lobby listing and membership
//! - `session`: one game between two seats
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use chess_server::config::ServerConfig;
//! use chess_server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server
//!         .run_until(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod connection;
pub mod error;
pub mod network;
pub mod registry;
pub mod session;
