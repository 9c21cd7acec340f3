//! # Chess Client Library
//!
//! A terminal client for the chess server. It reads typed commands, sends
//! them as protocol packets, and prints the lobby, the board and any errors
//! the server reports.
//!
//! ## Architecture Overview
//!
//! The server decides everything; the client never moves a piece on its
//! own. What it does keep is the last state update, which lets it do two
//! checks on every new one:
//!
//! ### Sequence Tracking
//! Each update carries a per-game sequence number. A jump of more than one
//! means updates were missed, and the client says so before drawing the
//! latest board.
//!
//! ### Move Replay
//! The update names the move that produced it. The client replays that move
//! with the shared rules engine and compares the result with the board it
//! was sent.
//!
//! ## Module Organization
//!
//! - `game`: lobby and game state, update checks
//! - `input`: command parsing
//! - `network`: framed TCP connection and the interactive loop
//! - `rendering`: text output for boards, lobby listings and errors
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use chess_client::network::Connection;
//! use chess_shared::Packet;
//!
//! # async fn demo() -> Result<(), chess_shared::ProtocolError> {
//! let mut connection = Connection::connect("127.0.0.1:5006").await?;
//! connection
//!     .send(Packet::CreateGame { name: "Alice".to_string() })
//!     .await?;
//! while let Some(packet) = connection.recv().await? {
//!     println!("{:?}", packet);
//! }
//! # Ok(())
//! # }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
