//! Wire protocol: the `Packet` enum and its length-delimited frame codec.
//!
//! Each frame is a big-endian `u32` length followed by the bincode encoding
//! of one [`Packet`].

use crate::board::{Board, Color, Piece, Square};
use crate::rules::{GameResult, Move};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

pub type SessionId = u32;

pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Machine-readable error kinds reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    IllegalMove,
    NotYourTurn,
    SessionNotFound,
    SessionFull,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameListEntry {
    pub session_id: SessionId,
    pub creator_name: String,
}

/// Authoritative snapshot sent to both seats after every accepted move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Per-session counter, 1 for the opening snapshot and +1 per move.
    pub sequence: u64,
    pub board: Board,
    pub side_to_move: Color,
    pub last_move: Option<Move>,
    pub result: GameResult,
    pub captured: Vec<Piece>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client -> server
    JoinLobby {
        name: String,
    },
    ListGames,
    CreateGame {
        name: String,
    },
    JoinGame {
        session_id: SessionId,
        name: String,
    },
    MoveRequest {
        from: Square,
        to: Square,
    },
    LegalMovesRequest {
        square: Square,
    },
    Heartbeat {
        timestamp: u64,
    },
    Disconnect,

    // Server -> client
    GameList {
        entries: Vec<GameListEntry>,
    },
    GameCreated {
        session_id: SessionId,
        seat: Color,
    },
    GameJoined {
        session_id: SessionId,
        seat: Color,
        opponent: String,
    },
    StateUpdate(StateUpdate),
    LegalMoves {
        square: Square,
        destinations: Vec<Square>,
    },
    Error {
        kind: ErrorKind,
        detail: String,
    },
    OpponentDisconnected,
    HeartbeatAck {
        timestamp: u64,
    },
}

impl Packet {
    /// True for packets a client may send to the server.
    pub fn is_server_bound(&self) -> bool {
        matches!(
            self,
            Packet::JoinLobby { .. }
                | Packet::ListGames
                | Packet::CreateGame { .. }
                | Packet::JoinGame { .. }
                | Packet::MoveRequest { .. }
                | Packet::LegalMovesRequest { .. }
                | Packet::Heartbeat { .. }
                | Packet::Disconnect
        )
    }

    pub fn is_client_bound(&self) -> bool {
        !self.is_server_bound()
    }

    pub fn error(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Packet::Error {
            kind,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("malformed packet: {0}")]
    Decode(#[from] bincode::Error),
}

/// Frames [`Packet`]s over any byte stream.
#[derive(Debug)]
pub struct PacketCodec {
    frames: LengthDelimitedCodec,
}

impl PacketCodec {
    pub fn new() -> Self {
        Self::with_max_frame_length(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_length(max_frame_length: usize) -> Self {
        Self {
            frames: LengthDelimitedCodec::builder()
                .max_frame_length(max_frame_length)
                .new_codec(),
        }
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, ProtocolError> {
        match self.frames.decode(src)? {
            Some(frame) => Ok(Some(bincode::deserialize(&frame)?)),
            None => Ok(None),
        }
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let data = bincode::serialize(&packet)?;
        self.frames.encode(Bytes::from(data), dst)?;
        Ok(())
    }
}
