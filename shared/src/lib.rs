//! Types shared by the chess server and its clients: the board model, the
//! rules engine and the wire protocol.
//!
//! Both ends run the same rules code, so a client can replay the moves it
//! receives and check that they reproduce the server's board.

pub mod board;
pub mod protocol;
pub mod rules;

pub use board::{Board, Color, Piece, PieceKind, Square, SquareError, BOARD_SIZE};
pub use protocol::{
    ErrorKind, GameListEntry, Packet, PacketCodec, ProtocolError, SessionId, StateUpdate,
    DEFAULT_MAX_FRAME_LEN,
};
pub use rules::{abort, apply_move, legal_moves, GameResult, GameState, Move, RuleError};

/// Port the chess server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 5006;
