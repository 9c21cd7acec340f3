//! Server-side failures and their mapping onto wire error kinds.

use chess_shared::{Color, ErrorKind, Packet, RuleError, SessionId};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServerError {
    #[error("game {0} does not exist")]
    SessionNotFound(SessionId),
    #[error("you are not seated in any game")]
    NotSeated,
    #[error("game {0} already has two players")]
    SessionFull(SessionId),
    #[error("you are already seated in game {0}")]
    AlreadySeated(SessionId),
    #[error("the server has no room for more players")]
    ServerFull,
    #[error("game {0} is still waiting for an opponent")]
    WaitingForOpponent(SessionId),
    #[error("it is {0}'s turn")]
    NotYourTurn(Color),
    #[error("illegal move: {0}")]
    IllegalMove(#[from] RuleError),
}

impl ServerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServerError::SessionNotFound(_) | ServerError::NotSeated => ErrorKind::SessionNotFound,
            ServerError::SessionFull(_) | ServerError::AlreadySeated(_) | ServerError::ServerFull => {
                ErrorKind::SessionFull
            }
            ServerError::WaitingForOpponent(_) | ServerError::NotYourTurn(_) => {
                ErrorKind::NotYourTurn
            }
            ServerError::IllegalMove(_) => ErrorKind::IllegalMove,
        }
    }

    pub fn to_packet(&self) -> Packet {
        Packet::error(self.kind(), self.to_string())
    }
}
