//! A single game between two seats.
//!
//! Sessions never touch sockets. Each seat holds the outbound queue of the
//! connection sitting in it, and every broadcast is queued while the caller
//! holds the session lock, so both players see updates in acceptance order.

use crate::error::ServerError;
use chess_shared::{
    abort, apply_move, legal_moves, Color, GameState, Move, Packet, RuleError, SessionId,
    Square, StateUpdate,
};
use log::{info, warn};
use tokio::sync::mpsc;

pub type ClientId = u32;

/// Handle to a live connection: who it is and where its packets go.
#[derive(Debug, Clone)]
pub struct ConnectionRef {
    pub id: ClientId,
    pub name: String,
    outbox: mpsc::UnboundedSender<Packet>,
}

impl ConnectionRef {
    pub fn new(id: ClientId, name: String, outbox: mpsc::UnboundedSender<Packet>) -> Self {
        Self { id, name, outbox }
    }

    /// Queues a packet for the connection's writer. Returns false once the
    /// connection is gone.
    pub fn send(&self, packet: Packet) -> bool {
        if self.outbox.send(packet).is_err() {
            warn!("Dropping packet for closed connection {}", self.id);
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    WaitingForOpponent,
    Active,
    Finished,
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    creator_name: String,
    white: Option<ConnectionRef>,
    black: Option<ConnectionRef>,
    state: GameState,
    status: SessionStatus,
    sequence: u64,
}

impl Session {
    /// Opens a game with the creator in the white seat.
    pub fn new(id: SessionId, creator: ConnectionRef) -> Self {
        Self {
            id,
            creator_name: creator.name.clone(),
            white: Some(creator),
            black: None,
            state: GameState::new(),
            status: SessionStatus::WaitingForOpponent,
            sequence: 0,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Sequence number of the most recent `StateUpdate`, 0 before the first.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn creator_name(&self) -> &str {
        &self.creator_name
    }

    pub fn seat_of(&self, client: ClientId) -> Option<Color> {
        if self.white.as_ref().is_some_and(|c| c.id == client) {
            Some(Color::White)
        } else if self.black.as_ref().is_some_and(|c| c.id == client) {
            Some(Color::Black)
        } else {
            None
        }
    }

    fn occupants(&self) -> impl Iterator<Item = &ConnectionRef> {
        self.white.iter().chain(self.black.iter())
    }

    /// Seats `joiner` as black and starts the game.
    ///
    /// Both players get `GameJoined` followed by the opening `StateUpdate`.
    pub fn join(&mut self, joiner: ConnectionRef) -> Result<Color, ServerError> {
        let Some(white) = self.white.as_ref() else {
            // The creator left before anyone joined.
            return Err(ServerError::SessionNotFound(self.id));
        };
        if self.status != SessionStatus::WaitingForOpponent || white.id == joiner.id {
            return Err(ServerError::SessionFull(self.id));
        }

        white.send(Packet::GameJoined {
            session_id: self.id,
            seat: Color::White,
            opponent: joiner.name.clone(),
        });
        joiner.send(Packet::GameJoined {
            session_id: self.id,
            seat: Color::Black,
            opponent: white.name.clone(),
        });
        info!(
            "Game {}: {} (white) vs {} (black)",
            self.id, white.name, joiner.name
        );

        self.black = Some(joiner);
        self.status = SessionStatus::Active;
        self.broadcast_state();
        Ok(Color::Black)
    }

    /// Validates and plays a move proposed by `client`, then broadcasts the
    /// new state to both seats. On error nothing changes and nothing is sent.
    pub fn submit_move(
        &mut self,
        client: ClientId,
        from: Square,
        to: Square,
    ) -> Result<Move, ServerError> {
        let seat = self.seat_of(client).ok_or(ServerError::NotSeated)?;
        if self.status == SessionStatus::WaitingForOpponent {
            return Err(ServerError::WaitingForOpponent(self.id));
        }
        if self.state.result.is_over() {
            return Err(RuleError::GameOver(self.state.result).into());
        }
        if seat != self.state.side_to_move {
            return Err(ServerError::NotYourTurn(self.state.side_to_move));
        }

        let (next, mv) = apply_move(&self.state, from, to)?;
        self.state = next;
        if self.state.result.is_over() {
            self.status = SessionStatus::Finished;
            info!("Game {} over: {:?}", self.id, self.state.result);
        }
        self.broadcast_state();
        Ok(mv)
    }

    /// Destinations for the seated player's own piece on `square`.
    pub fn legal_moves_for(&self, client: ClientId, square: Square) -> Result<Vec<Square>, ServerError> {
        let seat = self.seat_of(client).ok_or(ServerError::NotSeated)?;
        Ok(legal_moves(&self.state.board, seat, square))
    }

    /// Removes `client` from its seat.
    ///
    /// Leaving an active game aborts it and tells the other player. Leaving a
    /// waiting game closes it. Returns false if `client` held no seat, which
    /// makes repeated calls harmless.
    pub fn leave(&mut self, client: ClientId) -> bool {
        let seat = match self.seat_of(client) {
            Some(seat) => seat,
            None => return false,
        };
        match seat {
            Color::White => self.white = None,
            Color::Black => self.black = None,
        }

        match self.status {
            SessionStatus::WaitingForOpponent => {
                info!("Game {} closed before an opponent joined", self.id);
                self.status = SessionStatus::Finished;
            }
            SessionStatus::Active => {
                info!("Game {} aborted: {} left", self.id, seat);
                self.state = abort(&self.state);
                self.status = SessionStatus::Finished;
                for occupant in self.occupants() {
                    occupant.send(Packet::OpponentDisconnected);
                }
                self.broadcast_state();
            }
            SessionStatus::Finished => {}
        }
        true
    }

    /// Ends a game because the server is going away.
    pub fn close(&mut self) {
        if self.status == SessionStatus::Active {
            self.state = abort(&self.state);
            self.broadcast_state();
        }
        self.status = SessionStatus::Finished;
    }

    pub fn is_empty(&self) -> bool {
        self.white.is_none() && self.black.is_none()
    }

    pub fn snapshot(&self) -> StateUpdate {
        StateUpdate {
            sequence: self.sequence,
            board: self.state.board.clone(),
            side_to_move: self.state.side_to_move,
            last_move: self.state.last_move,
            result: self.state.result,
            captured: self.state.captured_pieces(),
        }
    }

    fn broadcast_state(&mut self) {
        self.sequence += 1;
        let update = self.snapshot();
        for occupant in self.occupants() {
            occupant.send(Packet::StateUpdate(update.clone()));
        }
    }
}
