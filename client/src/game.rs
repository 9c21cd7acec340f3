//! Client-side view of the lobby and the current game.
//!
//! The server is authoritative, so nothing here predicts. The client keeps
//! the last snapshot it was sent and checks each new one against it. It
//! looks for a sequence gap and replays the reported move with the shared
//! rules to confirm the board it was given.

use chess_shared::{
    apply_move, Color, GameListEntry, GameResult, GameState, Packet, SessionId, StateUpdate,
};
use log::{debug, warn};

/// What an incoming state update told us beyond the new position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    /// The update followed on from the previous one and its board matches a
    /// local replay of the last move.
    InSync,
    /// First snapshot of a game, or one with no new move to replay.
    Accepted,
    /// One or more updates were skipped.
    Gap { expected: u64, received: u64 },
    /// Replaying the last move locally gave a different board.
    Mismatch,
    /// The update is older than one already applied and was ignored.
    Stale,
}

#[derive(Debug, Default)]
pub struct ClientGameState {
    pub session_id: Option<SessionId>,
    pub seat: Option<Color>,
    pub opponent: Option<String>,
    pub lobby: Vec<GameListEntry>,
    pub opponent_left: bool,
    current: Option<StateUpdate>,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&StateUpdate> {
        self.current.as_ref()
    }

    pub fn last_sequence(&self) -> u64 {
        self.current.as_ref().map_or(0, |update| update.sequence)
    }

    /// True while seated in a game that has not ended.
    pub fn in_game(&self) -> bool {
        self.session_id.is_some()
            && self
                .current
                .as_ref()
                .map_or(true, |update| !update.result.is_over())
    }

    pub fn is_my_turn(&self) -> bool {
        match (&self.current, self.seat) {
            (Some(update), Some(seat)) => {
                update.result == GameResult::InProgress && update.side_to_move == seat
            }
            _ => false,
        }
    }

    /// Folds a server packet into local state. Returns the result of the
    /// consistency check for state updates.
    pub fn handle_packet(&mut self, packet: &Packet) -> Option<UpdateCheck> {
        match packet {
            Packet::GameList { entries } => self.lobby = entries.clone(),
            Packet::GameCreated { session_id, seat } => {
                self.enter_game(*session_id, *seat);
            }
            Packet::GameJoined {
                session_id,
                seat,
                opponent,
            } => {
                if self.session_id != Some(*session_id) || self.seat != Some(*seat) {
                    self.enter_game(*session_id, *seat);
                }
                self.opponent = Some(opponent.clone());
            }
            Packet::StateUpdate(update) => return Some(self.apply_update(update.clone())),
            Packet::OpponentDisconnected => self.opponent_left = true,
            _ => {}
        }
        None
    }

    fn enter_game(&mut self, session_id: SessionId, seat: Color) {
        self.session_id = Some(session_id);
        self.seat = Some(seat);
        self.opponent = None;
        self.opponent_left = false;
        self.current = None;
    }

    /// Checks `update` against the previous snapshot and keeps it.
    pub fn apply_update(&mut self, update: StateUpdate) -> UpdateCheck {
        let last = self.last_sequence();
        if self.current.is_some() && update.sequence <= last {
            debug!("Ignoring stale update {} (have {})", update.sequence, last);
            return UpdateCheck::Stale;
        }

        let check = match self.current.as_ref() {
            None => UpdateCheck::Accepted,
            Some(_) if update.sequence != last + 1 => {
                warn!(
                    "Missed state updates: expected {}, got {}",
                    last + 1,
                    update.sequence
                );
                UpdateCheck::Gap {
                    expected: last + 1,
                    received: update.sequence,
                }
            }
            Some(previous) => verify(previous, &update),
        };
        self.current = Some(update);
        check
    }
}

/// Replays `update.last_move` on top of `previous` and compares boards.
fn verify(previous: &StateUpdate, update: &StateUpdate) -> UpdateCheck {
    let Some(mv) = update.last_move else {
        return UpdateCheck::Accepted;
    };
    if previous.last_move == Some(mv) {
        // Same move as before: this update only changed the result.
        return UpdateCheck::Accepted;
    }

    let state = GameState::from_position(previous.board.clone(), previous.side_to_move);
    match apply_move(&state, mv.from, mv.to) {
        Ok((next, _)) if next.board == update.board => UpdateCheck::InSync,
        Ok(_) => {
            warn!("Board after {} -> {} differs from server", mv.from, mv.to);
            UpdateCheck::Mismatch
        }
        Err(e) => {
            warn!("Server move {} -> {} rejected locally: {}", mv.from, mv.to, e);
            UpdateCheck::Mismatch
        }
    }
}
