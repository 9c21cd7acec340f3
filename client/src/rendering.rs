//! Plain-text rendering of the board and server messages.

use crate::game::ClientGameState;
use chess_shared::{Color, ErrorKind, GameListEntry, GameResult, Piece, Square, StateUpdate};
use std::fmt::Write;

#[derive(Debug, Default)]
pub struct Renderer;

impl Renderer {
    pub fn new() -> Self {
        Renderer
    }

    pub fn show(&self, text: &str) {
        println!("{}", text);
    }

    /// Board from the given side's point of view: white sees rank 8 at the
    /// top, black sees rank 1 at the top.
    pub fn board(&self, update: &StateUpdate, perspective: Color) -> String {
        let ranks: Vec<u8> = match perspective {
            Color::White => (0..8).rev().collect(),
            Color::Black => (0..8).collect(),
        };
        let files: Vec<u8> = match perspective {
            Color::White => (0..8).collect(),
            Color::Black => (0..8).rev().collect(),
        };

        let mut lines: Vec<String> = ranks
            .iter()
            .map(|&rank| {
                let cells: Vec<String> = files
                    .iter()
                    .map(|&file| {
                        Square::new(file, rank)
                            .and_then(|square| update.board.get(square))
                            .map(|piece| piece.letter())
                            .unwrap_or('.')
                            .to_string()
                    })
                    .collect();
                format!("{} {}", rank + 1, cells.join(" "))
            })
            .collect();
        let footer: Vec<String> = files
            .iter()
            .map(|&file| ((b'a' + file) as char).to_string())
            .collect();
        lines.push(format!("  {}", footer.join(" ")));
        lines.join("\n")
    }

    /// Board plus move, captures and whose turn it is.
    pub fn game(&self, game: &ClientGameState) -> String {
        let Some(update) = game.current() else {
            return match game.session_id {
                Some(id) => format!("Game {} is waiting for an opponent", id),
                None => "Not in a game. Type `list`, `create` or `join <id>`.".to_string(),
            };
        };
        let seat = game.seat.unwrap_or(Color::White);

        let mut out = self.board(update, seat);
        out.push('\n');
        if let Some(mv) = update.last_move {
            let _ = write!(out, "\nLast move: {} {} -> {}", mv.piece.letter(), mv.from, mv.to);
            if let Some(captured) = mv.captured {
                let _ = write!(out, " takes {}", captured.letter());
            }
            if mv.promotion {
                out.push_str(" (promoted)");
            }
        }
        if !update.captured.is_empty() {
            let _ = write!(out, "\nCaptured: {}", letters(&update.captured));
        }
        out.push('\n');
        out.push_str(&self.status(update.result, update.side_to_move, seat));
        out
    }

    pub fn status(&self, result: GameResult, side_to_move: Color, seat: Color) -> String {
        match result {
            GameResult::InProgress if side_to_move == seat => "Your move.".to_string(),
            GameResult::InProgress => format!("Waiting for {} to move.", side_to_move),
            GameResult::WhiteWins | GameResult::BlackWins => {
                let winner = if result == GameResult::WhiteWins {
                    Color::White
                } else {
                    Color::Black
                };
                if winner == seat {
                    "You captured the king. You win!".to_string()
                } else {
                    format!("Your king was captured. {} wins.", winner)
                }
            }
            GameResult::Aborted => "Game aborted.".to_string(),
        }
    }

    pub fn lobby(&self, entries: &[GameListEntry]) -> String {
        if entries.is_empty() {
            return "No open games. Type `create` to start one.".to_string();
        }
        let mut out = String::from("Open games:");
        for entry in entries {
            let _ = write!(out, "\n  [{}] {}", entry.session_id, entry.creator_name);
        }
        out
    }

    pub fn legal_moves(&self, square: Square, destinations: &[Square]) -> String {
        if destinations.is_empty() {
            return format!("No moves from {}", square);
        }
        let list: Vec<String> = destinations.iter().map(Square::to_string).collect();
        format!("{} can move to: {}", square, list.join(" "))
    }

    pub fn error(&self, kind: ErrorKind, detail: &str) -> String {
        let label = match kind {
            ErrorKind::IllegalMove => "Illegal move",
            ErrorKind::NotYourTurn => "Not your turn",
            ErrorKind::SessionNotFound => "No such game",
            ErrorKind::SessionFull => "Game full",
        };
        format!("{}: {}", label, detail)
    }
}

fn letters(pieces: &[Piece]) -> String {
    pieces.iter().map(|piece| piece.letter()).collect()
}
