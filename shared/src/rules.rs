//! Rules engine: reachable squares per piece kind, move application and the
//! king-capture win condition.
//!
//! There is no check, castling or en passant. A king is lost by being
//! captured, so a move that leaves one's own king en prise is still legal.
//! Every function here is pure: the same inputs always give the same output,
//! which lets clients replay the server's history move by move.

use crate::board::{Board, Color, Piece, PieceKind, Square};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const KNIGHT_JUMPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const ORTHOGONALS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

const DIAGONALS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

const ALL_DIRECTIONS: [(i8, i8); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    InProgress,
    WhiteWins,
    BlackWins,
    /// A player left mid-game.
    Aborted,
}

impl GameResult {
    pub fn win_for(color: Color) -> Self {
        match color {
            Color::White => GameResult::WhiteWins,
            Color::Black => GameResult::BlackWins,
        }
    }

    pub fn is_over(self) -> bool {
        self != GameResult::InProgress
    }
}

/// A move as validated by the rules engine. Clients only ever propose a
/// `(from, to)` pair; this is what the server derives and broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    /// The piece as it stood on `from`, before any promotion.
    pub piece: Piece,
    pub captured: Option<Piece>,
    pub promotion: bool,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("there is no piece on {0}")]
    NoPiece(Square),
    #[error("the piece on {square} is {piece_color} but {to_move} is to move")]
    WrongColor {
        square: Square,
        piece_color: Color,
        to_move: Color,
    },
    #[error("{piece} on {from} cannot move to {to}")]
    Unreachable { piece: Piece, from: Square, to: Square },
    #[error("the game is already over ({0:?})")]
    GameOver(GameResult),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub board: Board,
    pub side_to_move: Color,
    pub history: Vec<Move>,
    pub last_move: Option<Move>,
    pub result: GameResult,
}

impl GameState {
    pub fn new() -> Self {
        Self::from_position(Board::standard(), Color::White)
    }

    /// A game continuing from an arbitrary position, mostly useful for
    /// exercising the rules on hand-built boards.
    pub fn from_position(board: Board, side_to_move: Color) -> Self {
        Self {
            board,
            side_to_move,
            history: Vec::new(),
            last_move: None,
            result: GameResult::InProgress,
        }
    }

    /// Pieces taken so far, in the order they were captured.
    pub fn captured_pieces(&self) -> Vec<Piece> {
        self.history.iter().filter_map(|mv| mv.captured).collect()
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}

/// Destination squares for the `color` piece standing on `square`.
///
/// Empty when the square is empty or holds a piece of the other colour.
/// Never contains a square held by a friendly piece, and sliding pieces stop
/// at the first occupied square on each ray.
pub fn legal_moves(board: &Board, color: Color, square: Square) -> Vec<Square> {
    match board.get(square) {
        Some(piece) if piece.color == color => reachable(board, piece, square),
        _ => Vec::new(),
    }
}

fn reachable(board: &Board, piece: Piece, from: Square) -> Vec<Square> {
    match piece.kind {
        PieceKind::Pawn => pawn_moves(board, piece.color, from),
        PieceKind::Knight => step_moves(board, piece.color, from, &KNIGHT_JUMPS),
        PieceKind::King => step_moves(board, piece.color, from, &ALL_DIRECTIONS),
        PieceKind::Bishop => slide_moves(board, piece.color, from, &DIAGONALS),
        PieceKind::Rook => slide_moves(board, piece.color, from, &ORTHOGONALS),
        PieceKind::Queen => slide_moves(board, piece.color, from, &ALL_DIRECTIONS),
    }
}

fn is_enemy(board: &Board, color: Color, square: Square) -> bool {
    matches!(board.get(square), Some(piece) if piece.color != color)
}

fn pawn_moves(board: &Board, color: Color, from: Square) -> Vec<Square> {
    let mut moves = Vec::new();
    let forward = color.forward();

    if let Some(one) = from.offset(0, forward) {
        if board.get(one).is_none() {
            moves.push(one);
            if from.rank() == color.pawn_rank() {
                if let Some(two) = one.offset(0, forward) {
                    if board.get(two).is_none() {
                        moves.push(two);
                    }
                }
            }
        }
    }

    for df in [-1, 1] {
        if let Some(target) = from.offset(df, forward) {
            if is_enemy(board, color, target) {
                moves.push(target);
            }
        }
    }

    moves
}

/// Single-step movers. Knights jump, so nothing in between matters.
fn step_moves(board: &Board, color: Color, from: Square, offsets: &[(i8, i8)]) -> Vec<Square> {
    offsets
        .iter()
        .filter_map(|&(df, dr)| from.offset(df, dr))
        .filter(|&target| match board.get(target) {
            Some(piece) => piece.color != color,
            None => true,
        })
        .collect()
}

fn slide_moves(board: &Board, color: Color, from: Square, rays: &[(i8, i8)]) -> Vec<Square> {
    let mut moves = Vec::new();
    for &(df, dr) in rays {
        let mut current = from;
        while let Some(next) = current.offset(df, dr) {
            match board.get(next) {
                None => moves.push(next),
                Some(piece) => {
                    if piece.color != color {
                        moves.push(next);
                    }
                    break;
                }
            }
            current = next;
        }
    }
    moves
}

/// Validates and applies `from -> to` for the side to move.
///
/// The input state is left untouched; the successor state and the derived
/// [`Move`] are returned. A pawn reaching the far rank becomes a queen, and
/// capturing the enemy king ends the game in the mover's favour.
pub fn apply_move(state: &GameState, from: Square, to: Square) -> Result<(GameState, Move), RuleError> {
    if state.result.is_over() {
        return Err(RuleError::GameOver(state.result));
    }

    let piece = state.board.get(from).ok_or(RuleError::NoPiece(from))?;
    if piece.color != state.side_to_move {
        return Err(RuleError::WrongColor {
            square: from,
            piece_color: piece.color,
            to_move: state.side_to_move,
        });
    }
    if !reachable(&state.board, piece, from).contains(&to) {
        return Err(RuleError::Unreachable { piece, from, to });
    }

    let promotion =
        piece.kind == PieceKind::Pawn && to.rank() == piece.color.opposite().back_rank();
    let placed = if promotion {
        Piece::new(PieceKind::Queen, piece.color)
    } else {
        piece
    };

    let mut next = state.clone();
    next.board.set(from, None);
    let captured = next.board.set(to, Some(placed));

    let mv = Move {
        from,
        to,
        piece,
        captured,
        promotion,
    };

    next.side_to_move = piece.color.opposite();
    next.history.push(mv);
    next.last_move = Some(mv);
    if matches!(captured, Some(taken) if taken.kind == PieceKind::King) {
        next.result = GameResult::win_for(piece.color);
    }

    Ok((next, mv))
}

/// Ends an in-progress game as abandoned. Finished games keep their result.
pub fn abort(state: &GameState) -> GameState {
    let mut next = state.clone();
    if !next.result.is_over() {
        next.result = GameResult::Aborted;
    }
    next
}
