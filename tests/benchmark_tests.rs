//! Timing checks for the hot paths of a game: move generation, move
//! application and packet framing

use chess_shared::{
    apply_move, legal_moves, Board, Color, GameState, Packet, PacketCodec, Square, StateUpdate,
};
use std::time::Instant;

/// Benchmarks destination generation for every square of the opening position
#[test]
fn benchmark_legal_moves_full_board() {
    let board = Board::standard();
    let iterations = 1_000;
    let start = Instant::now();

    let mut total = 0;
    for _ in 0..iterations {
        for square in Square::all() {
            total += legal_moves(&board, Color::White, square).len();
        }
    }

    let duration = start.elapsed();
    println!(
        "Legal moves: {} boards in {:?} ({:.2} μs/board)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // 16 pawn moves plus 4 knight moves per pass.
    assert_eq!(total, 20 * iterations);
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks applying a short opening over and over
#[test]
fn benchmark_apply_move_sequence() {
    let line = [("e2", "e4"), ("e7", "e5"), ("g1", "f3"), ("b8", "c6"), ("f1", "c4")];
    let line: Vec<(Square, Square)> = line
        .iter()
        .map(|(from, to)| (from.parse().unwrap(), to.parse().unwrap()))
        .collect();

    let iterations = 5_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let mut state = GameState::new();
        for &(from, to) in &line {
            state = apply_move(&state, from, to).unwrap().0;
        }
        assert_eq!(state.history.len(), line.len());
    }

    let duration = start.elapsed();
    println!(
        "Apply move: {} games of {} moves in {:?}",
        iterations,
        line.len(),
        duration
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks framing and unframing full state updates
#[test]
fn benchmark_state_update_codec() {
    use bytes::BytesMut;
    use tokio_util::codec::{Decoder, Encoder};

    let update = Packet::StateUpdate(StateUpdate {
        sequence: 1,
        board: Board::standard(),
        side_to_move: Color::White,
        last_move: None,
        result: chess_shared::GameResult::InProgress,
        captured: vec![],
    });

    let iterations = 10_000;
    let mut codec = PacketCodec::new();
    let mut buffer = BytesMut::new();
    let start = Instant::now();

    for _ in 0..iterations {
        codec.encode(update.clone(), &mut buffer).unwrap();
        let decoded = codec.decode(&mut buffer).unwrap();
        assert!(decoded.is_some());
    }

    let duration = start.elapsed();
    println!(
        "State update codec: {} round trips in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}
