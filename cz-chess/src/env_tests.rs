use std::str::FromStr;

use chess::{Board, ChessMove, Piece};
use cz_core::Environment;

use crate::env::ChessEnv;

fn play(env: &mut ChessEnv, sans: &[&str]) {
    for s in sans {
        let board = Board::from_str(&env.fen()).unwrap();
        let mv = ChessMove::from_san(&board, s).unwrap();
        env.push(ChessEnv::encode(mv));
    }
}

#[test]
fn actions_round_trip_through_the_encoding() {
    let mut env = ChessEnv::new();
    play(&mut env, &["e4", "e5", "Nf3"]);

    let actions = env.actions();
    assert!(!actions.is_empty());
    for a in actions {
        let mv = env.decode(a);
        assert_eq!(ChessEnv::encode(mv), a);
    }
}

#[test]
fn promotions_decode_as_queen_promotions() {
    let board = Board::from_str("8/P6k/8/8/8/8/8/7K w - - 0 1").unwrap();
    let mut env = ChessEnv::from_board(board);

    let actions = env.actions();
    let promo = actions
        .iter()
        .copied()
        .find(|&a| env.decode(a).get_promotion().is_some())
        .expect("promotion available");

    assert_eq!(env.decode(promo).get_promotion(), Some(Piece::Queen));
    assert_eq!(ChessEnv::encode(env.decode(promo)), promo);

    env.push(promo);
    assert_eq!(env.ply(), 1);
}

#[test]
fn fools_mate_is_a_black_win() {
    let mut env = ChessEnv::new();
    play(&mut env, &["f3", "e5", "g4", "Qh4"]);

    let (outcome, reason) = env.terminal_reason().expect("checkmate");
    assert_eq!(outcome, -1.0);
    assert_eq!(reason, "White is checkmated");

    let pgn = env.transcript();
    assert!(pgn.contains("0-1"), "pgn: {}", pgn);
    assert!(pgn.contains("Qh4#"), "pgn: {}", pgn);
    assert!(pgn.contains("{White is checkmated}"), "pgn: {}", pgn);
    assert!(pgn.starts_with("1. f3 e5 2. g4 Qh4#"), "pgn: {}", pgn);
}

#[test]
fn shuffling_knights_draws_by_repetition() {
    let mut env = ChessEnv::new();
    play(
        &mut env,
        &["Nf3", "Nf6", "Ng1", "Ng8", "Nf3", "Nf6", "Ng1", "Ng8"],
    );

    let (outcome, reason) = env.terminal_reason().expect("repetition");
    assert_eq!(outcome, 0.0);
    assert_eq!(reason, "threefold repetition");
}

#[test]
fn bare_kings_are_a_draw() {
    let board = Board::from_str("8/8/4k3/8/8/4K3/8/8 w - - 0 1").unwrap();
    let mut env = ChessEnv::from_board(board);

    let (outcome, reason) = env.terminal_reason().expect("dead position");
    assert_eq!(outcome, 0.0);
    assert_eq!(reason, "insufficient material");
}

#[test]
fn push_pop_restores_the_position() {
    let mut env = ChessEnv::new();
    let fen = env.fen();
    let actions = env.actions();

    env.push(actions[0]);
    assert_eq!(env.ply(), 1);
    assert_eq!(env.turn(), -1.0);
    env.pop();

    assert_eq!(env.fen(), fen);
    assert_eq!(env.ply(), 0);
    assert_eq!(env.turn(), 1.0);
}

#[test]
fn observation_is_mirrored_to_the_movers_view() {
    let mut env = ChessEnv::new();
    let mut obs = vec![0.0f32; ChessEnv::OBS_SIZE];

    // White to move: own pawn on e2 (square 12), plane 0.
    env.observe(&mut obs);
    assert_eq!(obs[12 * ChessEnv::FEATURES], 1.0);

    // Black to move: the e7 pawn mirrors onto the same point-of-view square.
    play(&mut env, &["e4"]);
    env.observe(&mut obs);
    assert_eq!(obs[12 * ChessEnv::FEATURES], 1.0);
}

#[test]
fn material_heuristic_counts_centipawns() {
    let mut env = ChessEnv::new();
    assert_eq!(env.heuristic(), 0.0);

    let board = Board::from_str("k7/8/8/8/8/8/8/KQ6 w - - 0 1").unwrap();
    env = ChessEnv::from_board(board);
    assert_eq!(env.heuristic(), 900.0);
}

#[test]
fn castling_renders_in_san() {
    let mut env = ChessEnv::new();
    play(&mut env, &["e4", "e5", "Nf3", "Nc6", "Bc4", "Bc5", "O-O"]);

    let pgn = env.transcript();
    assert!(pgn.contains("O-O"), "pgn: {}", pgn);
    assert!(pgn.ends_with("{game in progress}"), "pgn: {}", pgn);
}
