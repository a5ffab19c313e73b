//! The chess environment.

use chess::{Board, BoardStatus, ChessMove, Color, File, MoveGen, Piece, Rank, Square};
use cz_core::Environment;

use crate::san::san;

fn square_at(index: usize) -> Square {
    Square::make_square(Rank::from_index(index / 8), File::from_index(index % 8))
}

/// Piece planes for both colors.
const PIECE_PLANES: usize = 12;
/// Halfmove clock, four castling rights, repetition flag.
const HEADER_PLANES: usize = 6;

const PIECES: [Piece; 6] = [
    Piece::Pawn,
    Piece::Knight,
    Piece::Bishop,
    Piece::Rook,
    Piece::Queen,
    Piece::King,
];

const PIECE_VALUE: [f32; 6] = [100.0, 300.0, 300.0, 500.0, 900.0, 0.0];

pub struct ChessEnv {
    boards: Vec<Board>,
    moves: Vec<ChessMove>,
    clocks: Vec<u32>,
    hashes: Vec<u64>,
}

impl ChessEnv {
    pub fn from_board(board: Board) -> Self {
        Self {
            hashes: vec![board.get_hash()],
            boards: vec![board],
            moves: Vec::new(),
            clocks: vec![0],
        }
    }

    fn board(&self) -> &Board {
        self.boards.last().expect("board stack never empty")
    }

    /// Flat from/to action id. Promotions fold onto the underlying from/to
    /// square pair; `decode` restores them as queen promotions.
    pub fn encode(mv: ChessMove) -> i32 {
        (mv.get_source().to_index() * 64 + mv.get_dest().to_index()) as i32
    }

    /// Rebuild the move for an action id in the current position.
    pub fn decode(&self, action: i32) -> ChessMove {
        let src = square_at(action as usize / 64);
        let dst = square_at(action as usize % 64);
        let promotion = match self.board().piece_on(src) {
            Some(Piece::Pawn) if dst.get_rank().to_index() == 0 || dst.get_rank().to_index() == 7 => {
                Some(Piece::Queen)
            }
            _ => None,
        };
        ChessMove::new(src, dst, promotion)
    }

    /// FEN of the current position.
    pub fn fen(&self) -> String {
        self.board().to_string()
    }

    fn halfmove_clock(&self) -> u32 {
        *self.clocks.last().expect("clock stack never empty")
    }

    fn repetitions(&self) -> usize {
        let current = *self.hashes.last().expect("hash stack never empty");
        self.hashes.iter().filter(|&&h| h == current).count()
    }

    fn insufficient_material(&self) -> bool {
        let board = self.board();
        let all = *board.combined();
        let kings = *board.pieces(Piece::King);
        let bishops = *board.pieces(Piece::Bishop);
        let knights = *board.pieces(Piece::Knight);
        let white = board.color_combined(Color::White).popcnt();
        let black = board.color_combined(Color::Black).popcnt();

        if all == kings {
            return true;
        }
        if all == (kings | bishops) {
            return bishops.popcnt() == 1 || (white == black && bishops.popcnt() == 2);
        }
        if all == (kings | knights) {
            return knights.popcnt() == 1 || (white == black && knights.popcnt() == 2);
        }
        false
    }
}

impl Environment for ChessEnv {
    const WIDTH: usize = 8;
    const HEIGHT: usize = 8;
    const FEATURES: usize = PIECE_PLANES + HEADER_PLANES;
    const POL_SIZE: usize = 64 * 64;

    fn new() -> Self {
        Self::from_board(Board::default())
    }

    fn turn(&self) -> f32 {
        match self.board().side_to_move() {
            Color::White => 1.0,
            Color::Black => -1.0,
        }
    }

    fn ply(&self) -> u32 {
        self.moves.len() as u32
    }

    fn push(&mut self, action: i32) {
        let mv = self.decode(action);
        let board = *self.board();
        debug_assert!(board.legal(mv), "illegal action {} in {}", action, self.fen());

        let resets_clock =
            board.piece_on(mv.get_source()) == Some(Piece::Pawn) || board.piece_on(mv.get_dest()).is_some();
        let clock = if resets_clock {
            0
        } else {
            self.halfmove_clock() + 1
        };

        let next = board.make_move_new(mv);
        self.hashes.push(next.get_hash());
        self.boards.push(next);
        self.moves.push(mv);
        self.clocks.push(clock);
    }

    fn pop(&mut self) {
        self.boards.pop();
        self.moves.pop();
        self.clocks.pop();
        self.hashes.pop();
    }

    fn actions(&mut self) -> Vec<i32> {
        MoveGen::new_legal(self.board())
            .filter(|m| matches!(m.get_promotion(), None | Some(Piece::Queen)))
            .map(Self::encode)
            .collect()
    }

    fn terminal_reason(&mut self) -> Option<(f32, String)> {
        if self.halfmove_clock() >= 100 {
            return Some((0.0, "fifty-move rule".to_string()));
        }
        if self.repetitions() >= 3 {
            return Some((0.0, "threefold repetition".to_string()));
        }
        if self.insufficient_material() {
            return Some((0.0, "insufficient material".to_string()));
        }

        let side = self.board().side_to_move();
        match self.board().status() {
            BoardStatus::Ongoing => None,
            BoardStatus::Stalemate => Some((
                0.0,
                format!(
                    "{} is stalemated",
                    if side == Color::White { "White" } else { "Black" }
                ),
            )),
            BoardStatus::Checkmate => {
                let outcome = if side == Color::White { -1.0 } else { 1.0 };
                Some((
                    outcome,
                    format!(
                        "{} is checkmated",
                        if side == Color::White { "White" } else { "Black" }
                    ),
                ))
            }
        }
    }

    fn observe(&self, dst: &mut [f32]) {
        dst.fill(0.0);

        let board = self.board();
        let us = board.side_to_move();

        let clock = (self.halfmove_clock() as f32 / 100.0).min(1.0);
        let ours = board.castle_rights(us);
        let theirs = board.castle_rights(!us);
        let repeated = (self.repetitions() >= 2) as u8 as f32;

        for sq in 0..64usize {
            // Mirror ranks so the mover always looks up the board.
            let pov = if us == Color::White { sq } else { sq ^ 56 };
            let base = pov * Self::FEATURES;

            let square = square_at(sq);
            if let Some(piece) = board.piece_on(square) {
                let color = board.color_on(square).expect("occupied square has a color");
                let plane = if color == us { 0 } else { 6 } + piece.to_index();
                dst[base + plane] = 1.0;
            }

            dst[base + 12] = clock;
            dst[base + 13] = ours.has_kingside() as u8 as f32;
            dst[base + 14] = ours.has_queenside() as u8 as f32;
            dst[base + 15] = theirs.has_kingside() as u8 as f32;
            dst[base + 16] = theirs.has_queenside() as u8 as f32;
            dst[base + 17] = repeated;
        }
    }

    fn heuristic(&self) -> f32 {
        let board = self.board();
        let mut score = 0.0;

        for (piece, value) in PIECES.iter().zip(PIECE_VALUE) {
            let bb = *board.pieces(*piece);
            let white = (bb & *board.color_combined(Color::White)).popcnt() as f32;
            let black = (bb & *board.color_combined(Color::Black)).popcnt() as f32;
            score += value * (white - black);
        }

        score
    }

    fn transcript(&mut self) -> String {
        let (result, reason) = match self.terminal_reason() {
            Some((v, r)) if v > 0.0 => ("1-0", r),
            Some((v, r)) if v < 0.0 => ("0-1", r),
            Some((_, r)) => ("1/2-1/2", r),
            None => ("*", "game in progress".to_string()),
        };

        let mut out = String::new();
        for (i, (board, mv)) in self.boards.iter().zip(&self.moves).enumerate() {
            if board.side_to_move() == Color::White {
                if i > 0 {
                    out.push(' ');
                }
                out.push_str(&format!("{}.", i / 2 + 1));
            }
            out.push(' ');
            out.push_str(&san(board, *mv));
        }

        format!("{} {} {{{}}}", out.trim(), result, reason)
    }

    fn action_name(&self, action: i32) -> String {
        let mv = self.decode(action);
        format!("{}", mv)
    }
}
