//! Standard algebraic notation for transcripts.

use chess::{Board, BoardStatus, ChessMove, MoveGen, Piece, BitBoard};

fn piece_letter(piece: Piece) -> &'static str {
    match piece {
        Piece::Pawn => "",
        Piece::Knight => "N",
        Piece::Bishop => "B",
        Piece::Rook => "R",
        Piece::Queen => "Q",
        Piece::King => "K",
    }
}

/// Render `mv` (assumed legal in `board`) in standard algebraic notation,
/// including check and checkmate suffixes.
pub fn san(board: &Board, mv: ChessMove) -> String {
    let src = mv.get_source();
    let dst = mv.get_dest();
    let piece = board.piece_on(src).expect("move from an empty square");

    let mut out = String::new();

    let src_file = src.get_file().to_index() as i32;
    let dst_file = dst.get_file().to_index() as i32;

    if piece == Piece::King && (src_file - dst_file).abs() == 2 {
        out.push_str(if dst_file > src_file { "O-O" } else { "O-O-O" });
    } else {
        // A pawn reaching an occupied diagonal or the en-passant square.
        let capture = board.piece_on(dst).is_some() || (piece == Piece::Pawn && src_file != dst_file);

        out.push_str(piece_letter(piece));

        if piece == Piece::Pawn {
            if capture {
                out.push((b'a' + src_file as u8) as char);
            }
        } else {
            // Disambiguate among same-typed pieces that can reach dst.
            let mut same_file = false;
            let mut same_rank = false;
            let mut ambiguous = false;

            for other in MoveGen::new_legal(board) {
                if other.get_dest() != dst
                    || other.get_source() == src
                    || board.piece_on(other.get_source()) != Some(piece)
                {
                    continue;
                }
                ambiguous = true;
                if other.get_source().get_file() == src.get_file() {
                    same_file = true;
                }
                if other.get_source().get_rank() == src.get_rank() {
                    same_rank = true;
                }
            }

            if ambiguous {
                if !same_file {
                    out.push((b'a' + src_file as u8) as char);
                } else if !same_rank {
                    out.push((b'1' + src.get_rank().to_index() as u8) as char);
                } else {
                    out.push_str(&format!("{}", src));
                }
            }
        }

        if capture {
            out.push('x');
        }
        out.push_str(&format!("{}", dst));

        if let Some(promo) = mv.get_promotion() {
            out.push('=');
            out.push_str(piece_letter(promo));
        }
    }

    let next = board.make_move_new(mv);
    if *next.checkers() != BitBoard(0) {
        out.push(if next.status() == BoardStatus::Checkmate {
            '#'
        } else {
            '+'
        });
    }

    out
}
