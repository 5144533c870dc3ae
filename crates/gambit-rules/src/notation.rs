//! Conversions between wire vocabulary and `chess` crate types.

use chess::{ChessMove, File, Piece, Rank, Square};
use gambit_protocol::{Color, PieceKind};

use crate::error::RuleError;

/// Parses an algebraic square name (`e4`).
pub fn parse_square(text: &str) -> Result<Square, RuleError> {
    let bytes = text.as_bytes();
    if bytes.len() != 2 {
        return Err(RuleError::InvalidSquare(text.to_string()));
    }
    let file = bytes[0].wrapping_sub(b'a');
    let rank = bytes[1].wrapping_sub(b'1');
    if file > 7 || rank > 7 {
        return Err(RuleError::InvalidSquare(text.to_string()));
    }
    Ok(Square::make_square(
        Rank::from_index(rank as usize),
        File::from_index(file as usize),
    ))
}

/// Parses UCI long algebraic notation: `e2e4`, or `e7e8q` with a promotion.
pub fn parse_uci(text: &str) -> Result<(Square, Square, Option<Piece>), RuleError> {
    let invalid = || RuleError::InvalidNotation(text.to_string());
    if !text.is_ascii() || !(4..=5).contains(&text.len()) {
        return Err(invalid());
    }
    let from = parse_square(&text[0..2]).map_err(|_| invalid())?;
    let to = parse_square(&text[2..4]).map_err(|_| invalid())?;
    let promotion = match text[4..].chars().next() {
        None => None,
        Some(c) => Some(promotion_piece(c).ok_or_else(invalid)?),
    };
    Ok((from, to, promotion))
}

fn promotion_piece(c: char) -> Option<Piece> {
    match c.to_ascii_lowercase() {
        'q' => Some(Piece::Queen),
        'r' => Some(Piece::Rook),
        'b' => Some(Piece::Bishop),
        'n' => Some(Piece::Knight),
        _ => None,
    }
}

pub(crate) fn to_chess_color(color: Color) -> chess::Color {
    match color {
        Color::White => chess::Color::White,
        Color::Black => chess::Color::Black,
    }
}

pub(crate) fn from_chess_color(color: chess::Color) -> Color {
    match color {
        chess::Color::White => Color::White,
        chess::Color::Black => Color::Black,
    }
}

pub(crate) fn piece_kind(piece: Piece) -> PieceKind {
    match piece {
        Piece::Pawn => PieceKind::Pawn,
        Piece::Knight => PieceKind::Knight,
        Piece::Bishop => PieceKind::Bishop,
        Piece::Rook => PieceKind::Rook,
        Piece::Queen => PieceKind::Queen,
        Piece::King => PieceKind::King,
    }
}

pub(crate) fn move_text(mv: &ChessMove) -> (String, String) {
    (mv.get_source().to_string(), mv.get_dest().to_string())
}
