/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, ops};

use crate::psqt::Score;

use super::{Bitboard, Color, Piece, PieceKind, Square, ZobristKey};

/// The castling rights of both players, as a 4-bit mask.
///
/// ```text
///     0000 X X X X
///          | | | |
///          | | | +- White kingside (O-O)
///          | | +- White queenside (O-O-O)
///          | +- Black kingside
///          +- Black queenside
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct CastlingRights(pub(crate) u8);

impl CastlingRights {
    pub const NONE: Self = Self(0);
    pub const WHITE_OO: Self = Self(0b0001);
    pub const WHITE_OOO: Self = Self(0b0010);
    pub const BLACK_OO: Self = Self(0b0100);
    pub const BLACK_OOO: Self = Self(0b1000);
    pub const ALL: Self = Self(0b1111);

    /// Number of single castling rights.
    pub const COUNT: usize = 4;

    /// Number of distinct subsets of the four rights.
    pub const SUBSET_COUNT: usize = 16;

    /// The single right of `color` on the given side.
    #[inline(always)]
    pub const fn right(color: Color, short: bool) -> Self {
        Self(1 << (color.index() * 2 + !short as usize))
    }

    /// The inner bits of this mask.
    #[inline(always)]
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// For a *single* right, its index in `[0,4)`, used for the rook-square
    /// and castling-path tables.
    #[inline(always)]
    pub const fn index(&self) -> usize {
        debug_assert!(self.0.count_ones() == 1);
        self.0.trailing_zeros() as usize
    }

    /// Returns `true` if no rights remain.
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if any right of `other` is present in `self`.
    #[inline(always)]
    pub const fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` if every right of `other` is present in `self`.
    #[inline(always)]
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

}

impl ops::BitOr for CastlingRights {
    type Output = Self;
    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl ops::BitOrAssign for CastlingRights {
    #[inline(always)]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl ops::BitAnd for CastlingRights {
    type Output = Self;
    #[inline(always)]
    fn bitand(self, rhs: Self) -> Self::Output {
        Self(self.0 & rhs.0)
    }
}

impl ops::Not for CastlingRights {
    type Output = Self;
    #[inline(always)]
    fn not(self) -> Self::Output {
        Self(!self.0 & Self::ALL.0)
    }
}

impl fmt::Display for CastlingRights {
    /// Displays in FEN order: `KQkq`, or `-` when empty.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        for (right, c) in [
            (Self::WHITE_OO, 'K'),
            (Self::WHITE_OOO, 'Q'),
            (Self::BLACK_OO, 'k'),
            (Self::BLACK_OOO, 'q'),
        ] {
            if self.intersects(right) {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CastlingRights {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CastlingRights({self})")
    }
}

/// The undoable slice of position state: everything that changes with a move
/// and cannot be cheaply recomputed when the move is taken back.
///
/// [`Position`](super::Position) keeps these in a contiguous stack indexed by
/// ply; `do_move` pushes one, `undo_move` pops it, and nothing else is needed
/// to restore the previous hash keys and counters exactly.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct StateInfo {
    /// Zobrist hash of the full position.
    pub key: ZobristKey,

    /// Zobrist hash of the pawn structure only.
    pub pawn_key: ZobristKey,

    /// Count-based material hash; identical for any two positions with the
    /// same piece counts, wherever the pieces stand.
    pub material_key: ZobristKey,

    /// Incremental piece-square score, White-positive.
    pub psq: Score,

    /// Total value of each color's non-pawn material.
    pub non_pawn_material: [i32; Color::COUNT],

    /// Halfmoves since the last capture or pawn move, for the fifty-move rule.
    pub rule50: i32,

    /// Halfmoves since the last null move, bounding repetition searches.
    pub plies_from_null: i32,

    /// The square a pawn skipped on a double push, only when an enemy pawn
    /// could actually capture there.
    pub ep_square: Option<Square>,

    /// Current castling rights.
    pub castling_rights: CastlingRights,

    /// The piece removed by the move that produced this state.
    pub captured_piece: Option<Piece>,

    /// Enemy pieces currently giving check to the side to move.
    pub checkers: Bitboard,

    /// For each color, pieces whose removal would expose that color's king to
    /// a slider: pinned pieces and discovered-check candidates together.
    pub blockers_for_king: [Bitboard; Color::COUNT],

    /// Squares from which a piece of each kind would check the enemy king.
    pub check_squares: [Bitboard; PieceKind::COUNT],

    /// Checks delivered so far by each color (Three-Check).
    pub checks_given: [u8; Color::COUNT],

    /// Pieces destroyed by the explosion of the move that produced this
    /// state (Atomic), indexed by the square they stood on.
    pub blast: [Option<Piece>; Square::COUNT],
}

impl StateInfo {
    /// Creates an empty [`StateInfo`], as for a position with no moves made.
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            key: ZobristKey::from_variant(super::Variant::Standard),
            pawn_key: ZobristKey::from_variant(super::Variant::Standard),
            material_key: ZobristKey::from_variant(super::Variant::Standard),
            psq: Score::ZERO,
            non_pawn_material: [0; Color::COUNT],
            rule50: 0,
            plies_from_null: 0,
            ep_square: None,
            castling_rights: CastlingRights::NONE,
            captured_piece: None,
            checkers: Bitboard::EMPTY_BOARD,
            blockers_for_king: [Bitboard::EMPTY_BOARD; Color::COUNT],
            check_squares: [Bitboard::EMPTY_BOARD; PieceKind::COUNT],
            checks_given: [0; Color::COUNT],
            blast: [None; Square::COUNT],
        }
    }
}

impl Default for StateInfo {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_castling_rights_bits() {
        assert_eq!(CastlingRights::right(Color::White, true), CastlingRights::WHITE_OO);
        assert_eq!(CastlingRights::right(Color::White, false), CastlingRights::WHITE_OOO);
        assert_eq!(CastlingRights::right(Color::Black, true), CastlingRights::BLACK_OO);
        assert_eq!(CastlingRights::right(Color::Black, false), CastlingRights::BLACK_OOO);
        assert_eq!(CastlingRights::BLACK_OO.index(), 2);
    }

    #[test]
    fn test_castling_rights_display() {
        assert_eq!(CastlingRights::ALL.to_string(), "KQkq");
        assert_eq!(CastlingRights::NONE.to_string(), "-");
        assert_eq!(
            (CastlingRights::WHITE_OO | CastlingRights::BLACK_OOO).to_string(),
            "Kq"
        );
    }
}
