/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use anyhow::{anyhow, bail, Result};

use super::{File, PieceKind, Position, Square};

/// Maximum possible number of moves in a given chess position.
///
/// Found [here](<https://www.chessprogramming.org/Chess_Position#cite_note-4>)
pub const MAX_NUM_MOVES: usize = 218;

/// An alias for an [`arrayvec::ArrayVec`] containing at most [`MAX_NUM_MOVES`] moves.
pub type MoveList = arrayvec::ArrayVec<Move, MAX_NUM_MOVES>;

/// Represents the different kinds of moves that can be made during a chess game.
///
/// There are only four: the two flag bits of a [`Move`] cannot hold more.
/// Everything else (captures, double pushes) is derived from the board.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
#[repr(u16)]
pub enum MoveKind {
    /// Any move that is not one of the three special cases below.
    Normal = 0 << Move::FLG_BITS,

    /// A Pawn reaching the opponent's back rank and becoming the piece named
    /// by the promotion bits.
    Promotion = 1 << Move::FLG_BITS,

    /// A Pawn capturing the enemy pawn that just passed it with a double push.
    EnPassant = 2 << Move::FLG_BITS,

    /// Castling, encoded as the King capturing his own Rook so that the
    /// encoding survives Chess960's variable rook files.
    Castling = 3 << Move::FLG_BITS,
}

/// Represents a move made on a chess board.
///
/// Internally encoded using the following bit pattern:
/// ```text
///     00 00 000000 000000
///      |  |    |      |
///      |  |    |      +- Source square of the move.
///      |  |    +- Target square of the move.
///      |  +- Promotion piece (Knight..Queen), if the kind is Promotion.
///      +- Move kind: Normal, Promotion, EnPassant, Castling.
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Move(u16);

impl Move {
    /// Mask for the source ("from") bits.
    const SRC_MASK: u16 = 0b0000_0000_0011_1111;
    /// Mask for the destination ("to") bits.
    const DST_MASK: u16 = 0b0000_1111_1100_0000;
    /// Mask for the promotion piece bits.
    const PROMO_MASK: u16 = 0b0011_0000_0000_0000;
    /// Mask for the move kind bits.
    const FLG_MASK: u16 = 0b1100_0000_0000_0000;
    /// Start index of destination bits.
    const DST_BITS: u16 = 6;
    /// Start index of promotion bits.
    const PROMO_BITS: u16 = 12;
    /// Start index of flag bits.
    const FLG_BITS: u16 = 14;

    /// Creates a new [`Move`] from the given [`Square`]s and a [`MoveKind`].
    ///
    /// For promotions, use [`Move::new_promotion`] instead so the promotion
    /// piece is recorded.
    #[inline(always)]
    pub const fn new(from: Square, to: Square, kind: MoveKind) -> Self {
        Self(kind as u16 | (to.inner() as u16) << Self::DST_BITS | from.inner() as u16)
    }

    /// Creates a new promotion [`Move`], promoting to `promotion`.
    ///
    /// `promotion` must be Knight, Bishop, Rook, or Queen; the two promotion
    /// bits cannot represent anything else.
    #[inline(always)]
    pub const fn new_promotion(from: Square, to: Square, promotion: PieceKind) -> Self {
        debug_assert!(
            promotion.bits() >= PieceKind::Knight.bits()
                && promotion.bits() <= PieceKind::Queen.bits()
        );

        let promo_bits = (promotion.bits() - PieceKind::Knight.bits()) as u16;
        Self(
            MoveKind::Promotion as u16
                | promo_bits << Self::PROMO_BITS
                | (to.inner() as u16) << Self::DST_BITS
                | from.inner() as u16,
        )
    }

    /// Creates a null [`Move`], with `from` and `to` both A1.
    ///
    /// No legal move has equal squares, so this is usable as a sentinel.
    #[inline(always)]
    pub const fn null() -> Self {
        Self(0)
    }

    /// Returns `true` if this is the null [`Move`].
    #[inline(always)]
    pub const fn is_null(&self) -> bool {
        self.from().inner() == self.to().inner()
    }

    /// Fetches the source (or "from") part of this [`Move`].
    #[inline(always)]
    pub const fn from(&self) -> Square {
        Square::from_bits_unchecked((self.0 & Self::SRC_MASK) as u8)
    }

    /// Fetches the destination (or "to") part of this [`Move`].
    ///
    /// For castling moves this is the Rook's square, not the King's destination.
    #[inline(always)]
    pub const fn to(&self) -> Square {
        Square::from_bits_unchecked(((self.0 & Self::DST_MASK) >> Self::DST_BITS) as u8)
    }

    /// Fetches the [`MoveKind`] part of this [`Move`].
    #[inline(always)]
    pub const fn kind(&self) -> MoveKind {
        // Safety: All four bit patterns of the two flag bits name a valid MoveKind.
        unsafe { std::mem::transmute(self.0 & Self::FLG_MASK) }
    }

    /// Returns `true` if this [`Move`] is a promotion.
    #[inline(always)]
    pub const fn is_promotion(&self) -> bool {
        self.0 & Self::FLG_MASK == MoveKind::Promotion as u16
    }

    /// Returns `true` if this [`Move`] is an en passant capture.
    #[inline(always)]
    pub const fn is_en_passant(&self) -> bool {
        self.0 & Self::FLG_MASK == MoveKind::EnPassant as u16
    }

    /// Returns `true` if this [`Move`] is a castling move.
    #[inline(always)]
    pub const fn is_castling(&self) -> bool {
        self.0 & Self::FLG_MASK == MoveKind::Castling as u16
    }

    /// The piece this [`Move`] promotes to, if it is a promotion.
    #[inline(always)]
    pub const fn promotion(&self) -> Option<PieceKind> {
        if self.is_promotion() {
            Some(self.promotion_unchecked())
        } else {
            None
        }
    }

    /// The piece named by the promotion bits, regardless of this [`Move`]'s kind.
    #[inline(always)]
    pub const fn promotion_unchecked(&self) -> PieceKind {
        let bits = ((self.0 & Self::PROMO_MASK) >> Self::PROMO_BITS) as u8;
        PieceKind::from_bits_unchecked(bits + PieceKind::Knight.bits())
    }

    /// Creates a [`Move`] from a string in [UCI](https://en.wikipedia.org//wiki/Universal_Chess_Interface) notation,
    /// resolving special cases against the provided [`Position`].
    ///
    /// Castling in the standard `e1g1` notation is converted to the internal
    /// King-takes-Rook form; a pawn arriving on the en passant square becomes
    /// an [`MoveKind::EnPassant`] move.
    pub fn from_uci(position: &Position, uci: &str) -> Result<Self> {
        let from = uci
            .get(0..2)
            .ok_or(anyhow!("Move str must contain a `from` square. Got {uci:?}"))?;
        let to = uci
            .get(2..4)
            .ok_or(anyhow!("Move str must contain a `to` square. Got {uci:?}"))?;

        let from = Square::from_uci(from)?;
        let to = Square::from_uci(to)?;

        let piece = position
            .piece_at(from)
            .ok_or(anyhow!("No piece at {from} when parsing {uci:?}"))?;

        if let Some(promotion) = uci.get(4..5) {
            let promotion = PieceKind::from_uci(promotion.chars().next().unwrap())?;
            if !matches!(
                promotion,
                PieceKind::Knight | PieceKind::Bishop | PieceKind::Rook | PieceKind::Queen
            ) {
                bail!("Invalid promotion piece in {uci:?}");
            }
            return Ok(Self::new_promotion(from, to, promotion));
        }

        if piece.is_king() {
            // King-takes-own-rook is already in the internal castling form
            if position
                .piece_at(to)
                .is_some_and(|p| p.is_rook() && p.color() == piece.color())
            {
                return Ok(Self::new(from, to, MoveKind::Castling));
            }

            // Otherwise, translate the standard two-file king hop (e1g1 / e1c1)
            if from.distance_files(to) >= 2 {
                let short = to.file() > from.file();
                let rook = position
                    .castling_rook_square(piece.color(), short)
                    .ok_or(anyhow!(
                        "Cannot castle {uci:?}: {} has no rights on that side",
                        piece.color().name()
                    ))?;
                return Ok(Self::new(from, rook, MoveKind::Castling));
            }
        }

        if piece.is_pawn() && Some(to) == position.ep_square() && from.file() != to.file() {
            return Ok(Self::new(from, to, MoveKind::EnPassant));
        }

        Ok(Self::new(from, to, MoveKind::Normal))
    }

    /// Converts this [`Move`] to a string in UCI notation.
    ///
    /// Castling moves are printed in the standard `e1g1` notation; use the
    /// alternate [`fmt::Display`] mode (`{:#}`) for the Chess960 King-takes-Rook form.
    #[inline(always)]
    pub fn to_uci(&self) -> String {
        format!("{self}")
    }

    /// The King's true destination for a castling move: G1/C1 relative to the mover.
    #[inline(always)]
    pub const fn king_castling_target(&self) -> Square {
        let file = if self.to().inner() > self.from().inner() {
            File::G
        } else {
            File::C
        };
        Square::new(file, self.from().rank())
    }

    /// The Rook's destination for a castling move: F1/D1 relative to the mover.
    #[inline(always)]
    pub const fn rook_castling_target(&self) -> Square {
        let file = if self.to().inner() > self.from().inner() {
            File::F
        } else {
            File::D
        };
        Square::new(file, self.from().rank())
    }
}

impl fmt::Display for Move {
    /// A [`Move`] is displayed in its UCI format.
    ///
    /// If the alternate format mode (`#`) was specified, castling moves are
    /// printed in Chess960 (King-takes-Rook) notation.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let to = if self.is_castling() && !f.alternate() {
            self.king_castling_target()
        } else {
            self.to()
        };

        if let Some(promotion) = self.promotion() {
            write!(f, "{}{}{}", self.from(), to, promotion)
        } else {
            write!(f, "{}{}", self.from(), to)
        }
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self} ({:?})", self.kind())
    }
}

impl Default for Move {
    /// A "default" move is the null move. See [`Move::null`].
    #[inline(always)]
    fn default() -> Self {
        Self::null()
    }
}

impl<T: AsRef<str>> PartialEq<T> for Move {
    #[inline(always)]
    fn eq(&self, other: &T) -> bool {
        self.to_uci().eq(other.as_ref())
    }
}
