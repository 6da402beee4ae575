/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

/// Precomputed attack tables and ray lookups.
mod attacks;

/// The [`Bitboard`] square-set type.
mod bitboard;

/// Legal and pseudo-legal move generation.
mod movegen;

/// The 16-bit [`Move`] encoding and [`MoveList`].
mod moves;

/// Perft: move-tree node counting for validating make/unmake and movegen.
mod perft;

/// [`Color`], [`PieceKind`], and [`Piece`].
mod piece;

/// The [`Position`] itself: construction, make/unmake, legality, SEE, draws.
mod position;

/// The compile-time PRNG feeding the Zobrist tables.
mod prng;

/// [`Square`], [`File`], and [`Rank`].
mod square;

/// The per-ply [`StateInfo`] undo record and [`CastlingRights`].
mod state;

/// The supported chess [`Variant`]s.
mod variant;

/// Zobrist hash tables and the [`ZobristKey`] type.
mod zobrist;

pub use attacks::*;
pub use bitboard::*;
pub use moves::*;
pub use perft::*;
pub use piece::*;
pub use position::*;
pub use prng::*;
pub use square::*;
pub use state::*;
pub use variant::*;
pub use zobrist::*;
