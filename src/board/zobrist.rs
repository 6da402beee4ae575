/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

use super::{CastlingRights, Color, File, Piece, Square, Variant, XoShiRo};

/// Stores Zobrist hash keys, for hashing positions.
///
/// Built at compile time from library-supplied seeds, so keys are identical
/// between compilations and runs.
const ZOBRIST_TABLE: ZobristTable = ZobristTable::new();

/// Represents a key generated from a Zobrist Hash.
#[derive(Default, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
#[repr(transparent)]
pub struct ZobristKey(u64);

impl ZobristKey {
    /// A key holding only the variant id, the starting point of every
    /// from-scratch key computation.
    ///
    /// Seeding with the variant means two positions that agree on every piece
    /// and counter but are played under different rules never hash alike.
    #[inline(always)]
    pub const fn from_variant(variant: Variant) -> Self {
        Self(variant.id())
    }

    /// Return the inner `u64` of this key.
    #[inline(always)]
    pub const fn inner(&self) -> u64 {
        self.0
    }

    /// Adds/removes `hash_key` to this [`ZobristKey`] (an XOR).
    #[inline(always)]
    pub fn hash(&mut self, hash_key: u64) {
        self.0 ^= hash_key;
    }

    /// Adds/removes the key of `piece` sitting on `square`.
    #[inline(always)]
    pub fn hash_piece(&mut self, square: Square, piece: Piece) {
        self.hash(ZOBRIST_TABLE.piece_keys[square.index()][piece.index()]);
    }

    /// Adds/removes the key of an en passant opportunity on `file`.
    #[inline(always)]
    pub fn hash_ep_file(&mut self, file: File) {
        self.hash(ZOBRIST_TABLE.ep_keys[file.index()]);
    }

    /// Adds/removes the key of the provided castling rights.
    #[inline(always)]
    pub fn hash_castling(&mut self, rights: CastlingRights) {
        self.hash(ZOBRIST_TABLE.castling_keys[rights.bits() as usize]);
    }

    /// Adds/removes the side-to-move key.
    #[inline(always)]
    pub fn hash_side(&mut self) {
        self.hash(ZOBRIST_TABLE.side_key);
    }

    /// Adds/removes the key of `color` having delivered its `count`th check (Three-Check).
    #[inline(always)]
    pub fn hash_check_given(&mut self, color: Color, count: u8) {
        self.hash(ZOBRIST_TABLE.checks_keys[color.index()][count as usize]);
    }

    /// The raw key of `piece` on `square`.
    ///
    /// `material_key` hashing indexes this table by piece *count* rather than
    /// by square, which makes that key permutation-invariant.
    #[inline(always)]
    pub const fn piece_key(square_or_count: usize, piece: Piece) -> u64 {
        ZOBRIST_TABLE.piece_keys[square_or_count][piece.index()]
    }
}

impl fmt::Display for ZobristKey {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl fmt::Debug for ZobristKey {
    #[inline(always)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ZobristKey({:016X})", self.0)
    }
}

/// Encapsulates the random key material for Zobrist hashing.
struct ZobristTable {
    /// One unique key for every piece on every square.
    piece_keys: [[u64; Piece::COUNT]; Square::COUNT],

    /// One unique key per file on which en passant may be possible.
    ep_keys: [u64; File::COUNT],

    /// One key for every subset of the four castling rights.
    ///
    /// A multi-right subset's key is the XOR of its single-right keys, so
    /// removing one right from the hash is a single XOR of the before/after
    /// subset keys.
    castling_keys: [u64; CastlingRights::SUBSET_COUNT],

    /// The key toggled whenever the side to move is Black.
    side_key: u64,

    /// One key per color per checks-given count (Three-Check).
    checks_keys: [[u64; 4]; Color::COUNT],
}

impl ZobristTable {
    /// Builds the table, drawing keys from [`XoShiRo`].
    ///
    /// This runs once, at compile time.
    const fn new() -> Self {
        let mut piece_keys = [[0; Piece::COUNT]; Square::COUNT];
        let mut ep_keys = [0; File::COUNT];
        let mut castling_keys = [0; CastlingRights::SUBSET_COUNT];
        let mut checks_keys = [[0; 4]; Color::COUNT];

        let mut prng = XoShiRo::new();

        let mut i = 0;
        while i < Square::COUNT {
            let mut j = 0;
            while j < Piece::COUNT {
                let key;
                (key, prng) = prng.get_next_const();
                piece_keys[i][j] = key;
                j += 1;
            }
            i += 1;
        }

        let mut f = 0;
        while f < File::COUNT {
            let key;
            (key, prng) = prng.get_next_const();
            ep_keys[f] = key;
            f += 1;
        }

        // One fresh key per single right, then compose every subset by XOR
        let mut singles = [0; 4];
        let mut r = 0;
        while r < 4 {
            let key;
            (key, prng) = prng.get_next_const();
            singles[r] = key;
            r += 1;
        }

        let mut cr = 0;
        while cr < CastlingRights::SUBSET_COUNT {
            let mut bit = 0;
            while bit < 4 {
                if cr >> bit & 1 == 1 {
                    castling_keys[cr] ^= singles[bit];
                }
                bit += 1;
            }
            cr += 1;
        }

        let (side_key, mut prng) = prng.get_next_const();

        let mut c = 0;
        while c < Color::COUNT {
            let mut n = 0;
            while n < 4 {
                let key;
                (key, prng) = prng.get_next_const();
                checks_keys[c][n] = key;
                n += 1;
            }
            c += 1;
        }

        Self {
            piece_keys,
            ep_keys,
            castling_keys,
            side_key,
            checks_keys,
        }
    }
}
